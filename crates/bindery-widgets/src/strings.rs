#![forbid(unsafe_code)]

//! String resources with locale fallback.
//!
//! # Invariants
//!
//! 1. A lookup tries the active locale first, then walks the fallback chain
//!    once, in order, skipping the active locale.
//! 2. The table is immutable after construction apart from the active locale.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Id missing from every locale | `None` |
//! | Active locale not loaded | Falls through the chain |

use std::sync::{Mutex, PoisonError};

use ahash::AHashMap;
use bindery_runtime::{ResourceId, StringResources};

/// Localized strings keyed by resource id.
#[derive(Debug, Default)]
pub struct StringTable {
    locales: AHashMap<String, AHashMap<ResourceId, String>>,
    fallback_chain: Vec<String>,
    active: Mutex<String>,
}

impl StringTable {
    /// Empty table whose active locale is `locale`.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            active: Mutex::new(locale.into()),
            ..Self::default()
        }
    }

    /// Add one string to `locale`.
    #[must_use]
    pub fn with(mut self, locale: &str, id: ResourceId, text: impl Into<String>) -> Self {
        self.locales
            .entry(locale.to_owned())
            .or_default()
            .insert(id, text.into());
        self
    }

    /// Locales tried, in order, when the active one lacks an id.
    #[must_use]
    pub fn with_fallback_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn locale(&self) -> String {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_locale(&self, locale: impl Into<String>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = locale.into();
    }

    /// Look `id` up in `locale`, then along the fallback chain.
    #[must_use]
    pub fn get(&self, locale: &str, id: ResourceId) -> Option<&str> {
        let lookup = |loc: &str| self.locales.get(loc).and_then(|m| m.get(&id));
        if let Some(text) = lookup(locale) {
            return Some(text.as_str());
        }
        self.fallback_chain
            .iter()
            .filter(|fallback| fallback.as_str() != locale)
            .find_map(|fallback| lookup(fallback))
            .map(String::as_str)
    }
}

impl StringResources for StringTable {
    fn resolve_string(&self, id: ResourceId) -> Option<String> {
        self.get(&self.locale(), id).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: ResourceId = ResourceId(10);
    const HINT: ResourceId = ResourceId(11);

    fn table() -> StringTable {
        StringTable::new("es-MX")
            .with("en", TITLE, "Profile")
            .with("en", HINT, "Your name")
            .with("es", TITLE, "Perfil")
            .with_fallback_chain(["es", "en"])
    }

    #[test]
    fn falls_back_in_chain_order() {
        let t = table();
        assert_eq!(t.resolve_string(TITLE).as_deref(), Some("Perfil"));
        assert_eq!(t.resolve_string(HINT).as_deref(), Some("Your name"));
        assert_eq!(t.resolve_string(ResourceId(99)), None);
    }

    #[test]
    fn switching_locale_changes_lookup() {
        let t = table();
        t.set_locale("en");
        assert_eq!(t.resolve_string(TITLE).as_deref(), Some("Profile"));
        assert_eq!(t.locale(), "en");
    }
}
