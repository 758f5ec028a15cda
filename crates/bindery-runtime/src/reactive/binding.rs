#![forbid(unsafe_code)]

//! Subscription scopes.
//!
//! [`BindingScope`] collects [`Subscription`]s for one logical unit (the
//! engine keeps one per bound field and direction) so every live link can be
//! released in a single call.
//!
//! # Invariants
//!
//! 1. A scope releases its subscriptions in reverse registration order.
//! 2. `clear()` on an empty scope is a no-op, so releasing twice is safe.

use super::subscription::Subscription;

/// Owns the live subscriptions of a logical scope.
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now; the scope stays reusable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            sub.unsubscribe();
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}
