#![forbid(unsafe_code)]

//! A generic owner: a screen with named field slots.
//!
//! `Screen` stands in for an application's screen or dialog type. Its
//! descriptors are declared per level (level 0 is the screen itself, higher
//! levels are its ancestors), bound resources land in named slots, and fields
//! without a resource id can be pre-filled with elements.
//!
//! Two `Screen`s built with the same key share one binding session, which is
//! how a recreated screen finds the state of the one it replaces.

use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use bindery_runtime::{
    BindError, Bindable, BindingDescriptor, BoundResource, ElementHandle, Owner, SessionKey,
    UiRoot,
};

use crate::tree::WidgetTree;

/// Owner with descriptor levels, an optional widget tree and field slots.
pub struct Screen {
    key: SessionKey,
    root: Option<Arc<WidgetTree>>,
    levels: Vec<Vec<BindingDescriptor>>,
    slots: Mutex<AHashMap<String, BoundResource>>,
}

impl Screen {
    #[must_use]
    pub fn new(key: impl Into<SessionKey>) -> Self {
        Self {
            key: key.into(),
            root: None,
            levels: Vec::new(),
            slots: Mutex::new(AHashMap::new()),
        }
    }

    #[must_use]
    pub fn root(mut self, root: Arc<WidgetTree>) -> Self {
        self.root = Some(root);
        self
    }

    /// Append the next descriptor level (the first call declares level 0).
    #[must_use]
    pub fn level(mut self, descriptors: Vec<BindingDescriptor>) -> Self {
        self.levels.push(descriptors);
        self
    }

    /// Pre-fill `field` with an element, for fields bound without a resource id.
    #[must_use]
    pub fn slot(self, field: &str, element: Arc<impl Bindable>) -> Self {
        self.slots_mut()
            .insert(field.to_owned(), BoundResource::Element(element));
        self
    }

    fn slots_mut(&self) -> std::sync::MutexGuard<'_, AHashMap<String, BoundResource>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resource currently held by `field`.
    #[must_use]
    pub fn resource(&self, field: &str) -> Option<BoundResource> {
        self.slots_mut().get(field).cloned()
    }

    /// Text held by `field`, for string fields.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<String> {
        self.resource(field)
            .and_then(|r| r.as_text().map(str::to_owned))
    }
}

impl Owner for Screen {
    fn session_key(&self) -> SessionKey {
        self.key.clone()
    }

    fn ui_root(&self) -> Result<Arc<dyn UiRoot>, BindError> {
        self.root
            .clone()
            .map(|root| root as Arc<dyn UiRoot>)
            .ok_or_else(|| BindError::NoRoot {
                owner: self.key.to_string(),
            })
    }

    fn descriptors(&self, level: usize) -> Option<Vec<BindingDescriptor>> {
        self.levels.get(level).cloned()
    }

    fn attach(&self, field: &str, resource: BoundResource) {
        self.slots_mut().insert(field.to_owned(), resource);
    }

    fn element(&self, field: &str) -> Option<ElementHandle> {
        self.slots_mut()
            .get(field)
            .and_then(|r| r.as_element().cloned())
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("key", &self.key)
            .field("levels", &self.levels.len())
            .field("slots", &self.slots_mut().len())
            .finish()
    }
}
