#![forbid(unsafe_code)]

//! Widget tree: the UI root that resolves element resource ids.

use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use bindery_runtime::{Bindable, ElementHandle, ResourceId, UiRoot};

/// Elements of one screen, indexed by resource id.
#[derive(Default)]
pub struct WidgetTree {
    elements: Mutex<AHashMap<ResourceId, ElementHandle>>,
}

impl WidgetTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(self, id: ResourceId, element: Arc<impl Bindable>) -> Self {
        self.insert(id, element);
        self
    }

    /// Add or replace the element at `id`.
    pub fn insert(&self, id: ResourceId, element: ElementHandle) -> Option<ElementHandle> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, element)
    }

    pub fn remove(&self, id: ResourceId) -> Option<ElementHandle> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UiRoot for WidgetTree {
    fn find_by_id(&self, id: ResourceId) -> Option<ElementHandle> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl std::fmt::Debug for WidgetTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetTree")
            .field("elements", &self.len())
            .finish()
    }
}
