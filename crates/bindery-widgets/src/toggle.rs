#![forbid(unsafe_code)]

//! Two-state toggle (checkbox, switch).

use std::sync::atomic::{AtomicBool, Ordering};

use bindery_runtime::{AccessorSet, Bindable};

use crate::listeners::{ListenerId, ListenerList};

/// A checkable widget. Listeners hear the new state, only when it changes.
#[derive(Default)]
pub struct Toggle {
    checked: AtomicBool,
    listeners: ListenerList<bool>,
}

impl Toggle {
    #[must_use]
    pub fn new(checked: bool) -> Self {
        Self {
            checked: AtomicBool::new(checked),
            listeners: ListenerList::default(),
        }
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked.load(Ordering::Acquire)
    }

    pub fn set_checked(&self, checked: bool) {
        if self.checked.swap(checked, Ordering::AcqRel) != checked {
            self.listeners.notify(&checked);
        }
    }

    /// Flip the state, as a click would.
    pub fn toggle(&self) {
        self.set_checked(!self.is_checked());
    }

    pub fn add_checked_listener(&self, listener: impl Fn(&bool) + Send + Sync + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_checked_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Bindable for Toggle {
    fn accessors(&self) -> AccessorSet {
        AccessorSet::of::<Self>()
            .getter("is_checked", Toggle::is_checked)
            .setter("set_checked", Toggle::set_checked)
            .build()
    }
}

impl std::fmt::Debug for Toggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toggle")
            .field("checked", &self.is_checked())
            .finish()
    }
}
