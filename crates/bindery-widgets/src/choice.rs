#![forbid(unsafe_code)]

//! Single-selection list (dropdown, radio group).
//!
//! `select` reports every call to listeners, including re-selecting the
//! current item; filtering repeats is the listener's job.

use std::sync::{Mutex, PoisonError};

use bindery_runtime::{AccessorSet, Bindable, InvocationError};

use crate::listeners::{ListenerId, ListenerList};

/// A widget showing a fixed list of options with at most one selected.
#[derive(Default)]
pub struct Choice {
    options: Vec<String>,
    selected: Mutex<Option<usize>>,
    listeners: ListenerList<usize>,
}

impl Choice {
    #[must_use]
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn selected_text(&self) -> Option<String> {
        self.selected().and_then(|i| self.options.get(i).cloned())
    }

    /// Select option `index`. Returns `false` (and changes nothing) when out
    /// of range.
    pub fn select(&self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(index);
        self.listeners.notify(&index);
        true
    }

    pub fn add_selection_listener(&self, listener: impl Fn(&usize) + Send + Sync + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_selection_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

fn selected_index(choice: &Choice) -> Option<i64> {
    choice.selected().and_then(|i| i64::try_from(i).ok())
}

fn set_selected_index(choice: &Choice, index: i64) -> Result<(), InvocationError> {
    let in_range = usize::try_from(index).is_ok_and(|i| choice.select(i));
    if in_range {
        Ok(())
    } else {
        Err(InvocationError::Failed(format!(
            "selection index {index} is out of range (0..{})",
            choice.options.len()
        )))
    }
}

impl Bindable for Choice {
    fn accessors(&self) -> AccessorSet {
        AccessorSet::of::<Self>()
            .getter("selected_index", selected_index)
            .try_setter("set_selected_index", set_selected_index)
            .getter("selected_text", Choice::selected_text)
            .build()
    }
}

impl std::fmt::Debug for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Choice")
            .field("options", &self.options)
            .field("selected", &self.selected())
            .finish()
    }
}
