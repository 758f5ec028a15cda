#![forbid(unsafe_code)]

//! Standard listener adapters for the reference widgets.
//!
//! | Key | Element | Emits |
//! |-----|---------|-------|
//! | [`adapter_keys::TEXT_CHANGE`] | [`TextInput`] | new text, when it differs from the text before the change |
//! | [`adapter_keys::FOCUS_LOSS`] | [`TextInput`] | text on focus loss, when it differs from the text at focus gain |
//! | [`adapter_keys::CHECKED_CHANGE`] | [`Toggle`] | checked state, on the first change and whenever it differs from the last emitted |
//! | [`adapter_keys::SELECTION_CHANGE`] | [`Choice`] | selected index, when it differs from the last emitted |
//!
//! Each adapter instance tracks the registrations it made, so `unregister`
//! removes exactly the native listener added for that emitter.

use std::sync::{Mutex, PoisonError};

use bindery_runtime::{
    AdapterRegistry, Bindable, ElementHandle, Emitter, InvocationError, ListenerAdapter, Value,
};

use crate::choice::Choice;
use crate::listeners::ListenerId;
use crate::text_input::TextInput;
use crate::toggle::Toggle;

/// Event keys understood by [`standard_registry`].
pub mod adapter_keys {
    pub const TEXT_CHANGE: &str = "text_input.text_change";
    pub const FOCUS_LOSS: &str = "text_input.focus_loss";
    pub const CHECKED_CHANGE: &str = "toggle.checked_change";
    pub const SELECTION_CHANGE: &str = "choice.selection_change";
}

/// Registry with the four standard adapters.
#[must_use]
pub fn standard_registry() -> AdapterRegistry {
    AdapterRegistry::new()
        .with(adapter_keys::TEXT_CHANGE, TextChangeAdapter::default)
        .with(adapter_keys::FOCUS_LOSS, FocusLossAdapter::default)
        .with(adapter_keys::CHECKED_CHANGE, CheckedChangeAdapter::default)
        .with(adapter_keys::SELECTION_CHANGE, SelectionChangeAdapter::default)
}

fn target<T: Bindable>(element: &ElementHandle) -> Result<&T, InvocationError> {
    element
        .downcast_ref::<T>()
        .ok_or(InvocationError::TargetMismatch {
            expected: std::any::type_name::<T>(),
        })
}

/// Native listener ids added per emitter.
#[derive(Default)]
struct Registrations {
    entries: Mutex<Vec<(Emitter, ListenerId)>>,
}

impl Registrations {
    fn track(&self, emitter: Emitter, id: ListenerId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((emitter, id));
    }

    fn take(&self, emitter: &Emitter) -> Option<ListenerId> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = entries.iter().position(|(e, _)| e.same_as(emitter))?;
        Some(entries.swap_remove(pos).1)
    }
}

/// Remembers the last emitted value and lets only changes through.
struct LastEmitted<T>(Mutex<Option<T>>);

impl<T: PartialEq + Clone> LastEmitted<T> {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn changed(&self, value: &T) -> bool {
        let mut last = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(value) {
            return false;
        }
        *last = Some(value.clone());
        true
    }
}

// ---------------------------------------------------------------------------
// TextInput
// ---------------------------------------------------------------------------

/// Emits the new text after each effective text change.
#[derive(Default)]
pub struct TextChangeAdapter {
    registrations: Registrations,
}

impl ListenerAdapter for TextChangeAdapter {
    fn register(&self, element: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError> {
        let input = target::<TextInput>(element)?;
        let sink = emitter.clone();
        let id = input.add_text_listener(move |change| {
            if change.before != change.after {
                sink.emit(Value::Text(change.after.clone()));
            }
        });
        self.registrations.track(emitter, id);
        tracing::trace!(key = adapter_keys::TEXT_CHANGE, "listener registered");
        Ok(())
    }

    fn unregister(&self, element: &ElementHandle, emitter: &Emitter) {
        let Ok(input) = target::<TextInput>(element) else {
            return;
        };
        if let Some(id) = self.registrations.take(emitter) {
            input.remove_text_listener(id);
        }
    }
}

/// Emits the text when focus leaves the input with a value other than the
/// one it had when focus arrived.
#[derive(Default)]
pub struct FocusLossAdapter {
    registrations: Registrations,
}

impl ListenerAdapter for FocusLossAdapter {
    fn register(&self, element: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError> {
        let input = target::<TextInput>(element)?;
        let sink = emitter.clone();
        let on_focus: Mutex<Option<String>> = Mutex::new(None);
        let id = input.add_focus_listener(move |change| {
            let mut captured = on_focus.lock().unwrap_or_else(PoisonError::into_inner);
            if change.gained {
                *captured = Some(change.text.clone());
            } else if captured.as_deref() != Some(change.text.as_str()) {
                drop(captured);
                sink.emit(Value::Text(change.text.clone()));
            }
        });
        self.registrations.track(emitter, id);
        tracing::trace!(key = adapter_keys::FOCUS_LOSS, "listener registered");
        Ok(())
    }

    fn unregister(&self, element: &ElementHandle, emitter: &Emitter) {
        let Ok(input) = target::<TextInput>(element) else {
            return;
        };
        if let Some(id) = self.registrations.take(emitter) {
            input.remove_focus_listener(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

/// Emits the checked state when it differs from the last emitted one.
#[derive(Default)]
pub struct CheckedChangeAdapter {
    registrations: Registrations,
}

impl ListenerAdapter for CheckedChangeAdapter {
    fn register(&self, element: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError> {
        let toggle = target::<Toggle>(element)?;
        let sink = emitter.clone();
        let last = LastEmitted::new();
        let id = toggle.add_checked_listener(move |checked| {
            if last.changed(checked) {
                sink.emit(Value::Bool(*checked));
            }
        });
        self.registrations.track(emitter, id);
        tracing::trace!(key = adapter_keys::CHECKED_CHANGE, "listener registered");
        Ok(())
    }

    fn unregister(&self, element: &ElementHandle, emitter: &Emitter) {
        let Ok(toggle) = target::<Toggle>(element) else {
            return;
        };
        if let Some(id) = self.registrations.take(emitter) {
            toggle.remove_checked_listener(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// Emits the selected index when it differs from the last emitted one.
#[derive(Default)]
pub struct SelectionChangeAdapter {
    registrations: Registrations,
}

impl ListenerAdapter for SelectionChangeAdapter {
    fn register(&self, element: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError> {
        let choice = target::<Choice>(element)?;
        let sink = emitter.clone();
        let last = LastEmitted::new();
        let id = choice.add_selection_listener(move |index| {
            if last.changed(index) {
                sink.emit(Value::Int(i64::try_from(*index).unwrap_or(i64::MAX)));
            }
        });
        self.registrations.track(emitter, id);
        tracing::trace!(key = adapter_keys::SELECTION_CHANGE, "listener registered");
        Ok(())
    }

    fn unregister(&self, element: &ElementHandle, emitter: &Emitter) {
        let Ok(choice) = target::<Choice>(element) else {
            return;
        };
        if let Some(id) = self.registrations.take(emitter) {
            choice.remove_selection_listener(id);
        }
    }
}
