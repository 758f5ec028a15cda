#![forbid(unsafe_code)]

//! Single-line text input.
//!
//! Every `set_text` call reports a [`TextChange`] with the text before and
//! after the call, even when both are equal; filtering no-op changes is the
//! listener's job. Focus transitions report a [`FocusChange`].

use std::sync::{Mutex, PoisonError};

use bindery_runtime::{AccessorSet, Bindable};

use crate::listeners::{ListenerId, ListenerList};

/// Text before and after a `set_text` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub before: String,
    pub after: String,
}

/// Focus gained or lost, with the text at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    pub gained: bool,
    pub text: String,
}

#[derive(Default)]
struct TextState {
    text: String,
    focused: bool,
}

/// An editable text field.
#[derive(Default)]
pub struct TextInput {
    state: Mutex<TextState>,
    text_listeners: ListenerList<TextChange>,
    focus_listeners: ListenerList<FocusChange>,
}

impl TextInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an input holding `text`.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        let input = Self::default();
        input.lock().text = text.into();
        input
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Replace the text and notify text listeners.
    pub fn set_text(&self, text: impl Into<String>) {
        let after = text.into();
        let before = std::mem::replace(&mut self.lock().text, after.clone());
        self.text_listeners.notify(&TextChange { before, after });
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.lock().focused
    }

    pub fn focus(&self) {
        self.set_focused(true);
    }

    pub fn blur(&self) {
        self.set_focused(false);
    }

    fn set_focused(&self, gained: bool) {
        let text = {
            let mut state = self.lock();
            if state.focused == gained {
                return;
            }
            state.focused = gained;
            state.text.clone()
        };
        self.focus_listeners.notify(&FocusChange { gained, text });
    }

    pub fn add_text_listener(
        &self,
        listener: impl Fn(&TextChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.text_listeners.add(listener)
    }

    pub fn remove_text_listener(&self, id: ListenerId) -> bool {
        self.text_listeners.remove(id)
    }

    pub fn add_focus_listener(
        &self,
        listener: impl Fn(&FocusChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.focus_listeners.add(listener)
    }

    pub fn remove_focus_listener(&self, id: ListenerId) -> bool {
        self.focus_listeners.remove(id)
    }

    /// Number of attached text and focus listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.text_listeners.len() + self.focus_listeners.len()
    }
}

impl Bindable for TextInput {
    fn accessors(&self) -> AccessorSet {
        AccessorSet::of::<Self>()
            .getter("text", TextInput::text)
            .setter("set_text", |input, text: String| input.set_text(text))
            .getter("is_focused", TextInput::is_focused)
            .build()
    }
}

impl std::fmt::Debug for TextInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TextInput")
            .field("text", &state.text)
            .field("focused", &state.focused)
            .finish()
    }
}
