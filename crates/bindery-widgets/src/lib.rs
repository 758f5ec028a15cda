#![forbid(unsafe_code)]

//! Reference widgets and host collaborators for Bindery.
//!
//! This crate provides:
//! - [`TextInput`], [`Toggle`] and [`Choice`]: in-memory widgets with native
//!   listener lists
//! - [`WidgetTree`]: a [`UiRoot`](bindery_runtime::UiRoot) resolving element ids
//! - [`StringTable`]: [`StringResources`](bindery_runtime::StringResources)
//!   with locale fallback
//! - [`standard_registry`]: the four standard listener adapters
//! - [`Screen`]: a generic [`Owner`](bindery_runtime::Owner)

pub mod adapters;
pub mod choice;
pub mod listeners;
pub mod screen;
pub mod strings;
pub mod text_input;
pub mod toggle;
pub mod tree;

pub use adapters::{
    CheckedChangeAdapter, FocusLossAdapter, SelectionChangeAdapter, TextChangeAdapter,
    adapter_keys, standard_registry,
};
pub use choice::Choice;
pub use listeners::ListenerId;
pub use screen::Screen;
pub use strings::StringTable;
pub use text_input::{FocusChange, TextChange, TextInput};
pub use toggle::Toggle;
pub use tree::WidgetTree;
