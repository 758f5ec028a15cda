#![forbid(unsafe_code)]

//! Reactive primitives used by the binding engine.
//!
//! - [`ReactiveCell`]: a shared single value with synchronous, self-healing
//!   observer notification.
//! - [`Subscription`]: RAII guard that detaches an observer (or any other
//!   registration) exactly once.
//! - [`BindingScope`]: collects subscriptions so a group can be released at once.
//! - [`DynCell`]: a cell seen through [`Value`](crate::Value)s, which is how
//!   model getters expose cells to the engine.
//!
//! # Architecture
//!
//! `ReactiveCell<T>` is `Arc<Mutex<..>>` so that background completions may
//! `set` it from any thread. Notification takes a snapshot of the observer
//! list under the lock, releases the lock, then walks the snapshot from the
//! tail. Failed observers are removed after the walk. A separate re-entrant
//! pass lock (`parking_lot::ReentrantMutex`) serializes whole passes across
//! threads while still letting observers `set` the cell they observe.

pub mod binding;
pub mod cell;
pub mod subscription;

pub use binding::BindingScope;
pub use cell::{DynCell, ObserverId, ReactiveCell, ValueObserver};
pub use subscription::Subscription;
