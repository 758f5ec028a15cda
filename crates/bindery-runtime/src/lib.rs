#![forbid(unsafe_code)]

//! Declarative two-way data binding for Bindery.
//!
//! This crate provides:
//! - [`ReactiveCell`] for shared observable values with self-healing observers
//! - [`Bindable`] / [`AccessorSet`] accessor tables that replace runtime reflection
//! - [`resolve`] for turning a [`BindingDescriptor`] into callable accessors
//! - [`SessionStore`] for binding state that outlives an owner instance
//! - [`Binder`] for the bind, load, register and teardown lifecycle
//! - [`ListenerAdapter`] / [`AdapterRegistry`] for element change notification

pub mod accessor;
pub mod adapter;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod owner;
pub mod reactive;
pub mod resolver;
pub mod session;
pub mod value;

pub use accessor::{
    Accessor, AccessorBuilder, AccessorKind, AccessorSet, AsAny, Bindable, ElementHandle,
    Fetched, ModelHandle, ReturnShape,
};
pub use adapter::{AdapterRegistry, AdapterSource, Emitter, ListenerAdapter};
#[cfg(feature = "descriptor-config")]
pub use descriptor::DescriptorTable;
pub use descriptor::{BindingDescriptor, FieldKind, ModelBinding, ParamShape, ResourceId};
pub use engine::{BindOptions, Binder, BinderBuilder, FieldFailure, SyncReport};
#[cfg(feature = "descriptor-config")]
pub use error::ConfigError;
pub use error::{BindError, ContractViolation, InvocationError, ObserverError};
pub use owner::{BoundResource, Owner, StringResources, UiRoot};
pub use reactive::{BindingScope, DynCell, ObserverId, ReactiveCell, Subscription, ValueObserver};
pub use resolver::{AccessorCache, ResolvedAccessors, resolve};
pub use session::{
    BindingSession, FieldBinding, SessionHandle, SessionKey, SessionState, SessionStore,
};
pub use value::{Value, ValueKind, ValueType};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `m`, recovering the guard if a previous holder panicked.
///
/// Every mutex in this crate guards state that stays valid across an
/// observer panic.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
