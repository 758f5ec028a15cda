#![forbid(unsafe_code)]

//! Listener adapters: the bridge from an element's native change events to
//! the engine.
//!
//! Each adapter knows one event source of one element type (text changes,
//! focus loss, checked changes, ...). The engine looks adapters up by the
//! key declared in a field's [`ModelBinding`](crate::ModelBinding) and hands
//! them an [`Emitter`] that forwards into the model setter.
//!
//! # Contract
//!
//! - `register` attaches to the element and calls the emitter once per
//!   distinct observed change. Duplicate notifications are filtered by the
//!   adapter, not by the engine.
//! - `unregister` detaches. It is idempotent and safe to call for an emitter
//!   that was never registered.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::accessor::ElementHandle;
use crate::error::InvocationError;
use crate::value::Value;

/// Sink for element changes, owned by the engine.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn Fn(Value) + Send + Sync>,
}

impl Emitter {
    pub fn new(sink: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    #[inline]
    pub fn emit(&self, value: Value) {
        (self.sink)(value);
    }

    /// Whether both handles wrap the same sink.
    #[must_use]
    pub fn same_as(&self, other: &Emitter) -> bool {
        Arc::ptr_eq(&self.sink, &other.sink)
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

/// Attaches an [`Emitter`] to one kind of element event.
pub trait ListenerAdapter: Send + Sync {
    /// Start forwarding changes of `element` to `emitter`.
    ///
    /// # Errors
    ///
    /// [`InvocationError::TargetMismatch`] when `element` is not the element
    /// type this adapter understands.
    fn register(&self, element: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError>;

    /// Stop forwarding to `emitter`.
    fn unregister(&self, element: &ElementHandle, emitter: &Emitter);
}

/// Finds an adapter for an event key.
pub trait AdapterSource: Send + Sync {
    /// A fresh adapter for `key`, or `None` if the key is unknown.
    fn lookup(&self, key: &str) -> Option<Box<dyn ListenerAdapter>>;
}

type AdapterFactory = Arc<dyn Fn() -> Box<dyn ListenerAdapter> + Send + Sync>;

/// Keyed adapter factories.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: AHashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `key`, replacing any previous one.
    pub fn register<A, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        A: ListenerAdapter + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.factories.insert(
            key.into(),
            Arc::new(move || Box::new(factory()) as Box<dyn ListenerAdapter>),
        );
        self
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<A, F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        A: ListenerAdapter + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl AdapterSource for AdapterRegistry {
    fn lookup(&self, key: &str) -> Option<Box<dyn ListenerAdapter>> {
        self.factories.get(key).map(|factory| factory())
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl ListenerAdapter for Counting {
        fn register(&self, _: &ElementHandle, emitter: Emitter) -> Result<(), InvocationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            emitter.emit(Value::Int(1));
            Ok(())
        }

        fn unregister(&self, _: &ElementHandle, _: &Emitter) {}
    }

    struct Dummy;

    impl crate::Bindable for Dummy {
        fn accessors(&self) -> crate::AccessorSet {
            crate::AccessorSet::default()
        }
    }

    #[test]
    fn lookup_builds_fresh_adapters() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let registry = AdapterRegistry::new().with("count", move || Counting(Arc::clone(&b)));

        assert!(registry.contains("count"));
        assert!(registry.lookup("missing").is_none());

        let element: ElementHandle = Arc::new(Dummy);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let emitter = Emitter::new(move |v| s.lock().unwrap().push(v));
        for _ in 0..2 {
            let adapter = registry.lookup("count").unwrap();
            adapter.register(&element, emitter.clone()).unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock().unwrap(), vec![Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn emitter_identity() {
        let a = Emitter::new(|_| {});
        let b = a.clone();
        let c = Emitter::new(|_| {});
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn keys_sorted() {
        let registry = AdapterRegistry::new()
            .with("b", || Counting(Arc::new(AtomicUsize::new(0))))
            .with("a", || Counting(Arc::new(AtomicUsize::new(0))));
        assert_eq!(registry.keys(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }
}
