#![forbid(unsafe_code)]

//! Thread-safe single-value container with synchronous observer notification.
//!
//! # Invariants
//!
//! 1. `set` stores the value, bumps the version, then notifies every observer
//!    registered at the moment of the store.
//! 2. Observers run in reverse registration order.
//! 3. An observer registered while a notification pass is running is not
//!    invoked by that pass.
//! 4. An observer removed while a pass is running is skipped by the rest of
//!    that pass.
//! 5. An observer that returns an error is logged and removed; the remaining
//!    observers of the pass still run.
//! 6. The state lock is never held while an observer runs, so observers
//!    may call back into the cell (`get`, `set`, `observe`, ...).
//! 7. Store and notification pass run under one re-entrant pass lock, so
//!    passes never overlap across threads: the last pass to finish delivers
//!    the value the cell holds.
//!
//! # Failure Modes
//!
//! - Observer error: logged at `warn`, observer dropped permanently.
//! - Observer panic: caught, logged at `warn` and handled like an error. The
//!   caller of `set` does not see it.
//! - Observer that blocks on another thread's `set` of the same cell:
//!   deadlock. A nested `set` on the notifying thread is fine.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use parking_lot::ReentrantMutex;

use crate::error::ObserverError;
use crate::lock;
use crate::value::{Value, ValueKind, ValueType};

use super::subscription::Subscription;

/// Handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

type ObserverFn<T> = Arc<dyn Fn(&T) -> Result<(), ObserverError> + Send + Sync>;

struct CellInner<T> {
    value: Option<T>,
    version: u64,
    next_id: u64,
    observers: Vec<(ObserverId, ObserverFn<T>)>,
}

/// A shared, observable value.
///
/// Cloning yields another handle to the same cell.
pub struct ReactiveCell<T> {
    inner: Arc<Mutex<CellInner<T>>>,
    pass: Arc<ReentrantMutex<()>>,
}

impl<T> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            pass: Arc::clone(&self.pass),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ReactiveCell<T> {
    /// Create a cell holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_value(Some(value))
    }

    /// Create a cell with no value yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_value(None)
    }

    fn with_value(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CellInner {
                value,
                version: 0,
                next_id: 1,
                observers: Vec::new(),
            })),
            pass: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Current value, if one was ever stored.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        lock(&self.inner).value.clone()
    }

    /// Read the current value by reference without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(lock(&self.inner).value.as_ref())
    }

    /// Number of `set` calls so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        lock(&self.inner).version
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }

    /// Store `value` and notify observers synchronously.
    pub fn set(&self, value: T) {
        let _pass = self.pass.lock();
        let snapshot = {
            let mut inner = lock(&self.inner);
            inner.value = Some(value.clone());
            inner.version += 1;
            inner.observers.clone()
        };
        self.dispatch(&value, &snapshot);
    }

    /// Re-broadcast the current value. No-op while the cell is empty.
    pub fn notify(&self) {
        let _pass = self.pass.lock();
        let (value, snapshot) = {
            let inner = lock(&self.inner);
            let Some(value) = inner.value.clone() else {
                return;
            };
            (value, inner.observers.clone())
        };
        self.dispatch(&value, &snapshot);
    }

    /// Register an infallible observer.
    pub fn observe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> ObserverId {
        self.try_observe(move |v| {
            observer(v);
            Ok(())
        })
    }

    /// Register an observer that may fail. A failing observer is removed.
    pub fn try_observe(
        &self,
        observer: impl Fn(&T) -> Result<(), ObserverError> + Send + Sync + 'static,
    ) -> ObserverId {
        let mut inner = lock(&self.inner);
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.observers.len();
        inner.observers.retain(|(oid, _)| *oid != id);
        inner.observers.len() != before
    }

    #[must_use]
    pub fn is_observing(&self, id: ObserverId) -> bool {
        lock(&self.inner).observers.iter().any(|(oid, _)| *oid == id)
    }

    /// Register an infallible observer held by a [`Subscription`] guard.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.observe(observer);
        self.guard(id)
    }

    /// Register a fallible observer held by a [`Subscription`] guard.
    pub fn try_subscribe(
        &self,
        observer: impl Fn(&T) -> Result<(), ObserverError> + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.try_observe(observer);
        self.guard(id)
    }

    fn guard(&self, id: ObserverId) -> Subscription {
        let weak: Weak<Mutex<CellInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).observers.retain(|(oid, _)| *oid != id);
            }
        })
    }

    fn dispatch(&self, value: &T, snapshot: &[(ObserverId, ObserverFn<T>)]) {
        let mut failed = Vec::new();
        for (id, observer) in snapshot.iter().rev() {
            if !self.is_observing(*id) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(value)))
                .unwrap_or_else(|payload| Err(ObserverError::new(panic_message(&*payload))));
            if let Err(err) = outcome {
                tracing::warn!(
                    observer = id.id(),
                    error = %err,
                    "reactive cell observer failed; removing it"
                );
                failed.push(*id);
            }
        }
        if !failed.is_empty() {
            lock(&self.inner)
                .observers
                .retain(|(id, _)| !failed.contains(id));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    format!("observer panicked: {msg}")
}

impl<T: Clone + Send + Sync + 'static + Default> Default for ReactiveCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ReactiveCell")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DynCell: type-erased view used by the binding engine
// ---------------------------------------------------------------------------

/// Erased observer over [`Value`]s.
pub type ValueObserver = Box<dyn Fn(&Value) -> Result<(), ObserverError> + Send + Sync>;

/// A reactive cell seen through [`Value`]s.
///
/// Model getters that return cells hand the engine one of these, so the
/// engine can unwrap the current value and observe changes without knowing
/// the cell's element type.
pub trait DynCell: Send + Sync {
    /// Kind of values stored in the cell.
    fn kind(&self) -> ValueKind;

    /// Current value converted to a [`Value`].
    fn value(&self) -> Option<Value>;

    /// Observe the cell; failures from `observer` remove it like any other.
    fn subscribe_value(&self, observer: ValueObserver) -> Subscription;

    fn observer_count(&self) -> usize;
}

impl<T: ValueType> DynCell for ReactiveCell<T> {
    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn value(&self) -> Option<Value> {
        self.get().map(ValueType::into_value)
    }

    fn subscribe_value(&self, observer: ValueObserver) -> Subscription {
        self.try_subscribe(move |v: &T| observer(&v.clone().into_value()))
    }

    fn observer_count(&self) -> usize {
        ReactiveCell::observer_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        (log, move |tag| l.lock().unwrap().push(tag))
    }

    #[test]
    fn get_set_roundtrip() {
        let cell = ReactiveCell::new(String::from("Ann"));
        assert_eq!(cell.get().as_deref(), Some("Ann"));
        cell.set("Bob".into());
        assert_eq!(cell.get().as_deref(), Some("Bob"));
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn empty_cell_has_no_value() {
        let cell: ReactiveCell<i64> = ReactiveCell::empty();
        assert_eq!(cell.get(), None);
        cell.with(|v| assert!(v.is_none()));
    }

    #[test]
    fn observers_run_in_reverse_registration_order() {
        let cell = ReactiveCell::new(0);
        let (log, push) = recorder();
        let p1 = push.clone();
        cell.observe(move |_| p1("first"));
        let p2 = push.clone();
        cell.observe(move |_| p2("second"));
        cell.observe(move |_| push("third"));

        cell.set(1);
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[test]
    fn failing_observer_is_removed_and_others_still_run() {
        let cell = ReactiveCell::new(0);
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let first = cell.observe(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let second = cell.try_observe(|_| Err(ObserverError::new("boom")));
        let h3 = Arc::clone(&hits);
        let third = cell.observe(move |_| {
            h3.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(7);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(cell.is_observing(first));
        assert!(!cell.is_observing(second));
        assert!(cell.is_observing(third));
        assert_eq!(cell.observer_count(), 2);

        cell.set(8);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn observer_added_during_pass_waits_for_next_pass() {
        let cell = ReactiveCell::new(0);
        let late_hits = Arc::new(AtomicUsize::new(0));

        let handle = cell.clone();
        let lh = Arc::clone(&late_hits);
        let added = Arc::new(AtomicUsize::new(0));
        let ad = Arc::clone(&added);
        cell.observe(move |_| {
            if ad.fetch_add(1, Ordering::SeqCst) == 0 {
                let lh = Arc::clone(&lh);
                handle.observe(move |_| {
                    lh.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        cell.set(1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        cell.set(2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_removed_during_pass_is_skipped() {
        let cell = ReactiveCell::new(0);
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let victim = cell.observe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let handle = cell.clone();
        // Registered last, so it runs first and removes the victim.
        cell.observe(move |_| {
            handle.remove_observer(victim);
        });

        cell.set(1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reentrant_set_from_observer() {
        let cell = ReactiveCell::new(0_i64);
        let handle = cell.clone();
        cell.observe(move |v| {
            if *v < 3 {
                handle.set(v + 1);
            }
        });
        cell.set(0);
        assert_eq!(cell.get(), Some(3));
    }

    #[test]
    fn remove_observer_twice_is_harmless() {
        let cell = ReactiveCell::new(0);
        let id = cell.observe(|_| {});
        assert!(cell.remove_observer(id));
        assert!(!cell.remove_observer(id));
    }

    #[test]
    fn subscription_drop_detaches() {
        let cell = ReactiveCell::new(0);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = cell.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        drop(sub);
        cell.set(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(cell.observer_count(), 0);
    }

    #[test]
    fn notify_rebroadcasts_without_version_bump() {
        let cell = ReactiveCell::new(5);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        cell.observe(move |v| {
            s.store(*v, Ordering::SeqCst);
        });
        cell.notify();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(cell.version(), 0);
    }

    #[test]
    fn concurrent_sets_keep_observer_set_intact() {
        let cell = ReactiveCell::new(0_usize);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        cell.observe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let c = cell.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        c.set(t * 100 + i);
                        let id = c.observe(|_| {});
                        c.remove_observer(id);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(cell.version(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 200);
        assert_eq!(cell.observer_count(), 1);
    }

    #[test]
    fn slow_pass_does_not_overwrite_a_later_set() {
        use std::sync::mpsc;
        use std::time::Duration;

        let cell = ReactiveCell::new(0_i64);
        let shown = Arc::new(Mutex::new(0_i64));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let s = Arc::clone(&shown);
        cell.observe(move |v| {
            if *v == 1 {
                entered_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
            *s.lock().unwrap() = *v;
        });

        let slow = {
            let c = cell.clone();
            std::thread::spawn(move || c.set(1))
        };
        entered_rx.recv().unwrap();
        let fast = {
            let c = cell.clone();
            std::thread::spawn(move || c.set(2))
        };
        // Give the second writer time to run ahead if it could.
        std::thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();
        slow.join().unwrap();
        fast.join().unwrap();

        assert_eq!(cell.get(), Some(2));
        assert_eq!(*shown.lock().unwrap(), 2);
    }

    #[test]
    fn panicking_observer_is_removed_and_others_still_run() {
        let cell = ReactiveCell::new(0_i64);
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        cell.observe(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let bomb = cell.observe(|v| {
            if *v > 0 {
                panic!("widget gone");
            }
        });
        let h3 = Arc::clone(&hits);
        cell.observe(move |_| {
            h3.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!cell.is_observing(bomb));
        assert_eq!(cell.observer_count(), 2);

        cell.set(2);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(cell.get(), Some(2));
    }

    #[test]
    fn dyn_cell_erases_values() {
        let cell = ReactiveCell::new(String::from("Ann"));
        let erased: Arc<dyn DynCell> = Arc::new(cell.clone());
        assert_eq!(erased.kind(), ValueKind::Text);
        assert_eq!(erased.value(), Some(Value::Text("Ann".into())));

        let seen = Arc::new(Mutex::new(Value::Null));
        let s = Arc::clone(&seen);
        let sub = erased.subscribe_value(Box::new(move |v| {
            *s.lock().unwrap() = v.clone();
            Ok(())
        }));
        cell.set("Bob".into());
        assert_eq!(*seen.lock().unwrap(), Value::Text("Bob".into()));
        assert_eq!(erased.observer_count(), 1);
        drop(sub);
        assert_eq!(erased.observer_count(), 0);
    }

    #[test]
    fn failing_observer_is_logged_at_warn() {
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct Buf(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for Buf {
            fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(bytes);
                Ok(bytes.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl<'a> MakeWriter<'a> for Buf {
            type Writer = Buf;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let buf = Buf::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buf.clone())
            .with_ansi(false)
            .finish();
        let cell = ReactiveCell::new(1_i64);
        cell.try_observe(|_| Err(ObserverError::new("disk full")));
        tracing::subscriber::with_default(subscriber, || cell.set(2));

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("disk full"), "{out}");
        assert_eq!(cell.observer_count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn failing_observers_are_removed_after_one_pass(
            fails in proptest::collection::vec(proptest::bool::ANY, 0..12),
        ) {
            let cell = ReactiveCell::new(0_i64);
            let calls = Arc::new(AtomicUsize::new(0));
            for &fail in &fails {
                let c = Arc::clone(&calls);
                cell.try_observe(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    if fail {
                        Err(ObserverError::new("fail"))
                    } else {
                        Ok(())
                    }
                });
            }

            cell.set(1);
            proptest::prop_assert_eq!(calls.load(Ordering::SeqCst), fails.len());
            let survivors = fails.iter().filter(|f| !**f).count();
            proptest::prop_assert_eq!(cell.observer_count(), survivors);

            cell.set(2);
            proptest::prop_assert_eq!(calls.load(Ordering::SeqCst), fails.len() + survivors);
        }
    }
}
