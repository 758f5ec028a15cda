#![forbid(unsafe_code)]

//! Native listener lists used by the reference widgets.
//!
//! Listeners are invoked from a snapshot taken under the lock, so a listener
//! may add or remove listeners (or mutate the widget) while it runs.

use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned when a native listener is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub(crate) struct ListenerList<E> {
    inner: Mutex<(u64, Vec<(ListenerId, Listener<E>)>)>,
}

impl<E> Default for ListenerList<E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new((1, Vec::new())),
        }
    }
}

impl<E> ListenerList<E> {
    pub(crate) fn add(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(inner.0);
        inner.0 += 1;
        inner.1.push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.1.len();
        inner.1.retain(|(lid, _)| *lid != id);
        inner.1.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .len()
    }

    pub(crate) fn notify(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn add_notify_remove() {
        let list: ListenerList<u8> = ListenerList::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = list.add(move |v| {
            h.fetch_add(usize::from(*v), Ordering::SeqCst);
        });
        list.notify(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(list.remove(id));
        assert!(!list.remove(id));
        list.notify(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(list.len(), 0);
    }
}
