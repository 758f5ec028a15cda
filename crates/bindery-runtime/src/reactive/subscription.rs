#![forbid(unsafe_code)]

//! RAII detach guard shared by cell observers and listener registrations.

/// Guard that runs a detach action exactly once: on [`unsubscribe`](Self::unsubscribe)
/// or on drop, whichever comes first.
///
/// The engine uses the same guard for both directions of a binding: a
/// [`ReactiveCell`](super::ReactiveCell) observer removal and a listener
/// adapter unregistration.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a detach action.
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Whether the detach action has not run yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    /// Detach now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = Subscription::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn drop_runs_detach_once() {
        let (hits, sub) = counting();
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_runs_detach_once() {
        let (hits, sub) = counting();
        sub.unsubscribe();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
