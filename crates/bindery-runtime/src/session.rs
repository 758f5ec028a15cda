#![forbid(unsafe_code)]

//! Binding sessions and the keyed store that keeps them alive.
//!
//! A [`BindingSession`] holds everything resolved for one owner type: the
//! field table, the attached view-model and the live links created by the
//! engine. Sessions are keyed by [`SessionKey`] (the owner's type name by
//! default), so a recreated owner instance finds the session its predecessor
//! left behind.
//!
//! # Invariants
//!
//! 1. `get_or_create` is atomic per key: concurrent callers observe the same
//!    session.
//! 2. The store never evicts on its own; sessions leave only through
//!    [`SessionStore::remove`].
//! 3. A session becomes `in_use` once `register_*` ran with a model attached,
//!    even when every field is one-way; only `unregister_all` and a rebind of
//!    a new owner instance release the links and clear the flag.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use ahash::AHashMap;

use crate::accessor::{ElementHandle, ModelHandle};
use crate::descriptor::BindingDescriptor;
use crate::lock;
use crate::reactive::BindingScope;
use crate::resolver::{AccessorCache, ResolvedAccessors};

/// Identifies a binding session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key derived from a type name, the default for owners.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing discovered yet.
    Unbound,
    /// Descriptors collected from the owner.
    Discovered,
    /// Resource ids attached to the current owner instance.
    ResourceBound,
    /// Accessors resolved against the view-model.
    ModelResolved,
    /// Initial load done and listeners/observers registered.
    Synced,
    /// Live links released; the session waits for a rebind.
    Unregistered,
    /// Removed from its store.
    TornDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "unbound",
            Self::Discovered => "discovered",
            Self::ResourceBound => "resource-bound",
            Self::ModelResolved => "model-resolved",
            Self::Synced => "synced",
            Self::Unregistered => "unregistered",
            Self::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// FieldBinding
// ---------------------------------------------------------------------------

/// Runtime record of one bound field.
pub struct FieldBinding {
    pub(crate) descriptor: BindingDescriptor,
    pub(crate) accessors: ResolvedAccessors,
    /// Element of the current owner instance, refreshed on every rebind.
    pub(crate) element: Option<ElementHandle>,
    /// Model cell observer pushing into the element.
    pub(crate) observer: BindingScope,
    /// Listener adapter registration feeding the model.
    pub(crate) listener: BindingScope,
}

impl FieldBinding {
    pub(crate) fn new(descriptor: BindingDescriptor) -> Self {
        Self {
            descriptor,
            accessors: ResolvedAccessors::default(),
            element: None,
            observer: BindingScope::new(),
            listener: BindingScope::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.field
    }

    #[must_use]
    pub fn descriptor(&self) -> &BindingDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn accessors(&self) -> &ResolvedAccessors {
        &self.accessors
    }

    #[must_use]
    pub fn element(&self) -> Option<&ElementHandle> {
        self.element.as_ref()
    }

    #[must_use]
    pub fn is_observing_model(&self) -> bool {
        !self.observer.is_empty()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        !self.listener.is_empty()
    }

    /// Release this field's live links.
    pub(crate) fn release(&mut self) {
        self.observer.clear();
        self.listener.clear();
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.descriptor.field)
            .field("accessors", &self.accessors)
            .field("has_element", &self.element.is_some())
            .field("observing", &self.is_observing_model())
            .field("listening", &self.is_listening())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BindingSession
// ---------------------------------------------------------------------------

/// Resolved binding state of one session key.
pub struct BindingSession {
    pub(crate) key: SessionKey,
    pub(crate) fields: Vec<FieldBinding>,
    pub(crate) model: Option<ModelHandle>,
    pub(crate) cache: AccessorCache,
    /// Accessors were resolved against the model type.
    pub(crate) resolved: bool,
    pub(crate) state: SessionState,
    pub(crate) in_use: bool,
}

impl BindingSession {
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            fields: Vec::new(),
            model: None,
            cache: AccessorCache::new(),
            resolved: false,
            state: SessionState::Unbound,
            in_use: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether listeners or observers are currently registered.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    #[must_use]
    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Accessor tables built for this session so far.
    #[must_use]
    pub fn accessor_scans(&self) -> usize {
        self.cache.scans()
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(key = %self.key, from = %self.state, to = %next, "session state");
            self.state = next;
        }
    }

    /// Release every live link. Returns `false` when nothing was registered.
    pub(crate) fn release_links(&mut self) -> bool {
        let was_in_use = self.in_use;
        for field in self.fields.iter_mut().rev() {
            field.release();
        }
        self.in_use = false;
        was_in_use
    }
}

impl fmt::Debug for BindingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSession")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("fields", &self.fields.len())
            .field("has_model", &self.model.is_some())
            .field("in_use", &self.in_use)
            .finish()
    }
}

/// Shared handle to a session.
pub type SessionHandle = Arc<Mutex<BindingSession>>;

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Keyed session map.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<AHashMap<SessionKey, SessionHandle>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store used by binders that were not given one.
    pub fn global() -> &'static SessionStore {
        static GLOBAL: OnceLock<SessionStore> = OnceLock::new();
        GLOBAL.get_or_init(SessionStore::new)
    }

    /// Session for `key`, created in the `Unbound` state if absent.
    pub fn get_or_create(&self, key: &SessionKey) -> SessionHandle {
        let mut sessions = lock(&self.sessions);
        Arc::clone(sessions.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(key = %key, "binding session created");
            Arc::new(Mutex::new(BindingSession::new(key.clone())))
        }))
    }

    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        lock(&self.sessions).get(key).cloned()
    }

    /// Remove and return the session for `key`.
    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        lock(&self.sessions).remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.sessions).is_empty()
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = lock(&self.sessions).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn get_or_create_reuses_session() {
        let store = SessionStore::new();
        let key = SessionKey::from("ProfileScreen");
        let a = store.get_or_create(&key);
        let b = store.get_or_create(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
        assert_eq!(lock(&a).state(), SessionState::Unbound);
    }

    #[test]
    fn remove_then_create_starts_fresh() {
        let store = SessionStore::new();
        let key = SessionKey::from("ProfileScreen");
        let first = store.get_or_create(&key);
        lock(&first).transition(SessionState::Synced);

        assert!(store.remove(&key).is_some());
        assert!(store.remove(&key).is_none());
        assert!(store.get(&key).is_none());

        let second = store.get_or_create(&key);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(lock(&second).state(), SessionState::Unbound);
    }

    #[test]
    fn concurrent_first_creation_yields_one_session() {
        let store = Arc::new(SessionStore::new());
        let barrier = Arc::new(Barrier::new(8));
        let key = SessionKey::from("Shared");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let key = key.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.get_or_create(&key)
                })
            })
            .collect();
        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.len(), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[test]
    fn keys_are_sorted() {
        let store = SessionStore::new();
        for k in ["b", "a", "c"] {
            store.get_or_create(&SessionKey::from(k));
        }
        let keys: Vec<_> = store.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(!store.is_empty());
    }

    #[test]
    fn session_key_of_uses_type_name() {
        struct ProfileScreen;
        assert!(SessionKey::of::<ProfileScreen>().as_str().ends_with("ProfileScreen"));
    }

    #[test]
    fn release_links_reports_previous_use() {
        let mut session = BindingSession::new(SessionKey::from("s"));
        assert!(!session.release_links());
        session.in_use = true;
        assert!(session.release_links());
        assert!(!session.is_in_use());
    }
}
