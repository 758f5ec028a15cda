#![forbid(unsafe_code)]

//! The binding engine: bind, initial sync, live two-way sync and teardown.
//!
//! # Lifecycle
//!
//! ```text
//! Unbound ─bind─▶ Discovered ─▶ ResourceBound ─▶ ModelResolved
//!                                     ▲                │ load + register
//!                                     │ rebind         ▼
//!                               Unregistered ◀─── Synced
//!                                     │
//!                                     └─teardown(release)─▶ TornDown
//! ```
//!
//! The first bind of a session key discovers descriptors and resolves
//! accessors. Every later bind of the same key (a recreated owner instance)
//! only re-runs resource binding; the resolved accessors are reused as-is.
//!
//! # Invariants
//!
//! 1. A field never holds more than one model observer and one listener
//!    registration; repeated `register_*` calls are no-ops for it. Fields
//!    are tracked by position, so a name shadowed across levels is still two
//!    fields.
//! 2. `unregister_all` releases every live link and is idempotent.
//! 3. The session lock is released before any accessor, adapter or owner
//!    callback that could re-enter the engine through a cell runs.
//! 4. A bind that fails leaves no trace: a session it created is removed and
//!    a model it attached is detached.
//!
//! # Failure Modes
//!
//! - Bind-time failures ([`BindError`]) abort the bind and are returned.
//! - Accessor failures during load or live sync are logged at `warn`,
//!   recorded in the [`SyncReport`] where there is one, and skipped.
//! - Unknown adapter keys are logged at `error` and the field is skipped.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, error, warn};

use crate::accessor::{ElementHandle, ModelHandle, type_key};
use crate::adapter::{AdapterRegistry, AdapterSource, Emitter};
use crate::descriptor::FieldKind;
use crate::error::{BindError, InvocationError, ObserverError};
use crate::lock;
use crate::owner::{BoundResource, Owner, StringResources, UiRoot};
use crate::reactive::{BindingScope, Subscription};
use crate::resolver::{ResolvedAccessors, resolve};
use crate::session::{
    BindingSession, FieldBinding, SessionHandle, SessionKey, SessionState, SessionStore,
};
use crate::value::Value;

/// Options for [`Binder::init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// How many ancestor levels to collect descriptors from (0 = own level).
    pub ancestor_depth: usize,
    /// Stop after binding; skip the initial load and registrations.
    pub just_bind: bool,
}

impl BindOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ancestor_depth(mut self, depth: usize) -> Self {
        self.ancestor_depth = depth;
        self
    }

    #[must_use]
    pub fn just_bind(mut self, just_bind: bool) -> Self {
        self.just_bind = just_bind;
        self
    }
}

/// One field that could not be synced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    pub field: String,
    pub error: InvocationError,
}

/// Outcome of a sync or registration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Fields transferred or registered.
    pub applied: usize,
    pub failed: Vec<FieldFailure>,
}

impl SyncReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold `other` into this report.
    pub fn merge(&mut self, other: SyncReport) {
        self.applied += other.applied;
        self.failed.extend(other.failed);
    }

    fn fail(&mut self, key: &SessionKey, field: &str, error: InvocationError) {
        warn!(key = %key, field, error = %error, "field sync failed; skipping");
        self.failed.push(FieldFailure {
            field: field.to_owned(),
            error,
        });
    }
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

enum StoreRef {
    Global,
    Owned(Arc<SessionStore>),
}

impl StoreRef {
    fn get(&self) -> &SessionStore {
        match self {
            Self::Global => SessionStore::global(),
            Self::Owned(store) => store,
        }
    }
}

/// Builder for [`Binder`].
#[derive(Default)]
pub struct BinderBuilder {
    store: Option<Arc<SessionStore>>,
    adapters: Option<Arc<dyn AdapterSource>>,
    strings: Option<Arc<dyn StringResources>>,
}

impl BinderBuilder {
    /// Keep sessions in `store` instead of the process-wide store.
    #[must_use]
    pub fn store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn adapters(mut self, adapters: impl AdapterSource + 'static) -> Self {
        self.adapters = Some(Arc::new(adapters));
        self
    }

    #[must_use]
    pub fn strings(mut self, strings: Arc<dyn StringResources>) -> Self {
        self.strings = Some(strings);
        self
    }

    #[must_use]
    pub fn build(self) -> Binder {
        Binder {
            store: self.store.map_or(StoreRef::Global, StoreRef::Owned),
            adapters: self
                .adapters
                .unwrap_or_else(|| Arc::new(AdapterRegistry::new()) as Arc<dyn AdapterSource>),
            strings: self.strings,
        }
    }
}

/// Binds owners to view-models.
pub struct Binder {
    store: StoreRef,
    adapters: Arc<dyn AdapterSource>,
    strings: Option<Arc<dyn StringResources>>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("global_store", &matches!(self.store, StoreRef::Global))
            .field("sessions", &self.store.get().len())
            .field("has_strings", &self.strings.is_some())
            .finish()
    }
}

/// Snapshot of one field taken under the session lock.
struct FieldPlan {
    /// Position in `BindingSession::fields`; names may repeat across levels.
    index: usize,
    field: String,
    accessors: ResolvedAccessors,
    element: Option<ElementHandle>,
    observing: bool,
    listening: bool,
}

struct Plan {
    key: SessionKey,
    handle: SessionHandle,
    model: Option<ModelHandle>,
    fields: Vec<FieldPlan>,
}

impl Binder {
    #[must_use]
    pub fn builder() -> BinderBuilder {
        BinderBuilder::default()
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store this binder keeps its sessions in.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        self.store.get()
    }

    /// Session handle of `owner`, if it was ever bound.
    #[must_use]
    pub fn session(&self, owner: &dyn Owner) -> Option<SessionHandle> {
        self.store.get().get(&owner.session_key())
    }

    /// View-model attached to `owner`'s session.
    #[must_use]
    pub fn model(&self, owner: &dyn Owner) -> Option<ModelHandle> {
        let handle = self.session(owner)?;
        let session = lock(&handle);
        session.model.clone()
    }

    // -----------------------------------------------------------------------
    // bind
    // -----------------------------------------------------------------------

    /// Bind `owner`: discover and resolve on first bind, rebind resources
    /// only afterwards.
    ///
    /// A session that already holds a model keeps it; `model` is then only
    /// checked for type compatibility.
    ///
    /// # Errors
    ///
    /// Any [`BindError`] raised by discovery, resource binding or resolution.
    pub fn bind(
        &self,
        owner: &dyn Owner,
        ancestor_depth: usize,
        model: Option<ModelHandle>,
    ) -> Result<SessionHandle, BindError> {
        let key = owner.session_key();
        let span = debug_span!("bind", key = %key);
        let _guard = span.enter();

        let store = self.store.get();
        let handle = store.get_or_create(&key);
        let mut session = lock(&handle);
        let first = session.state == SessionState::Unbound;

        let mut stale = Vec::new();
        if session.in_use {
            debug!("releasing links of the previous owner instance");
            stale = take_links(&mut session);
        }

        let attached_model = match Self::attach_model(&mut session, model) {
            Ok(attached) => attached,
            Err(err) => {
                drop(session);
                drop(stale);
                return self.abandon(&handle, first, err);
            }
        };

        let result = self.bind_locked(owner, &mut session, ancestor_depth, first);
        if let Err(err) = result {
            if attached_model {
                session.model = None;
            }
            drop(session);
            drop(stale);
            return self.abandon(&handle, first, err);
        }
        drop(session);
        drop(stale);
        Ok(handle)
    }

    /// Attach `model` to the session. Returns whether this call attached it.
    fn attach_model(
        session: &mut BindingSession,
        model: Option<ModelHandle>,
    ) -> Result<bool, BindError> {
        let Some(model) = model else {
            return Ok(false);
        };
        let stored = match session.model.clone() {
            Some(stored) => stored,
            None => {
                session.model = Some(model);
                return Ok(true);
            }
        };
        if type_key(&*stored) != type_key(&*model) {
            return Err(BindError::ModelTypeMismatch {
                key: session.key.clone(),
                stored: stored.type_name(),
                supplied: model.type_name(),
            });
        }
        if !Arc::ptr_eq(&stored, &model) {
            warn!(
                key = %session.key,
                "rebind supplied a different view-model instance; keeping the stored one"
            );
        }
        Ok(false)
    }

    fn bind_locked(
        &self,
        owner: &dyn Owner,
        session: &mut BindingSession,
        ancestor_depth: usize,
        first: bool,
    ) -> Result<(), BindError> {
        if first {
            let mut fields = Vec::new();
            for level in 0..=ancestor_depth {
                let Some(descriptors) = owner.descriptors(level) else {
                    break;
                };
                fields.extend(descriptors.into_iter().map(FieldBinding::new));
            }
            debug!(fields = fields.len(), "descriptors discovered");
            session.fields = fields;
            session.transition(SessionState::Discovered);
        }

        self.bind_resources(owner, session)?;
        session.transition(SessionState::ResourceBound);

        if let Some(model) = session.model.clone() {
            if !session.resolved {
                resolve_fields(session, &model)?;
                session.resolved = true;
                session.transition(SessionState::ModelResolved);
            }
        }
        Ok(())
    }

    fn bind_resources(&self, owner: &dyn Owner, session: &mut BindingSession) -> Result<(), BindError> {
        let owner_name = session.key.to_string();
        let mut root: Option<Arc<dyn UiRoot>> = None;

        for field in &mut session.fields {
            let name = field.descriptor.field.clone();
            let Some(id) = field.descriptor.resource else {
                if field.descriptor.kind == FieldKind::Element {
                    field.element = owner.element(&name);
                }
                continue;
            };
            let not_found = || BindError::ResourceNotFound {
                owner: owner_name.clone(),
                field: name.clone(),
                id,
            };
            match &field.descriptor.kind {
                FieldKind::Element => {
                    let ui = match root.clone() {
                        Some(ui) => ui,
                        None => {
                            let ui = owner.ui_root()?;
                            root = Some(Arc::clone(&ui));
                            ui
                        }
                    };
                    let element = ui.find_by_id(id).ok_or_else(not_found)?;
                    owner.attach(&name, BoundResource::Element(Arc::clone(&element)));
                    field.element = Some(element);
                }
                FieldKind::Text => {
                    let text = self
                        .strings
                        .as_ref()
                        .and_then(|strings| strings.resolve_string(id))
                        .ok_or_else(not_found)?;
                    owner.attach(&name, BoundResource::Text(text));
                }
                FieldKind::Other(declared) => {
                    return Err(BindError::UnsupportedFieldType {
                        owner: owner_name,
                        field: name,
                        declared: declared.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop the session a failed first bind created.
    fn abandon<T>(&self, handle: &SessionHandle, first: bool, err: BindError) -> Result<T, BindError> {
        if first {
            let store = self.store.get();
            let key = lock(handle).key.clone();
            if store.get(&key).is_some_and(|current| Arc::ptr_eq(&current, handle)) {
                store.remove(&key);
            }
        }
        debug!(error = %err, "bind failed");
        Err(err)
    }

    /// [`bind`](Self::bind), then, unless `options.just_bind` is set or no
    /// model is attached, the initial model-to-element load and both
    /// registrations.
    ///
    /// # Errors
    ///
    /// Any [`BindError`] from [`bind`](Self::bind).
    pub fn init(
        &self,
        owner: &dyn Owner,
        options: BindOptions,
        model: Option<ModelHandle>,
    ) -> Result<SyncReport, BindError> {
        let handle = self.bind(owner, options.ancestor_depth, model)?;
        if options.just_bind || lock(&handle).model.is_none() {
            return Ok(SyncReport::default());
        }
        let mut report = self.load_model_into_element(owner)?;
        report.merge(self.register_model_observers(owner)?);
        report.merge(self.register_element_listeners(owner)?);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // sync
    // -----------------------------------------------------------------------

    fn plan(&self, owner: &dyn Owner) -> Result<Plan, BindError> {
        let key = owner.session_key();
        let handle = self
            .store
            .get()
            .get(&key)
            .ok_or_else(|| BindError::NotBound { key: key.clone() })?;
        let session = lock(&handle);
        let model = session.model.clone();
        let fields = session
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.accessors.is_bound())
            .map(|(index, f)| FieldPlan {
                index,
                field: f.descriptor.field.clone(),
                accessors: f.accessors.clone(),
                element: f.element.clone(),
                observing: f.is_observing_model(),
                listening: f.is_listening(),
            })
            .collect();
        drop(session);
        Ok(Plan {
            key,
            handle,
            model,
            fields,
        })
    }

    /// Push the model's current values into the elements.
    ///
    /// Cells are unwrapped to their current value. Without a model this is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`BindError::NotBound`] when `owner` was never bound.
    pub fn load_model_into_element(&self, owner: &dyn Owner) -> Result<SyncReport, BindError> {
        let plan = self.plan(owner)?;
        let _guard = debug_span!("load_model_into_element", key = %plan.key).entered();
        let mut report = SyncReport::default();
        let Some(model) = &plan.model else {
            return Ok(report);
        };
        for field in &plan.fields {
            let (Some(getter), Some(setter)) =
                (&field.accessors.model_getter, &field.accessors.element_setter)
            else {
                continue;
            };
            let Some(element) = &field.element else {
                report.fail(&plan.key, &field.field, missing_element());
                continue;
            };
            let outcome = getter
                .fetch(&**model)
                .and_then(|fetched| setter.apply(&**element, fetched.into_value()));
            match outcome {
                Ok(()) => report.applied += 1,
                Err(err) => report.fail(&plan.key, &field.field, err),
            }
        }
        Ok(report)
    }

    /// Read the elements and pass their values to the model setters.
    ///
    /// # Errors
    ///
    /// [`BindError::NotBound`] when `owner` was never bound.
    pub fn load_element_into_model(&self, owner: &dyn Owner) -> Result<SyncReport, BindError> {
        let plan = self.plan(owner)?;
        let _guard = debug_span!("load_element_into_model", key = %plan.key).entered();
        let mut report = SyncReport::default();
        let Some(model) = &plan.model else {
            return Ok(report);
        };
        for field in &plan.fields {
            let (Some(getter), Some(setter)) =
                (&field.accessors.element_getter, &field.accessors.model_setter)
            else {
                continue;
            };
            let Some(element) = &field.element else {
                report.fail(&plan.key, &field.field, missing_element());
                continue;
            };
            let outcome = getter
                .fetch(&**element)
                .and_then(|fetched| setter.apply(&**model, fetched.into_value()));
            match outcome {
                Ok(()) => report.applied += 1,
                Err(err) => report.fail(&plan.key, &field.field, err),
            }
        }
        Ok(report)
    }

    /// Observe the model cell of every two-way field and push its changes
    /// into the element.
    ///
    /// # Errors
    ///
    /// [`BindError::NotBound`] when `owner` was never bound.
    pub fn register_model_observers(&self, owner: &dyn Owner) -> Result<SyncReport, BindError> {
        let plan = self.plan(owner)?;
        let _guard = debug_span!("register_model_observers", key = %plan.key).entered();
        let mut report = SyncReport::default();
        let Some(model) = &plan.model else {
            return Ok(report);
        };

        let mut links = Vec::new();
        for field in plan.fields.iter().filter(|f| f.accessors.two_way && !f.observing) {
            let (Some(getter), Some(setter)) =
                (&field.accessors.model_getter, &field.accessors.element_setter)
            else {
                continue;
            };
            let Some(element) = field.element.clone() else {
                report.fail(&plan.key, &field.field, missing_element());
                continue;
            };
            let cell = match getter.fetch(&**model) {
                Ok(fetched) => match fetched.as_cell() {
                    Some(cell) => Arc::clone(cell),
                    None => {
                        let err = InvocationError::Failed(format!(
                            "model getter `{}` returned a plain value",
                            getter.name()
                        ));
                        report.fail(&plan.key, &field.field, err);
                        continue;
                    }
                },
                Err(err) => {
                    report.fail(&plan.key, &field.field, err);
                    continue;
                }
            };

            let setter = setter.clone();
            let key = plan.key.clone();
            let name = field.field.clone();
            let sub = cell.subscribe_value(Box::new(
                move |value: &Value| -> Result<(), ObserverError> {
                    if let Err(err) = setter.apply(&*element, value.clone()) {
                        warn!(key = %key, field = %name, error = %err, "model change not applied to element");
                    }
                    Ok(())
                },
            ));
            links.push((field.index, field.field.clone(), sub));
            report.applied += 1;
        }

        store_links(&plan.handle, links, |f| &mut f.observer);
        Ok(report)
    }

    /// Attach a listener adapter to every field with an event key; element
    /// changes are forwarded to the model setter.
    ///
    /// # Errors
    ///
    /// [`BindError::NotBound`] when `owner` was never bound.
    pub fn register_element_listeners(&self, owner: &dyn Owner) -> Result<SyncReport, BindError> {
        let plan = self.plan(owner)?;
        let _guard = debug_span!("register_element_listeners", key = %plan.key).entered();
        let mut report = SyncReport::default();
        let Some(model) = &plan.model else {
            return Ok(report);
        };

        let mut links = Vec::new();
        for field in plan.fields.iter().filter(|f| !f.listening) {
            let (Some(event), Some(setter)) =
                (&field.accessors.event_key, &field.accessors.model_setter)
            else {
                continue;
            };
            let Some(adapter) = self.adapters.lookup(event) else {
                error!(key = %plan.key, field = %field.field, event = %event, "unknown listener adapter key; field skipped");
                report.failed.push(FieldFailure {
                    field: field.field.clone(),
                    error: InvocationError::Failed(format!("unknown listener adapter `{event}`")),
                });
                continue;
            };
            let Some(element) = field.element.clone() else {
                report.fail(&plan.key, &field.field, missing_element());
                continue;
            };

            let setter = setter.clone();
            let target = Arc::clone(model);
            let key = plan.key.clone();
            let name = field.field.clone();
            let emitter = Emitter::new(move |value| {
                if let Err(err) = setter.apply(&*target, value) {
                    warn!(key = %key, field = %name, error = %err, "element change not applied to model");
                }
            });
            if let Err(err) = adapter.register(&element, emitter.clone()) {
                report.fail(&plan.key, &field.field, err);
                continue;
            }
            let sub = Subscription::new(move || adapter.unregister(&element, &emitter));
            links.push((field.index, field.field.clone(), sub));
            report.applied += 1;
        }

        store_links(&plan.handle, links, |f| &mut f.listener);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // teardown
    // -----------------------------------------------------------------------

    /// Release every observer and listener registered for `owner`.
    ///
    /// Returns `false` when nothing was registered (including when `owner`
    /// was never bound); calling it again is harmless.
    pub fn unregister_all(&self, owner: &dyn Owner) -> bool {
        let Some(handle) = self.session(owner) else {
            return false;
        };
        let mut session = lock(&handle);
        let was_in_use = session.in_use;
        let links = take_links(&mut session);
        if was_in_use {
            session.transition(SessionState::Unregistered);
        }
        drop(session);
        drop(links);
        was_in_use
    }

    /// Unregister if needed, and with `release_session` forget the session.
    pub fn teardown(&self, owner: &dyn Owner, release_session: bool) {
        let key = owner.session_key();
        let _guard = debug_span!("teardown", key = %key).entered();
        self.unregister_all(owner);
        if !release_session {
            return;
        }
        if let Some(handle) = self.store.get().remove(&key) {
            let mut session = lock(&handle);
            session.transition(SessionState::TornDown);
            session.fields.clear();
            session.model = None;
        }
    }
}

fn missing_element() -> InvocationError {
    InvocationError::Failed("field has no element".to_owned())
}

fn resolve_fields(session: &mut BindingSession, model: &ModelHandle) -> Result<(), BindError> {
    let BindingSession { fields, cache, .. } = session;
    let mut resolved = Vec::with_capacity(fields.len());
    let outcome: Result<(), BindError> = fields.iter().try_for_each(|field| {
        let accessors = resolve(
            &field.descriptor,
            field.element.as_deref(),
            &**model,
            cache,
        )?;
        resolved.push(accessors);
        Ok(())
    });
    cache.clear();
    outcome?;
    for (field, accessors) in fields.iter_mut().zip(resolved) {
        field.accessors = accessors;
    }
    Ok(())
}

/// Move every live link out of the session so it can be released unlocked.
fn take_links(session: &mut BindingSession) -> Vec<BindingScope> {
    let mut links = Vec::new();
    for field in session.fields.iter_mut().rev() {
        links.push(std::mem::take(&mut field.listener));
        links.push(std::mem::take(&mut field.observer));
    }
    session.release_links();
    links
}

/// Hand new links to their fields and mark the session in use.
///
/// Only called once a model is attached, so the session counts as in use
/// even when every field is one-way. A link whose field moved (a rebind
/// replaced the fields) or whose scope was filled meanwhile is released.
fn store_links(
    handle: &SessionHandle,
    links: Vec<(usize, String, Subscription)>,
    scope: impl Fn(&mut FieldBinding) -> &mut BindingScope,
) {
    let mut session = lock(handle);
    if session.state() == SessionState::TornDown {
        return;
    }
    for (index, name, sub) in links {
        match session
            .fields
            .get_mut(index)
            .filter(|f| f.descriptor.field == name)
            .map(&scope)
        {
            Some(slot) if slot.is_empty() => slot.hold(sub),
            _ => drop(sub),
        }
    }
    session.in_use = true;
    session.transition(SessionState::Synced);
}
