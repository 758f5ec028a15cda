#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Bindery.
//!
//! The fixtures model a small profile screen: a view-model with name,
//! newsletter and plan cells, three widgets in a [`WidgetTree`], a localized
//! title string, and the descriptors wiring them together.
//!
//! [`capture_logs`] runs a closure under a scoped `tracing` subscriber and
//! returns everything it logged, for asserting on diagnostics.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use bindery_runtime::{
    AccessorSet, Bindable, Binder, BindingDescriptor, ModelBinding, ReactiveCell, SessionStore,
    ValueKind,
};
use bindery_widgets::{
    Choice, Screen, StringTable, TextInput, Toggle, WidgetTree, adapter_keys, standard_registry,
};
use tracing_subscriber::EnvFilter;

/// Resource ids of the profile screen.
pub mod ids {
    use bindery_runtime::ResourceId;

    pub const NAME_INPUT: ResourceId = ResourceId(0x7f01_0001);
    pub const NEWSLETTER_TOGGLE: ResourceId = ResourceId(0x7f01_0002);
    pub const PLAN_CHOICE: ResourceId = ResourceId(0x7f01_0003);
    pub const TITLE: ResourceId = ResourceId(0x7f02_0001);
}

/// Plan names, indexed by the model's `plan` value.
pub const PLANS: [&str; 3] = ["free", "team", "enterprise"];

// ---------------------------------------------------------------------------
// View-model
// ---------------------------------------------------------------------------

/// Profile view-model.
pub struct ProfileModel {
    pub name: ReactiveCell<String>,
    pub newsletter: ReactiveCell<bool>,
    pub plan: ReactiveCell<i64>,
    /// Number of `set_name` calls, to observe element-to-model traffic.
    name_writes: Mutex<usize>,
}

impl ProfileModel {
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: ReactiveCell::new(name.to_owned()),
            newsletter: ReactiveCell::new(false),
            plan: ReactiveCell::new(0),
            name_writes: Mutex::new(0),
        })
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn set_name(&self, name: String) {
        *self.name_writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.name.set(name);
    }

    #[must_use]
    pub fn name_writes(&self) -> usize {
        *self.name_writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derived text, only available as a plain getter.
    #[must_use]
    pub fn greeting(&self) -> String {
        format!("Hello, {}", self.name())
    }
}

impl Bindable for ProfileModel {
    fn accessors(&self) -> AccessorSet {
        AccessorSet::of::<Self>()
            .cell_getter("name", |m| m.name.clone())
            .setter("set_name", ProfileModel::set_name)
            .cell_getter("newsletter", |m| m.newsletter.clone())
            .setter("set_newsletter", |m, on: bool| m.newsletter.set(on))
            .cell_getter("plan", |m| m.plan.clone())
            .setter("set_plan", |m, plan: i64| m.plan.set(plan))
            .getter("greeting", ProfileModel::greeting)
            .build()
    }
}

impl std::fmt::Debug for ProfileModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileModel")
            .field("name", &self.name.get())
            .field("newsletter", &self.newsletter.get())
            .field("plan", &self.plan.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Two-way binding of a text input to the model's `name` cell.
#[must_use]
pub fn name_binding() -> ModelBinding {
    ModelBinding::new()
        .element_setter("set_text")
        .element_setter_param(ValueKind::Text)
        .element_getter("text")
        .element_event(adapter_keys::TEXT_CHANGE)
        .model_setter("set_name")
        .model_setter_param(ValueKind::Text)
        .model_getter("name")
        .register_for_model_changes(true)
}

/// Descriptors of the profile screen (level 0).
#[must_use]
pub fn profile_descriptors() -> Vec<BindingDescriptor> {
    vec![
        BindingDescriptor::element("name_input")
            .resource(ids::NAME_INPUT)
            .model(name_binding()),
        BindingDescriptor::element("newsletter_toggle")
            .resource(ids::NEWSLETTER_TOGGLE)
            .model(
                ModelBinding::new()
                    .element_setter("set_checked")
                    .element_setter_param(ValueKind::Bool)
                    .element_getter("is_checked")
                    .element_event(adapter_keys::CHECKED_CHANGE)
                    .model_setter("set_newsletter")
                    .model_getter("newsletter")
                    .register_for_model_changes(true),
            ),
        BindingDescriptor::element("plan_choice")
            .resource(ids::PLAN_CHOICE)
            .model(
                ModelBinding::new()
                    .element_setter("set_selected_index")
                    .element_setter_param(ValueKind::Int)
                    .element_getter("selected_index")
                    .element_event(adapter_keys::SELECTION_CHANGE)
                    .model_setter("set_plan")
                    .model_getter("plan")
                    .register_for_model_changes(true),
            ),
        BindingDescriptor::text("title").resource(ids::TITLE),
    ]
}

// ---------------------------------------------------------------------------
// Widgets, strings and owner
// ---------------------------------------------------------------------------

/// The widgets of one profile screen instance.
#[derive(Debug, Clone)]
pub struct ProfileWidgets {
    pub name: Arc<TextInput>,
    pub newsletter: Arc<Toggle>,
    pub plan: Arc<Choice>,
    pub tree: Arc<WidgetTree>,
}

impl ProfileWidgets {
    /// Fresh widgets, as created when a screen is (re)built.
    #[must_use]
    pub fn new() -> Self {
        let name = Arc::new(TextInput::new());
        let newsletter = Arc::new(Toggle::new(false));
        let plan = Arc::new(Choice::new(PLANS));
        let tree = Arc::new(
            WidgetTree::new()
                .with(ids::NAME_INPUT, Arc::clone(&name))
                .with(ids::NEWSLETTER_TOGGLE, Arc::clone(&newsletter))
                .with(ids::PLAN_CHOICE, Arc::clone(&plan)),
        );
        Self {
            name,
            newsletter,
            plan,
            tree,
        }
    }

    /// A profile screen over these widgets, keyed by `key`.
    #[must_use]
    pub fn screen(&self, key: &str) -> Screen {
        Screen::new(key)
            .root(Arc::clone(&self.tree))
            .level(profile_descriptors())
    }

    /// Native listeners currently attached across all widgets.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.name.listener_count() + self.newsletter.listener_count() + self.plan.listener_count()
    }
}

impl Default for ProfileWidgets {
    fn default() -> Self {
        Self::new()
    }
}

/// Title strings in English and Spanish, falling back to English.
#[must_use]
pub fn profile_strings(locale: &str) -> Arc<StringTable> {
    Arc::new(
        StringTable::new(locale)
            .with("en", ids::TITLE, "Profile")
            .with("es", ids::TITLE, "Perfil")
            .with_fallback_chain(["en"]),
    )
}

/// Binder with a private session store, the standard adapters and the
/// profile strings.
#[must_use]
pub fn profile_binder(strings: Arc<StringTable>) -> Binder {
    Binder::builder()
        .store(Arc::new(SessionStore::new()))
        .adapters(standard_registry())
        .strings(strings)
        .build()
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct LogWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber recording every event at `TRACE`
/// and above; returns `f`'s result and the formatted log.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let make_writer = {
        let buf = Arc::clone(&buf);
        move || LogWriter {
            buf: Arc::clone(&buf),
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("trace"))
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_writer(make_writer)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.lock().unwrap_or_else(PoisonError::into_inner).clone();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}

/// Install a global test subscriber honoring `RUST_LOG` (default `warn`).
/// Later calls are no-ops.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
