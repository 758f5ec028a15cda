#![forbid(unsafe_code)]

//! Accessor tables: named getters and setters exposed by elements and models.
//!
//! A type opts into binding by implementing [`Bindable`] and returning an
//! [`AccessorSet`] built with the typed builder:
//!
//! ```
//! use bindery_runtime::{AccessorSet, Bindable, ReactiveCell};
//!
//! struct Profile {
//!     name: ReactiveCell<String>,
//! }
//!
//! impl Bindable for Profile {
//!     fn accessors(&self) -> AccessorSet {
//!         AccessorSet::of::<Self>()
//!             .cell_getter("name", |p| p.name.clone())
//!             .setter("set_name", |p, v: String| p.name.set(v))
//!             .build()
//!     }
//! }
//!
//! let set = Profile { name: ReactiveCell::new(String::new()) }.accessors();
//! assert_eq!(set.len(), 2);
//! ```
//!
//! Accessors close over the *type*, not the instance: the same [`Accessor`]
//! can be invoked on every instance of that type, which is what lets a
//! binding session outlive the owner it was resolved against.
//!
//! # Failure Modes
//!
//! - Invoking an accessor on an instance of another type:
//!   [`InvocationError::TargetMismatch`].
//! - Passing a value the setter's parameter cannot take:
//!   [`InvocationError::TypeMismatch`].
//! - A `try_setter` closure returning an error: [`InvocationError::Failed`].

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::InvocationError;
use crate::reactive::{DynCell, ReactiveCell};
use crate::value::{Value, ValueKind, ValueType};

/// Upcast helper implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type whose state can be bound by name.
pub trait Bindable: AsAny + Send + Sync {
    /// The accessor table of this type. Must not depend on instance state.
    fn accessors(&self) -> AccessorSet;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn Bindable {
    /// Whether the concrete type behind this handle is `T`.
    #[must_use]
    pub fn is<T: Bindable>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the concrete value behind this handle.
    #[must_use]
    pub fn downcast_ref<T: Bindable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Shared handle to a UI element.
pub type ElementHandle = Arc<dyn Bindable>;

/// Shared handle to a view-model.
pub type ModelHandle = Arc<dyn Bindable>;

/// Concrete type id behind a bindable trait object.
pub(crate) fn type_key(target: &dyn Bindable) -> TypeId {
    target.as_any().type_id()
}

// ---------------------------------------------------------------------------
// Accessor
// ---------------------------------------------------------------------------

/// What a getter hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// A plain value of this kind.
    Value(ValueKind),
    /// A reactive cell holding values of this kind.
    Cell(ValueKind),
}

impl ReturnShape {
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::Value(kind) | Self::Cell(kind) => kind,
        }
    }

    #[must_use]
    pub fn is_cell(self) -> bool {
        matches!(self, Self::Cell(_))
    }
}

/// Result of invoking a getter.
#[derive(Clone)]
pub enum Fetched {
    Value(Value),
    Cell(Arc<dyn DynCell>),
}

impl Fetched {
    /// The plain value, unwrapping a cell to its current content.
    /// An empty cell yields [`Value::Null`].
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::Cell(cell) => cell.value().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn as_cell(&self) -> Option<&Arc<dyn DynCell>> {
        match self {
            Self::Cell(cell) => Some(cell),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Cell(cell) => f.debug_tuple("Cell").field(&cell.value()).finish(),
        }
    }
}

type GetFn = Arc<dyn Fn(&dyn Bindable) -> Result<Fetched, InvocationError> + Send + Sync>;
type SetFn = Arc<dyn Fn(&dyn Bindable, Value) -> Result<(), InvocationError> + Send + Sync>;

/// Getter or setter body.
#[derive(Clone)]
pub enum AccessorKind {
    Getter { returns: ReturnShape, call: GetFn },
    Setter { param: ValueKind, call: SetFn },
}

/// One named accessor of a bindable type.
#[derive(Clone)]
pub struct Accessor {
    name: String,
    owner: &'static str,
    kind: AccessorKind,
}

impl Accessor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the type this accessor was declared on.
    #[must_use]
    pub fn owner_type(&self) -> &'static str {
        self.owner
    }

    #[must_use]
    pub fn kind(&self) -> &AccessorKind {
        &self.kind
    }

    #[must_use]
    pub fn is_getter(&self) -> bool {
        matches!(self.kind, AccessorKind::Getter { .. })
    }

    /// Parameter kind of a setter.
    #[must_use]
    pub fn param(&self) -> Option<ValueKind> {
        match self.kind {
            AccessorKind::Setter { param, .. } => Some(param),
            AccessorKind::Getter { .. } => None,
        }
    }

    /// Return shape of a getter.
    #[must_use]
    pub fn returns(&self) -> Option<ReturnShape> {
        match self.kind {
            AccessorKind::Getter { returns, .. } => Some(returns),
            AccessorKind::Setter { .. } => None,
        }
    }

    /// Human-readable signature, used in resolution errors.
    #[must_use]
    pub fn signature(&self) -> String {
        match self.kind {
            AccessorKind::Getter {
                returns: ReturnShape::Value(kind),
                ..
            } => format!("{}() -> {kind}", self.name),
            AccessorKind::Getter {
                returns: ReturnShape::Cell(kind),
                ..
            } => format!("{}() -> cell<{kind}>", self.name),
            AccessorKind::Setter { param, .. } => format!("{}({param})", self.name),
        }
    }

    /// Invoke a getter on `target`.
    ///
    /// # Errors
    ///
    /// [`InvocationError`] when this is a setter or `target` has another type.
    pub fn fetch(&self, target: &dyn Bindable) -> Result<Fetched, InvocationError> {
        match &self.kind {
            AccessorKind::Getter { call, .. } => call(target),
            AccessorKind::Setter { .. } => Err(InvocationError::Failed(format!(
                "`{}` is a setter and cannot be read",
                self.name
            ))),
        }
    }

    /// Invoke a setter on `target`.
    ///
    /// # Errors
    ///
    /// [`InvocationError`] when this is a getter, `target` has another type,
    /// the value does not fit the parameter, or the setter itself fails.
    pub fn apply(&self, target: &dyn Bindable, value: Value) -> Result<(), InvocationError> {
        match &self.kind {
            AccessorKind::Setter { call, .. } => call(target, value),
            AccessorKind::Getter { .. } => Err(InvocationError::Failed(format!(
                "`{}` is a getter and cannot be written",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("owner", &self.owner)
            .field("signature", &self.signature())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AccessorSet
// ---------------------------------------------------------------------------

/// Ordered accessor table of one type. Overloads (several accessors with the
/// same name) are kept in declaration order.
#[derive(Clone, Debug, Default)]
pub struct AccessorSet {
    entries: Vec<Accessor>,
}

impl AccessorSet {
    /// Start a typed builder for `T`'s accessors.
    #[must_use]
    pub fn of<T: Bindable>() -> AccessorBuilder<T> {
        AccessorBuilder {
            entries: Vec::new(),
            _target: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Accessor> {
        self.entries.iter()
    }

    /// All accessors called `name`, in declaration order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Accessor> + 'a {
        self.entries.iter().filter(move |a| a.name == name)
    }
}

/// Typed builder returned by [`AccessorSet::of`].
pub struct AccessorBuilder<T> {
    entries: Vec<Accessor>,
    _target: PhantomData<fn(&T)>,
}

fn downcast<T: Bindable>(target: &dyn Bindable) -> Result<&T, InvocationError> {
    target
        .as_any()
        .downcast_ref::<T>()
        .ok_or(InvocationError::TargetMismatch {
            expected: std::any::type_name::<T>(),
        })
}

impl<T: Bindable> AccessorBuilder<T> {
    fn push(mut self, name: &str, kind: AccessorKind) -> Self {
        self.entries.push(Accessor {
            name: name.to_owned(),
            owner: std::any::type_name::<T>(),
            kind,
        });
        self
    }

    /// A getter returning a plain value.
    #[must_use]
    pub fn getter<V: ValueType>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        let call: GetFn = Arc::new(move |target| {
            let t = downcast::<T>(target)?;
            Ok(Fetched::Value(get(t).into_value()))
        });
        self.push(
            name,
            AccessorKind::Getter {
                returns: ReturnShape::Value(V::KIND),
                call,
            },
        )
    }

    /// A getter returning a reactive cell; required for two-way fields.
    #[must_use]
    pub fn cell_getter<V: ValueType>(
        self,
        name: &str,
        get: impl Fn(&T) -> ReactiveCell<V> + Send + Sync + 'static,
    ) -> Self {
        let call: GetFn = Arc::new(move |target| {
            let t = downcast::<T>(target)?;
            Ok(Fetched::Cell(Arc::new(get(t))))
        });
        self.push(
            name,
            AccessorKind::Getter {
                returns: ReturnShape::Cell(V::KIND),
                call,
            },
        )
    }

    /// An infallible setter.
    #[must_use]
    pub fn setter<V: ValueType>(
        self,
        name: &str,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self {
        self.try_setter(name, move |t, v: V| {
            set(t, v);
            Ok(())
        })
    }

    /// A setter that may reject the value.
    #[must_use]
    pub fn try_setter<V: ValueType>(
        self,
        name: &str,
        set: impl Fn(&T, V) -> Result<(), InvocationError> + Send + Sync + 'static,
    ) -> Self {
        let call: SetFn = Arc::new(move |target, value| {
            let t = downcast::<T>(target)?;
            set(t, V::from_value(value)?)
        });
        self.push(
            name,
            AccessorKind::Setter {
                param: V::KIND,
                call,
            },
        )
    }

    #[must_use]
    pub fn build(self) -> AccessorSet {
        AccessorSet {
            entries: self.entries,
        }
    }
}

impl<T: Bindable> From<AccessorBuilder<T>> for AccessorSet {
    fn from(builder: AccessorBuilder<T>) -> Self {
        builder.build()
    }
}
