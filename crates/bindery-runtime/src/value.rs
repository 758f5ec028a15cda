#![forbid(unsafe_code)]

//! Dynamic values exchanged between element and view-model accessors.
//!
//! Accessors are resolved by name at bind time, so the values flowing through
//! them are carried as a small closed [`Value`] enum. Typed Rust values cross
//! that boundary through [`ValueType`].
//!
//! # Assignability
//!
//! A parameter of kind `P` accepts a requested kind `R` when:
//!
//! | `P` | accepts |
//! |-----|---------|
//! | `Any` | every kind |
//! | `Float` | `Float`, `Int` |
//! | any other | exactly itself |

use core::fmt;

use crate::error::InvocationError;

/// Kind tag of a [`Value`], also used to describe accessor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    /// Accepts every kind when used as a parameter kind.
    Any,
}

impl ValueKind {
    /// Whether a parameter of this kind can receive a value of kind `requested`.
    #[must_use]
    pub fn accepts(self, requested: ValueKind) -> bool {
        match (self, requested) {
            (Self::Any, _) => true,
            (Self::Float, Self::Int) => true,
            (p, r) => p == r,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// The kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// ValueType: typed conversion
// ---------------------------------------------------------------------------

/// Conversion between a Rust type and [`Value`].
///
/// `KIND` is what accessor tables advertise for parameters and return values
/// of this type, and what the resolver matches requested shapes against.
pub trait ValueType: Sized + Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    /// # Errors
    ///
    /// [`InvocationError::TypeMismatch`] when `value` has an incompatible kind.
    fn from_value(value: Value) -> Result<Self, InvocationError>;
}

fn mismatch(expected: ValueKind, found: &Value) -> InvocationError {
    InvocationError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

impl ValueType for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        Ok(value)
    }
}

impl ValueType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl ValueType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl ValueType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl ValueType for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| InvocationError::Failed(format!(
                "integer {i} does not fit in i32"
            ))),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl ValueType for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self, InvocationError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

/// `None` maps to [`Value::Null`] and back.
impl<T: ValueType> ValueType for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn into_value(self) -> Value {
        self.map_or(Value::Null, ValueType::into_value)
    }

    fn from_value(value: Value) -> Result<Self, InvocationError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
