#![forbid(unsafe_code)]

//! Error types for binding, invocation and observation.
//!
//! # Failure Modes
//!
//! | Error | Raised by | Propagation |
//! |-------|-----------|-------------|
//! | [`BindError`] | `bind` / `init` | Returned to the caller; the bind is aborted |
//! | [`InvocationError`] | accessor calls during load/sync/notify | Logged, recorded in the report, field skipped |
//! | [`ObserverError`] | fallible cell observers | Logged, observer removed |

use thiserror::Error;

use crate::descriptor::{ParamShape, ResourceId};
use crate::session::SessionKey;
use crate::value::ValueKind;

/// Which descriptor invariant a field violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// An element event key is declared but there is no model setter to feed.
    EventWithoutModelSetter,
    /// An element getter is declared but there is no model setter to feed.
    ElementGetterWithoutModelSetter,
    /// A model getter is declared but there is no element setter to load into.
    ModelGetterWithoutElementSetter,
    /// Two-way registration requested without a model getter.
    ObserveWithoutModelGetter,
    /// Two-way registration requested but the model getter does not return a cell.
    ModelGetterNotCell { getter: String },
    /// The field has a model binding but no element instance to bind against.
    MissingElement,
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventWithoutModelSetter => {
                write!(f, "an element event key is set but no model setter is defined")
            }
            Self::ElementGetterWithoutModelSetter => {
                write!(f, "an element getter is set but no model setter is defined")
            }
            Self::ModelGetterWithoutElementSetter => {
                write!(f, "a model getter is set but no element setter is defined")
            }
            Self::ObserveWithoutModelGetter => write!(
                f,
                "register_for_model_changes is set but no model getter is defined"
            ),
            Self::ModelGetterNotCell { getter } => write!(
                f,
                "register_for_model_changes is set but model getter `{getter}` does not return a reactive cell"
            ),
            Self::MissingElement => write!(f, "no element is available for this field"),
        }
    }
}

/// Bind-time failure. Fatal: the bind is aborted and never retried.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("binding contract violated for field `{field}`: {violation}")]
    Contract {
        field: String,
        violation: ContractViolation,
    },

    #[error("resource {id} for field `{owner}.{field}` was not found")]
    ResourceNotFound {
        owner: String,
        field: String,
        id: ResourceId,
    },

    #[error(
        "field `{owner}.{field}` has type `{declared}`; only elements and strings can be bound to resources"
    )]
    UnsupportedFieldType {
        owner: String,
        field: String,
        declared: String,
    },

    #[error("no accessor `{name}` with shape {shape} on `{type_name}` (same-name candidates: {candidates:?})")]
    AccessorNotFound {
        type_name: &'static str,
        name: String,
        shape: ParamShape,
        candidates: Vec<String>,
    },

    #[error("owner `{owner}` has no UI root")]
    NoRoot { owner: String },

    #[error("no binding session for `{key}`")]
    NotBound { key: SessionKey },

    #[error("session `{key}` holds a `{stored}` view-model; rebind supplied a `{supplied}`")]
    ModelTypeMismatch {
        key: SessionKey,
        stored: &'static str,
        supplied: &'static str,
    },
}

impl BindError {
    pub(crate) fn contract(field: &str, violation: ContractViolation) -> Self {
        Self::Contract {
            field: field.to_owned(),
            violation,
        }
    }

    /// Whether this is a descriptor contract violation.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        matches!(self, Self::Contract { .. })
    }
}

/// Runtime failure while invoking a resolved accessor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvocationError {
    #[error("expected a {expected} value, got {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    #[error("accessor for `{expected}` invoked on a different type")]
    TargetMismatch { expected: &'static str },

    #[error("{0}")]
    Failed(String),
}

/// Failure reported by a fallible cell observer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<InvocationError> for ObserverError {
    fn from(err: InvocationError) -> Self {
        Self(err.to_string())
    }
}

/// Failure loading a descriptor table.
#[cfg(feature = "descriptor-config")]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML descriptor table: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON descriptor table: {0}")]
    Json(#[from] serde_json::Error),
}
