#![forbid(unsafe_code)]

//! Declarative per-field binding descriptors.
//!
//! An owner describes each bindable field with a [`BindingDescriptor`]:
//! where the field's value comes from at creation (a resource id) and how the
//! field's element talks to the view-model (a [`ModelBinding`]).
//!
//! ```
//! use bindery_runtime::{BindingDescriptor, ModelBinding, ResourceId, ValueKind};
//!
//! let name = BindingDescriptor::element("name_input")
//!     .resource(ResourceId(0x7f01_0001))
//!     .model(
//!         ModelBinding::new()
//!             .element_setter("set_text")
//!             .element_setter_param(ValueKind::Text)
//!             .element_getter("text")
//!             .element_event("text_input.text_change")
//!             .model_setter("set_name")
//!             .model_getter("name")
//!             .register_for_model_changes(true),
//!     );
//! assert!(name.model.is_some());
//! ```
//!
//! # Contract
//!
//! Checked when accessors are resolved, not when descriptors are built:
//!
//! 1. An element event key or element getter requires a model setter.
//! 2. A model getter requires an element setter.
//! 3. `register_for_model_changes` requires a model getter returning a cell.

use core::fmt;

use crate::error::{BindError, ContractViolation};
use crate::value::ValueKind;

/// Identifier of a UI element or string resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Declared type of an owner field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FieldKind {
    /// A UI element handle, found through the owner's UI root.
    Element,
    /// A string, found through string resources.
    Text,
    /// Anything else; cannot be bound to a resource.
    Other(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element => f.write_str("element"),
            Self::Text => f.write_str("text"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Requested parameter shape used to pick among same-name accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "String", try_from = "String")
)]
pub enum ParamShape {
    /// No parameter: matches getters.
    None,
    /// First accessor with the requested name, whatever its signature.
    #[default]
    Any,
    /// First setter whose parameter kind accepts this kind.
    Kind(ValueKind),
}

impl From<ValueKind> for ParamShape {
    fn from(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("()"),
            Self::Any => f.write_str("(..)"),
            Self::Kind(kind) => write!(f, "({kind})"),
        }
    }
}

impl From<ParamShape> for String {
    fn from(shape: ParamShape) -> Self {
        match shape {
            ParamShape::None => "none".to_owned(),
            ParamShape::Any => "any".to_owned(),
            ParamShape::Kind(kind) => kind.to_string(),
        }
    }
}

impl TryFrom<String> for ParamShape {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let shape = match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Self::None,
            "any" => Self::Any,
            "null" => Self::Kind(ValueKind::Null),
            "bool" => Self::Kind(ValueKind::Bool),
            "int" => Self::Kind(ValueKind::Int),
            "float" => Self::Kind(ValueKind::Float),
            "text" => Self::Kind(ValueKind::Text),
            _ => return Err(format!("unknown parameter shape `{raw}`")),
        };
        Ok(shape)
    }
}

// ---------------------------------------------------------------------------
// ModelBinding
// ---------------------------------------------------------------------------

/// Accessor names connecting a field's element to the view-model.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ModelBinding {
    pub element_setter: Option<String>,
    pub element_setter_param: ParamShape,
    pub element_getter: Option<String>,
    /// Key of the listener adapter that reports element changes.
    pub element_event: Option<String>,
    pub model_setter: Option<String>,
    pub model_setter_param: ParamShape,
    pub model_getter: Option<String>,
    /// Push model cell changes into the element.
    pub register_for_model_changes: bool,
}

impl ModelBinding {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn element_setter(mut self, name: impl Into<String>) -> Self {
        self.element_setter = Some(name.into());
        self
    }

    #[must_use]
    pub fn element_setter_param(mut self, shape: impl Into<ParamShape>) -> Self {
        self.element_setter_param = shape.into();
        self
    }

    #[must_use]
    pub fn element_getter(mut self, name: impl Into<String>) -> Self {
        self.element_getter = Some(name.into());
        self
    }

    #[must_use]
    pub fn element_event(mut self, key: impl Into<String>) -> Self {
        self.element_event = Some(key.into());
        self
    }

    #[must_use]
    pub fn model_setter(mut self, name: impl Into<String>) -> Self {
        self.model_setter = Some(name.into());
        self
    }

    #[must_use]
    pub fn model_setter_param(mut self, shape: impl Into<ParamShape>) -> Self {
        self.model_setter_param = shape.into();
        self
    }

    #[must_use]
    pub fn model_getter(mut self, name: impl Into<String>) -> Self {
        self.model_getter = Some(name.into());
        self
    }

    #[must_use]
    pub fn register_for_model_changes(mut self, enabled: bool) -> Self {
        self.register_for_model_changes = enabled;
        self
    }

    /// Event key, treating an empty string as unset.
    #[must_use]
    pub fn event_key(&self) -> Option<&str> {
        non_empty(self.element_event.as_deref())
    }

    /// Check the structural part of the contract (everything except the
    /// cell-returning getter, which needs the resolved accessor).
    ///
    /// # Errors
    ///
    /// [`BindError::Contract`] naming the first violated rule.
    pub fn validate(&self, field: &str) -> Result<(), BindError> {
        let has = |name: &Option<String>| non_empty(name.as_deref()).is_some();
        let violation = if self.event_key().is_some() && !has(&self.model_setter) {
            Some(ContractViolation::EventWithoutModelSetter)
        } else if has(&self.element_getter) && !has(&self.model_setter) {
            Some(ContractViolation::ElementGetterWithoutModelSetter)
        } else if has(&self.model_getter) && !has(&self.element_setter) {
            Some(ContractViolation::ModelGetterWithoutElementSetter)
        } else if self.register_for_model_changes && !has(&self.model_getter) {
            Some(ContractViolation::ObserveWithoutModelGetter)
        } else {
            None
        };
        match violation {
            Some(violation) => Err(BindError::contract(field, violation)),
            None => Ok(()),
        }
    }
}

pub(crate) fn non_empty(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}

// ---------------------------------------------------------------------------
// BindingDescriptor
// ---------------------------------------------------------------------------

/// Binding declaration for one owner field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "descriptor-config",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BindingDescriptor {
    pub field: String,
    pub kind: FieldKind,
    #[cfg_attr(feature = "descriptor-config", serde(default))]
    pub resource: Option<ResourceId>,
    #[cfg_attr(feature = "descriptor-config", serde(default))]
    pub model: Option<ModelBinding>,
}

impl BindingDescriptor {
    #[must_use]
    pub fn new(field: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            field: field.into(),
            kind,
            resource: None,
            model: None,
        }
    }

    /// Descriptor for an element-typed field.
    #[must_use]
    pub fn element(field: impl Into<String>) -> Self {
        Self::new(field, FieldKind::Element)
    }

    /// Descriptor for a string-typed field.
    #[must_use]
    pub fn text(field: impl Into<String>) -> Self {
        Self::new(field, FieldKind::Text)
    }

    #[must_use]
    pub fn resource(mut self, id: ResourceId) -> Self {
        self.resource = Some(id);
        self
    }

    #[must_use]
    pub fn model(mut self, binding: ModelBinding) -> Self {
        self.model = Some(binding);
        self
    }
}

// ---------------------------------------------------------------------------
// DescriptorTable: serialized descriptor source
// ---------------------------------------------------------------------------

/// Descriptors loaded from a TOML or JSON document, grouped by owner level.
///
/// ```toml
/// [[binding]]
/// level = 0
/// field = "name_input"
/// kind = "element"
/// resource = 2130771969
///
/// [binding.model]
/// element_setter = "set_text"
/// model_getter = "name"
/// ```
#[cfg(feature = "descriptor-config")]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DescriptorTable {
    #[serde(rename = "binding", default)]
    entries: Vec<TableEntry>,
}

#[cfg(feature = "descriptor-config")]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct TableEntry {
    #[serde(default)]
    level: usize,
    #[serde(flatten)]
    descriptor: BindingDescriptor,
}

#[cfg(feature = "descriptor-config")]
impl DescriptorTable {
    /// # Errors
    ///
    /// [`ConfigError::Toml`](crate::ConfigError::Toml) on malformed input.
    pub fn from_toml_str(src: &str) -> Result<Self, crate::ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// # Errors
    ///
    /// [`ConfigError::Json`](crate::ConfigError::Json) on malformed input.
    pub fn from_json_str(src: &str) -> Result<Self, crate::ConfigError> {
        Ok(serde_json::from_str(src)?)
    }

    /// Append a descriptor at `level`.
    pub fn push(&mut self, level: usize, descriptor: BindingDescriptor) {
        self.entries.push(TableEntry { level, descriptor });
    }

    /// Highest level present, if any.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.entries.iter().map(|e| e.level).max()
    }

    /// Descriptors declared at `level`, or `None` past the deepest level.
    #[must_use]
    pub fn level(&self, level: usize) -> Option<Vec<BindingDescriptor>> {
        if self.depth().is_none_or(|depth| level > depth) {
            return None;
        }
        Some(
            self.entries
                .iter()
                .filter(|e| e.level == level)
                .map(|e| e.descriptor.clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_way() -> ModelBinding {
        ModelBinding::new()
            .element_setter("set_text")
            .element_getter("text")
            .element_event("text_change")
            .model_setter("set_name")
            .model_getter("name")
            .register_for_model_changes(true)
    }

    #[test]
    fn complete_binding_validates() {
        assert!(two_way().validate("f").is_ok());
        assert!(ModelBinding::new().validate("f").is_ok());
    }

    #[test]
    fn event_without_model_setter() {
        let mut binding = two_way();
        binding.model_setter = None;
        let err = binding.validate("f").unwrap_err();
        assert!(matches!(
            err,
            BindError::Contract {
                violation: ContractViolation::EventWithoutModelSetter,
                ..
            }
        ));
    }

    #[test]
    fn getter_without_model_setter() {
        let binding = ModelBinding::new().element_getter("text");
        assert!(matches!(
            binding.validate("f"),
            Err(BindError::Contract {
                violation: ContractViolation::ElementGetterWithoutModelSetter,
                ..
            })
        ));
    }

    #[test]
    fn model_getter_without_element_setter() {
        let binding = ModelBinding::new().model_getter("name");
        assert!(matches!(
            binding.validate("f"),
            Err(BindError::Contract {
                violation: ContractViolation::ModelGetterWithoutElementSetter,
                ..
            })
        ));
    }

    #[test]
    fn observe_without_model_getter() {
        let binding = ModelBinding::new().register_for_model_changes(true);
        assert!(matches!(
            binding.validate("f"),
            Err(BindError::Contract {
                violation: ContractViolation::ObserveWithoutModelGetter,
                ..
            })
        ));
    }

    #[test]
    fn empty_names_count_as_unset() {
        let binding = ModelBinding::new()
            .element_event("")
            .model_setter("")
            .element_setter("");
        assert!(binding.validate("f").is_ok());
        assert_eq!(binding.event_key(), None);
    }

    #[test]
    fn param_shape_parses() {
        assert_eq!(ParamShape::try_from("text".to_owned()), Ok(ParamShape::Kind(ValueKind::Text)));
        assert_eq!(ParamShape::try_from("ANY".to_owned()), Ok(ParamShape::Any));
        assert_eq!(ParamShape::try_from("none".to_owned()), Ok(ParamShape::None));
        assert!(ParamShape::try_from("widget".to_owned()).is_err());
        assert_eq!(String::from(ParamShape::Kind(ValueKind::Int)), "int");
    }

    #[test]
    fn resource_id_display_is_hex() {
        assert_eq!(ResourceId(0x7f01_0001).to_string(), "0x7f010001");
    }
}
