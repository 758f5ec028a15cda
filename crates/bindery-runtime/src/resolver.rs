#![forbid(unsafe_code)]

//! Accessor resolution: descriptor names and shapes to callable accessors.
//!
//! # Matching
//!
//! Among the accessors carrying the requested name, in declaration order:
//!
//! | Requested shape | Picks |
//! |-----------------|-------|
//! | `ParamShape::None` | first getter |
//! | `ParamShape::Any` | first accessor, whatever it is |
//! | `ParamShape::Kind(k)` | first setter whose parameter kind accepts `k` |
//!
//! # Invariants
//!
//! 1. A type's accessor table is built at most once per [`AccessorCache`]
//!    lifetime, however many fields resolve against that type.
//! 2. Resolution either yields every requested accessor or fails; it never
//!    returns a partially resolved field.
//!
//! # Failure Modes
//!
//! - Descriptor contract violations: [`BindError::Contract`].
//! - No accessor matches: [`BindError::AccessorNotFound`] listing the
//!   same-name candidates that were rejected.

use std::any::TypeId;

use ahash::AHashMap;

use crate::accessor::{Accessor, AccessorSet, Bindable, type_key};
use crate::descriptor::{BindingDescriptor, ParamShape, non_empty};
use crate::error::{BindError, ContractViolation};

/// Callable accessors of one field, valid for every instance of the element
/// and model types they were resolved against.
#[derive(Clone, Debug, Default)]
pub struct ResolvedAccessors {
    pub element_setter: Option<Accessor>,
    pub element_getter: Option<Accessor>,
    pub model_setter: Option<Accessor>,
    pub model_getter: Option<Accessor>,
    pub event_key: Option<String>,
    /// Model changes are pushed into the element.
    pub two_way: bool,
}

impl ResolvedAccessors {
    /// Whether the field takes part in model binding at all.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.element_setter.is_some()
            || self.element_getter.is_some()
            || self.model_setter.is_some()
            || self.model_getter.is_some()
            || self.event_key.is_some()
    }
}

// ---------------------------------------------------------------------------
// AccessorCache
// ---------------------------------------------------------------------------

/// Accessor tables keyed by concrete type, valid for one resolution pass.
#[derive(Debug, Default)]
pub struct AccessorCache {
    tables: AHashMap<TypeId, AccessorSet>,
    scans: usize,
}

impl AccessorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accessor table of `target`'s concrete type, building it on first use.
    pub fn table(&mut self, target: &dyn Bindable) -> &AccessorSet {
        let scans = &mut self.scans;
        self.tables.entry(type_key(target)).or_insert_with(|| {
            *scans += 1;
            target.accessors()
        })
    }

    /// Number of accessor tables built so far.
    #[must_use]
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// Number of types currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drop cached tables. The scan counter is kept.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn find(
    cache: &mut AccessorCache,
    target: &dyn Bindable,
    name: &str,
    shape: ParamShape,
) -> Result<Accessor, BindError> {
    let table = cache.table(target);
    let found = table.named(name).find(|a| match shape {
        ParamShape::None => a.is_getter(),
        ParamShape::Any => true,
        ParamShape::Kind(kind) => a.param().is_some_and(|param| param.accepts(kind)),
    });
    match found {
        Some(accessor) => Ok(accessor.clone()),
        None => Err(BindError::AccessorNotFound {
            type_name: target.type_name(),
            name: name.to_owned(),
            shape,
            candidates: table.named(name).map(Accessor::signature).collect(),
        }),
    }
}

/// Resolve the accessors of one field.
///
/// `element` is the field's element instance (absent when the field has no
/// element yet). The tables of `element` and `model` are taken from `cache`.
///
/// # Errors
///
/// [`BindError::Contract`] or [`BindError::AccessorNotFound`].
pub fn resolve(
    descriptor: &BindingDescriptor,
    element: Option<&dyn Bindable>,
    model: &dyn Bindable,
    cache: &mut AccessorCache,
) -> Result<ResolvedAccessors, BindError> {
    let Some(binding) = &descriptor.model else {
        return Ok(ResolvedAccessors::default());
    };
    let field = descriptor.field.as_str();
    binding.validate(field)?;

    let element_setter_name = non_empty(binding.element_setter.as_deref());
    let element_getter_name = non_empty(binding.element_getter.as_deref());
    let model_setter_name = non_empty(binding.model_setter.as_deref());
    let model_getter_name = non_empty(binding.model_getter.as_deref());

    let needs_element = element_setter_name.is_some() || element_getter_name.is_some();
    let element = match (element, needs_element) {
        (Some(element), _) => Some(element),
        (None, false) => None,
        (None, true) => {
            return Err(BindError::contract(field, ContractViolation::MissingElement));
        }
    };

    let mut resolved = ResolvedAccessors {
        event_key: binding.event_key().map(str::to_owned),
        two_way: binding.register_for_model_changes,
        ..ResolvedAccessors::default()
    };

    if let Some(element) = element {
        if let Some(name) = element_setter_name {
            resolved.element_setter =
                Some(find(cache, element, name, binding.element_setter_param)?);
        }
        if let Some(name) = element_getter_name {
            resolved.element_getter = Some(find(cache, element, name, ParamShape::None)?);
        }
    }
    if let Some(name) = model_setter_name {
        resolved.model_setter = Some(find(cache, model, name, binding.model_setter_param)?);
    }
    if let Some(name) = model_getter_name {
        let getter = find(cache, model, name, ParamShape::None)?;
        if resolved.two_way && !getter.returns().is_some_and(|r| r.is_cell()) {
            return Err(BindError::contract(
                field,
                ContractViolation::ModelGetterNotCell {
                    getter: name.to_owned(),
                },
            ));
        }
        resolved.model_getter = Some(getter);
    }

    tracing::trace!(
        field,
        two_way = resolved.two_way,
        event = resolved.event_key.as_deref().unwrap_or(""),
        "resolved field accessors"
    );
    Ok(resolved)
}
