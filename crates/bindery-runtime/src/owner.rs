#![forbid(unsafe_code)]

//! Interfaces the engine needs from its host: the owner being bound, its UI
//! root and the string resources.

use std::fmt;
use std::sync::Arc;

use crate::accessor::ElementHandle;
use crate::descriptor::{BindingDescriptor, ResourceId};
use crate::error::BindError;
use crate::session::SessionKey;

/// Element lookup by resource id.
pub trait UiRoot: Send + Sync {
    fn find_by_id(&self, id: ResourceId) -> Option<ElementHandle>;
}

/// String lookup by resource id.
pub trait StringResources: Send + Sync {
    fn resolve_string(&self, id: ResourceId) -> Option<String>;
}

/// A resource delivered to an owner field.
#[derive(Clone)]
pub enum BoundResource {
    Element(ElementHandle),
    Text(String),
}

impl BoundResource {
    #[must_use]
    pub fn as_element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Element(_) => None,
        }
    }
}

impl fmt::Debug for BoundResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => f.debug_tuple("Element").field(&element.type_name()).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// The UI object whose fields get bound (a screen, a fragment, a dialog).
///
/// An owner is recreated freely; binding state lives in the session named by
/// [`session_key`](Self::session_key), not in the owner.
pub trait Owner {
    /// Session key; the concrete type name unless overridden.
    fn session_key(&self) -> SessionKey {
        SessionKey::of::<Self>()
    }

    /// Root used to find elements by resource id.
    ///
    /// # Errors
    ///
    /// [`BindError::NoRoot`] when the owner has no UI root yet.
    fn ui_root(&self) -> Result<Arc<dyn UiRoot>, BindError>;

    /// Descriptors declared at `level` (0 = the owner's own level, 1 = its
    /// parent, ...). `None` once there is no further ancestor level.
    fn descriptors(&self, level: usize) -> Option<Vec<BindingDescriptor>>;

    /// Store a bound resource into `field`.
    fn attach(&self, field: &str, resource: BoundResource);

    /// Element currently held by `field`, for fields without a resource id.
    fn element(&self, field: &str) -> Option<ElementHandle> {
        let _ = field;
        None
    }
}
