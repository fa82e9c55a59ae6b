//! Permission-driven response redaction
//!
//! Two tiers, kept distinct:
//! - whole field groups are dropped (`None`) when the caller's tier is too low;
//! - PAN identifiers inside a visible group are masked with [`PAN_PLACEHOLDER`]
//!   unless `ReadPAN` is also granted.
//!
//! A caller holding neither the basic nor the detail permission of a resource
//! family is denied outright.

use tracing::debug;

use crate::error::EngineError;
use crate::permission::{Permission, PermissionSet, ResourceKind, Tier};

pub const PAN_SCHEME: &str = "UK.OBIE.PAN";
pub const PAN_PLACEHOLDER: &str = "xxxx xxxx xxxx xxxx";

/// What one caller may see of one resource family.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    grants: &'a PermissionSet,
    tier: Tier,
}

impl<'a> View<'a> {
    pub fn for_kind(kind: ResourceKind, grants: &'a PermissionSet) -> Result<Self, EngineError> {
        match grants.tier_for(kind) {
            Some(tier) => Ok(Self { grants, tier }),
            None => {
                debug!(resource = kind.name(), "no permission for resource");
                Err(EngineError::InsufficientPermissions {
                    resource: kind.name().to_string(),
                })
            }
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.grants.contains(permission)
    }

    /// Keep a field group only if the caller's tier reaches `required`.
    pub fn group<T>(&self, required: Tier, value: Option<T>) -> Option<T> {
        value.filter(|_| self.tier >= required)
    }

    pub fn reveals_pan(&self) -> bool {
        self.grants(Permission::ReadPAN)
    }
}

/// Objects whose fields are gated by permission.
pub trait Redact: Sized {
    const KIND: ResourceKind;

    /// Whether the object may be shown at all; lists drop objects that are not.
    fn visible_to(&self, _view: &View<'_>) -> bool {
        true
    }

    fn redact_with(self, view: &View<'_>) -> Self;
}

pub fn redact<T: Redact>(object: T, grants: &PermissionSet) -> Result<T, EngineError> {
    let view = View::for_kind(T::KIND, grants)?;
    if !object.visible_to(&view) {
        return Err(EngineError::InsufficientPermissions {
            resource: T::KIND.name().to_string(),
        });
    }
    Ok(object.redact_with(&view))
}

pub fn redact_all<T: Redact>(objects: Vec<T>, grants: &PermissionSet) -> Result<Vec<T>, EngineError> {
    let view = View::for_kind(T::KIND, grants)?;
    Ok(objects
        .into_iter()
        .filter(|o| o.visible_to(&view))
        .map(|o| o.redact_with(&view))
        .collect())
}
