//! Version compatibility checks for reads and writes of stored resources

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::submission::Submission;
use crate::version::{ApiVersion, VersionRegistry};

/// Anything stored with the release it was created under.
pub trait Versioned {
    fn origin_version(&self) -> ApiVersion;
}

impl Versioned for Submission {
    fn origin_version(&self) -> ApiVersion {
        self.origin_version
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied {
        requested: ApiVersion,
        origin: ApiVersion,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    pub fn into_result(self) -> Result<(), EngineError> {
        match self {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::Denied { requested, origin } => {
                Err(EngineError::VersionMismatch { requested, origin })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessGate<'a> {
    registry: &'a VersionRegistry,
}

impl<'a> AccessGate<'a> {
    pub fn new(registry: &'a VersionRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, requested: ApiVersion, resource: &impl Versioned) -> AccessDecision {
        let origin = resource.origin_version();
        if self.registry.is_access_allowed(&requested, &origin) {
            return AccessDecision::Allowed;
        }
        warn!(%requested, %origin, "access from an older release denied");
        AccessDecision::Denied { requested, origin }
    }

    /// Parse the caller's release string, then evaluate.
    pub fn evaluate_raw(
        &self,
        requested: &str,
        resource: &impl Versioned,
    ) -> Result<AccessDecision, EngineError> {
        let requested = self.registry.parse(requested)?;
        Ok(self.evaluate(requested, resource))
    }

    /// Admit a mutation and return the release the resource should be stamped with
    /// afterwards; origin versions only ever move forward.
    pub fn admit_mutation(
        &self,
        requested: ApiVersion,
        resource: &impl Versioned,
    ) -> Result<ApiVersion, EngineError> {
        self.evaluate(requested, resource).into_result()?;
        let origin = resource.origin_version();
        if requested > origin {
            debug!(%origin, %requested, "restamping resource with newer release");
        }
        Ok(requested.max(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(ApiVersion);

    impl Versioned for Stub {
        fn origin_version(&self) -> ApiVersion {
            self.0
        }
    }

    #[test]
    fn same_or_newer_release_is_allowed() {
        let registry = VersionRegistry::default();
        let gate = AccessGate::new(&registry);
        let resource = Stub(ApiVersion::new(3, 1, 10));

        assert_eq!(
            gate.evaluate_raw("3.1.3", &resource).unwrap(),
            AccessDecision::Denied {
                requested: ApiVersion::new(3, 1, 3),
                origin: ApiVersion::new(3, 1, 10),
            }
        );
        assert!(gate.evaluate_raw("3.1.10", &resource).unwrap().is_allowed());
        assert!(gate.evaluate_raw("4.0.0", &resource).unwrap().is_allowed());
    }

    #[test]
    fn malformed_version_is_rejected_before_evaluation() {
        let registry = VersionRegistry::default();
        let gate = AccessGate::new(&registry);
        let resource = Stub(ApiVersion::new(3, 1, 10));

        assert!(matches!(
            gate.evaluate_raw("three", &resource),
            Err(EngineError::MalformedVersion(_))
        ));
    }

    #[test]
    fn mutation_restamps_forward() {
        let registry = VersionRegistry::default();
        let gate = AccessGate::new(&registry);
        let resource = Stub(ApiVersion::new(3, 1, 2));

        assert_eq!(
            gate.admit_mutation(ApiVersion::new(4, 0, 0), &resource),
            Ok(ApiVersion::new(4, 0, 0))
        );
        assert_eq!(
            gate.admit_mutation(ApiVersion::new(3, 1, 0), &resource),
            Err(EngineError::VersionMismatch {
                requested: ApiVersion::new(3, 1, 0),
                origin: ApiVersion::new(3, 1, 2),
            })
        );
    }
}
