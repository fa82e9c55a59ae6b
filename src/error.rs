use crate::consent::ConsentStatus;
use crate::lifecycle::SubmissionStatus;
use crate::version::ApiVersion;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{resource} '{id}' already exists for idempotency key '{idempotency_key}'")]
    Conflict {
        resource: String,
        id: String,
        idempotency_key: String,
    },
    #[error("Cannot move a submission from {from:?} to {to:?}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
    #[error("Submission '{id}' was modified concurrently, retry the request")]
    StateConflict { id: String },
    #[error("Consent grants no permission for {resource}")]
    InsufficientPermissions { resource: String },
    #[error("Unrecognised API version '{0}'")]
    MalformedVersion(String),
    #[error("Resource was created under API {origin} and cannot be accessed from {requested}")]
    VersionMismatch {
        requested: ApiVersion,
        origin: ApiVersion,
    },
    #[error("Consent '{consent_id}' is {status:?} and cannot be used")]
    ConsentNotUsable {
        consent_id: String,
        status: ConsentStatus,
    },
    #[error("Resource '{resource_id}' is not covered by the consent")]
    NotAuthorised { resource_id: String },
    #[error("No record found for '{id}'")]
    NotFound { id: String },
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Stored record could not be decoded: {0}")]
    Corrupt(String),
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
    #[error("Idempotency window {0} runs past the representable time range")]
    ExpiryOverflow(String),
}

impl EngineError {
    /// Status code the HTTP boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Conflict { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::StateConflict { .. }
            | EngineError::VersionMismatch { .. } => 409,
            EngineError::InsufficientPermissions { .. }
            | EngineError::ConsentNotUsable { .. }
            | EngineError::NotAuthorised { .. } => 403,
            EngineError::MalformedVersion(_) => 400,
            EngineError::NotFound { .. } => 404,
            EngineError::StoreUnavailable(_) => 503,
            EngineError::Corrupt(_)
            | EngineError::Identifier(_)
            | EngineError::ExpiryOverflow(_) => 500,
        }
    }

    /// Whether the caller may safely repeat the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StateConflict { .. } | EngineError::StoreUnavailable(_)
        )
    }
}

impl From<sled::Error> for EngineError {
    fn from(value: sled::Error) -> Self {
        EngineError::StoreUnavailable(value.to_string())
    }
}

impl From<minicbor::decode::Error> for EngineError {
    fn from(value: minicbor::decode::Error) -> Self {
        EngineError::Corrupt(value.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for EngineError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        EngineError::Corrupt(value.to_string())
    }
}
