use std::collections::BTreeSet;

use crate::permission::PermissionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentStatus {
    AwaitingAuthorisation,
    Authorised,
    Consumed,
    Rejected,
    Revoked,
    Expired,
}

/// Resolved once per request upstream of the engine and never mutated here.
#[derive(Debug, Clone)]
pub struct ConsentAccessContext {
    consent_id: String,
    api_client_id: String,
    authorised_resource_ids: BTreeSet<String>,
    granted_permissions: PermissionSet,
    status: ConsentStatus,
}

impl ConsentAccessContext {
    pub fn new(consent_id: &str, api_client_id: &str, status: ConsentStatus) -> Self {
        Self {
            consent_id: consent_id.to_string(),
            api_client_id: api_client_id.to_string(),
            authorised_resource_ids: BTreeSet::new(),
            granted_permissions: PermissionSet::default(),
            status,
        }
    }
    pub fn with_resources<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.authorised_resource_ids
            .extend(ids.into_iter().map(str::to_string));
        self
    }
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.granted_permissions = permissions;
        self
    }

    pub fn consent_id(&self) -> &str {
        &self.consent_id
    }
    pub fn api_client_id(&self) -> &str {
        &self.api_client_id
    }
    pub fn granted_permissions(&self) -> &PermissionSet {
        &self.granted_permissions
    }
    pub fn status(&self) -> ConsentStatus {
        self.status
    }
    pub fn authorises(&self, resource_id: &str) -> bool {
        self.authorised_resource_ids.contains(resource_id)
    }

    /// New submissions need a freshly authorised consent.
    pub fn permits_new_submission(&self) -> bool {
        self.status == ConsentStatus::Authorised
    }

    /// Replays are also honoured once the consent has been consumed by the original request.
    pub fn permits_replay(&self) -> bool {
        matches!(
            self.status,
            ConsentStatus::Authorised | ConsentStatus::Consumed
        )
    }
}
