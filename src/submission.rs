//! Submission records and the kinds of write the engine accepts
use chrono::Utc;

use crate::error::EngineError;
use crate::lifecycle::SubmissionStatus;
use crate::types::TimeStamp;
use crate::utils;
use crate::version::ApiVersion;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionKind {
    #[n(0)]
    DomesticPayment,
    #[n(1)]
    DomesticScheduledPayment,
    #[n(2)]
    DomesticStandingOrder,
    #[n(3)]
    InternationalPayment,
    #[n(4)]
    InternationalScheduledPayment,
    #[n(5)]
    InternationalStandingOrder,
    #[n(6)]
    FilePayment,
    #[n(7)]
    DomesticVrpPayment,
}

/// How replays of a submission kind are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMode {
    /// One submission per consent; the consent id is the submission id.
    IdentityKeyed,
    /// Many submissions per consent; keys are remembered for a bounded window.
    ScopedWithExpiry,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 8] = [
        SubmissionKind::DomesticPayment,
        SubmissionKind::DomesticScheduledPayment,
        SubmissionKind::DomesticStandingOrder,
        SubmissionKind::InternationalPayment,
        SubmissionKind::InternationalScheduledPayment,
        SubmissionKind::InternationalStandingOrder,
        SubmissionKind::FilePayment,
        SubmissionKind::DomesticVrpPayment,
    ];

    pub fn dedup_mode(&self) -> DedupMode {
        match self {
            SubmissionKind::DomesticVrpPayment => DedupMode::ScopedWithExpiry,
            _ => DedupMode::IdentityKeyed,
        }
    }

    pub fn initial_status(&self) -> SubmissionStatus {
        match self {
            SubmissionKind::DomesticScheduledPayment
            | SubmissionKind::DomesticStandingOrder
            | SubmissionKind::InternationalScheduledPayment
            | SubmissionKind::InternationalStandingOrder => SubmissionStatus::PendingInitiation,
            SubmissionKind::DomesticPayment
            | SubmissionKind::InternationalPayment
            | SubmissionKind::FilePayment
            | SubmissionKind::DomesticVrpPayment => SubmissionStatus::PendingAcceptance,
        }
    }

    /// Resource name as it appears in API paths and error messages.
    pub fn resource_name(&self) -> &'static str {
        match self {
            SubmissionKind::DomesticPayment => "domestic-payments",
            SubmissionKind::DomesticScheduledPayment => "domestic-scheduled-payments",
            SubmissionKind::DomesticStandingOrder => "domestic-standing-orders",
            SubmissionKind::InternationalPayment => "international-payments",
            SubmissionKind::InternationalScheduledPayment => "international-scheduled-payments",
            SubmissionKind::InternationalStandingOrder => "international-standing-orders",
            SubmissionKind::FilePayment => "file-payments",
            SubmissionKind::DomesticVrpPayment => "domestic-vrps",
        }
    }

    // bech32 human readable part for generated ids
    fn id_prefix(&self) -> &'static str {
        match self {
            SubmissionKind::DomesticVrpPayment => "vrp",
            _ => "pmt",
        }
    }

    pub fn new_submission_id(&self) -> Result<String, EngineError> {
        utils::new_uuid_to_bech32(self.id_prefix())
            .map_err(|e| EngineError::Identifier(e.to_string()))
    }
}

/// A write request as handed over by a request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub kind: SubmissionKind,
    pub idempotency_key: String,
    pub payload: Vec<u8>,
}

impl SubmissionRequest {
    pub fn new(kind: SubmissionKind, idempotency_key: &str, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            idempotency_key: idempotency_key.to_string(),
            payload: payload.into(),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: SubmissionKind,
    #[n(2)]
    pub owner_scope: String, // api client that created it
    #[n(3)]
    pub consent_id: String,
    #[n(4)]
    pub idempotency_key: String,
    #[n(5)]
    pub expires_at: Option<TimeStamp<Utc>>, // only set for scoped keys
    #[n(6)]
    pub status: SubmissionStatus,
    #[n(7)]
    pub status_reason: Option<String>,
    #[n(8)]
    pub origin_version: ApiVersion,
    #[cbor(n(9), with = "minicbor::bytes")]
    pub payload: Vec<u8>,
    #[n(10)]
    pub payload_digest: String,
    #[n(11)]
    pub created_at: TimeStamp<Utc>,
    #[n(12)]
    pub updated_at: TimeStamp<Utc>,
}

impl Submission {
    /// A fresh submission in the transient `Created` state.
    pub fn new(
        id: String,
        owner_scope: &str,
        consent_id: &str,
        request: &SubmissionRequest,
        origin_version: ApiVersion,
        now: TimeStamp<Utc>,
    ) -> Self {
        Self {
            id,
            kind: request.kind,
            owner_scope: owner_scope.to_string(),
            consent_id: consent_id.to_string(),
            idempotency_key: request.idempotency_key.clone(),
            expires_at: None,
            status: SubmissionStatus::Created,
            status_reason: None,
            origin_version,
            payload: request.payload.clone(),
            payload_digest: utils::payload_digest(&request.payload),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_expiry(mut self, expires_at: TimeStamp<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether `request` is a faithful retry of the request that created this submission.
    pub fn is_replay_of(&self, request: &SubmissionRequest) -> bool {
        self.kind == request.kind
            && self.idempotency_key == request.idempotency_key
            && self.payload_digest == utils::payload_digest(&request.payload)
    }

    /// Scoped keys stop deduplicating once their expiry has passed.
    pub fn key_is_live(&self, now: &TimeStamp<Utc>) -> bool {
        self.expires_at
            .as_ref()
            .is_none_or(|at| at.to_datetime_utc() > now.to_datetime_utc())
    }

    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        Ok(minicbor::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        Ok(minicbor::decode(bytes)?)
    }

    pub fn record_key(owner_scope: &str, id: &str) -> String {
        format!(
            "submission/{}/{}",
            utils::key_segment(owner_scope),
            utils::key_segment(id)
        )
    }

    /// Prefix shared by every submission record of one client.
    pub fn owner_prefix(owner_scope: &str) -> String {
        format!("submission/{}/", utils::key_segment(owner_scope))
    }

    pub fn key(&self) -> String {
        Self::record_key(&self.owner_scope, &self.id)
    }
}

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(Submission),
    /// A replay; the submission is reported in its latest persisted state.
    Returned(Submission),
}

impl SubmitOutcome {
    pub fn submission(&self) -> &Submission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::Returned(s) => s,
        }
    }
    pub fn into_submission(self) -> Submission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::Returned(s) => s,
        }
    }
    pub fn is_created(&self) -> bool {
        matches!(self, SubmitOutcome::Created(_))
    }
    /// 201 for a new submission, 200 for a replay.
    pub fn http_status(&self) -> u16 {
        if self.is_created() { 201 } else { 200 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Submission {
        let request = SubmissionRequest::new(SubmissionKind::DomesticPayment, "k1", "{}");
        Submission::new(
            "c-1".into(),
            "client-a",
            "c-1",
            &request,
            ApiVersion::new(3, 1, 10),
            TimeStamp::now(),
        )
    }

    #[test]
    fn record_survives_storage_encoding() {
        let original = sample().with_expiry(TimeStamp::now());
        let decoded = Submission::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn replay_needs_same_key_and_body() {
        let submission = sample();
        let same = SubmissionRequest::new(SubmissionKind::DomesticPayment, "k1", "{}");
        let other_body = SubmissionRequest::new(SubmissionKind::DomesticPayment, "k1", "{\"a\":1}");
        let other_key = SubmissionRequest::new(SubmissionKind::DomesticPayment, "k2", "{}");

        assert!(submission.is_replay_of(&same));
        assert!(!submission.is_replay_of(&other_body));
        assert!(!submission.is_replay_of(&other_key));
    }

    #[test]
    fn scoped_key_lives_until_expiry() {
        let now = TimeStamp::new_with(2024, 6, 1, 9, 0, 0).unwrap();
        let expires_at = now.plus(chrono::Duration::hours(24)).unwrap();
        let submission = sample().with_expiry(expires_at.clone());

        assert!(sample().key_is_live(&now));
        assert!(submission.key_is_live(&now));
        assert!(!submission.key_is_live(&expires_at));
        assert!(!submission.key_is_live(&expires_at.plus(chrono::Duration::seconds(1)).unwrap()));
    }

    #[test]
    fn generated_ids_carry_kind_prefix() {
        let id = SubmissionKind::DomesticVrpPayment.new_submission_id().unwrap();
        assert!(id.starts_with("vrp1"));
    }
}
