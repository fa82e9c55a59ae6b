//! Replay detection strategies
//!
//! Each submission kind plugs in one [`DedupPolicy`]. Both policies make the
//! create-or-return decision with a single conditional write on one key, so
//! concurrent identical retries cannot both observe "nothing stored yet".

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::consent::ConsentAccessContext;
use crate::error::EngineError;
use crate::lifecycle;
use crate::port::{Deadline, RecordPort, Swap};
use crate::submission::{DedupMode, Submission, SubmissionRequest, SubmitOutcome};
use crate::types::TimeStamp;
use crate::utils;
use crate::version::ApiVersion;

/// Everything a policy needs to know about one inbound write.
#[derive(Debug, Clone)]
pub struct Draft<'a> {
    pub ctx: &'a ConsentAccessContext,
    pub request: &'a SubmissionRequest,
    pub version: ApiVersion,
    pub now: TimeStamp<Utc>,
}

impl Draft<'_> {
    fn conflict(&self, id: &str) -> EngineError {
        EngineError::Conflict {
            resource: self.request.kind.resource_name().to_string(),
            id: id.to_string(),
            idempotency_key: self.request.idempotency_key.clone(),
        }
    }

    fn fresh(&self, id: String) -> Result<Submission, EngineError> {
        let submission = Submission::new(
            id,
            self.ctx.api_client_id(),
            self.ctx.consent_id(),
            self.request,
            self.version,
            self.now.clone(),
        );
        lifecycle::enter_initial(submission)
    }

    fn consent_not_usable(&self) -> EngineError {
        warn!(
            consent_id = self.ctx.consent_id(),
            status = ?self.ctx.status(),
            "consent cannot back a new submission"
        );
        EngineError::ConsentNotUsable {
            consent_id: self.ctx.consent_id().to_string(),
            status: self.ctx.status(),
        }
    }
}

pub trait DedupPolicy: Send + Sync {
    fn submit(
        &self,
        port: &dyn RecordPort,
        draft: &Draft<'_>,
        deadline: &Deadline,
    ) -> Result<SubmitOutcome, EngineError>;
}

/// Pick the policy for a dedup mode.
pub fn policy_for(mode: DedupMode, window: chrono::Duration) -> Box<dyn DedupPolicy> {
    match mode {
        DedupMode::IdentityKeyed => Box::new(IdentityKeyed),
        DedupMode::ScopedWithExpiry => Box::new(ScopedWithExpiry::new(window)),
    }
}

/// The submission id is the consent id, so each consent yields one submission, ever.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKeyed;

impl IdentityKeyed {
    fn judge_replay(
        &self,
        existing: Submission,
        draft: &Draft<'_>,
    ) -> Result<SubmitOutcome, EngineError> {
        if !existing.is_replay_of(draft.request) {
            warn!(
                id = %existing.id,
                idempotency_key = %draft.request.idempotency_key,
                "submission exists for a different request"
            );
            return Err(draft.conflict(&existing.id));
        }
        // TODO: confirm with product whether a settled submission may be replayed
        if existing.status.is_terminal() || !draft.ctx.permits_replay() {
            warn!(
                id = %existing.id,
                status = ?existing.status,
                consent_status = ?draft.ctx.status(),
                "refusing replay of settled submission"
            );
            return Err(draft.conflict(&existing.id));
        }

        info!(id = %existing.id, "returning existing submission");
        Ok(SubmitOutcome::Returned(existing))
    }
}

impl DedupPolicy for IdentityKeyed {
    fn submit(
        &self,
        port: &dyn RecordPort,
        draft: &Draft<'_>,
        deadline: &Deadline,
    ) -> Result<SubmitOutcome, EngineError> {
        let id = draft.ctx.consent_id();
        let key = Submission::record_key(draft.ctx.api_client_id(), id);

        if !draft.ctx.permits_new_submission() {
            // read only: a consumed consent may still replay what it created
            return match port.get(&key, deadline)? {
                Some(bytes) => self.judge_replay(Submission::decode(&bytes)?, draft),
                None => Err(draft.consent_not_usable()),
            };
        }

        let submission = draft.fresh(id.to_string())?;
        match port.insert_if_absent(&key, submission.encode()?, deadline)? {
            Swap::Applied => {
                info!(id, kind = ?submission.kind, status = ?submission.status, "submission created");
                Ok(SubmitOutcome::Created(submission))
            }
            Swap::Rejected {
                current: Some(bytes),
            } => self.judge_replay(Submission::decode(&bytes)?, draft),
            Swap::Rejected { current: None } => Err(EngineError::StateConflict { id: id.to_string() }),
        }
    }
}

/// Fresh id per submission; the idempotency key is remembered per client for a window.
#[derive(Debug, Clone, Copy)]
pub struct ScopedWithExpiry {
    window: chrono::Duration,
}

impl ScopedWithExpiry {
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }

    pub fn claim_key(owner_scope: &str, request: &SubmissionRequest) -> String {
        format!(
            "idempotency/{}/{}/{}",
            utils::key_segment(owner_scope),
            request.kind.resource_name(),
            utils::key_segment(&request.idempotency_key)
        )
    }

    // The claim holds a copy of the submission as created; the record itself
    // carries any later transitions.
    fn latest(
        &self,
        port: &dyn RecordPort,
        claimed: Submission,
        deadline: &Deadline,
    ) -> Result<Submission, EngineError> {
        match port.get(&claimed.key(), deadline)? {
            Some(bytes) => Submission::decode(&bytes),
            None => Ok(claimed),
        }
    }

    fn judge_replay(
        &self,
        port: &dyn RecordPort,
        claimed: Submission,
        draft: &Draft<'_>,
        deadline: &Deadline,
    ) -> Result<SubmitOutcome, EngineError> {
        if !claimed.is_replay_of(draft.request) || !draft.ctx.permits_replay() {
            warn!(
                id = %claimed.id,
                idempotency_key = %draft.request.idempotency_key,
                "idempotency key reused for a different request"
            );
            return Err(draft.conflict(&claimed.id));
        }
        let existing = self.latest(port, claimed, deadline)?;
        info!(id = %existing.id, "returning existing submission");
        Ok(SubmitOutcome::Returned(existing))
    }

    fn release(&self, port: &dyn RecordPort, claim_key: &str, ours: &[u8], previous: Option<Vec<u8>>) {
        if let Err(err) = port.compare_and_swap(claim_key, Some(ours), previous, &Deadline::none()) {
            warn!(claim_key, %err, "failed to release idempotency claim");
        }
    }
}

impl DedupPolicy for ScopedWithExpiry {
    fn submit(
        &self,
        port: &dyn RecordPort,
        draft: &Draft<'_>,
        deadline: &Deadline,
    ) -> Result<SubmitOutcome, EngineError> {
        let claim_key = Self::claim_key(draft.ctx.api_client_id(), draft.request);

        let previous = port.get(&claim_key, deadline)?;
        if let Some(bytes) = &previous {
            let claimed = Submission::decode(bytes)?;
            if claimed.key_is_live(&draft.now) {
                return self.judge_replay(port, claimed, draft, deadline);
            }
            debug!(claim_key, "idempotency key expired, treating as new");
        }
        if !draft.ctx.permits_new_submission() {
            return Err(draft.consent_not_usable());
        }

        let expires_at = draft.now.plus(self.window).ok_or_else(|| {
            warn!(window = %self.window, "idempotency window overflows the clock");
            EngineError::ExpiryOverflow(self.window.to_string())
        })?;
        let submission = draft
            .fresh(draft.request.kind.new_submission_id()?)?
            .with_expiry(expires_at);
        let encoded = submission.encode()?;

        match port.compare_and_swap(&claim_key, previous.as_deref(), Some(encoded.clone()), deadline)? {
            Swap::Applied => {}
            Swap::Rejected {
                current: Some(bytes),
            } => {
                let claimed = Submission::decode(&bytes)?;
                if claimed.key_is_live(&draft.now) {
                    return self.judge_replay(port, claimed, draft, deadline);
                }
                return Err(EngineError::StateConflict { id: claimed.id });
            }
            Swap::Rejected { current: None } => {
                return Err(EngineError::StateConflict { id: submission.id });
            }
        }

        match port.insert_if_absent(&submission.key(), encoded.clone(), deadline) {
            Ok(Swap::Applied) => {
                info!(
                    id = %submission.id,
                    kind = ?submission.kind,
                    status = ?submission.status,
                    "submission created"
                );
                Ok(SubmitOutcome::Created(submission))
            }
            Ok(Swap::Rejected { .. }) => {
                self.release(port, &claim_key, &encoded, previous);
                Err(EngineError::StateConflict { id: submission.id })
            }
            Err(err) => {
                self.release(port, &claim_key, &encoded, previous);
                Err(err)
            }
        }
    }
}
