//! Submission and versioned-resource stores over a [`RecordPort`]
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::consent::ConsentAccessContext;
use crate::error::EngineError;
use crate::gate::{AccessGate, Versioned};
use crate::lifecycle::{self, SubmissionStatus};
use crate::policy::{self, Draft};
use crate::port::{Deadline, RecordPort, Swap};
use crate::submission::{Submission, SubmissionKind, SubmissionRequest, SubmitOutcome};
use crate::types::TimeStamp;
use crate::utils;
use crate::version::{ApiVersion, VersionRegistry};

pub struct SubmissionStore {
    port: Arc<dyn RecordPort>,
    clock: Arc<dyn Clock>,
    registry: Arc<VersionRegistry>,
    idempotency_window: chrono::Duration,
}

impl SubmissionStore {
    pub fn new(
        port: Arc<dyn RecordPort>,
        clock: Arc<dyn Clock>,
        registry: Arc<VersionRegistry>,
        idempotency_window: chrono::Duration,
    ) -> Self {
        Self {
            port,
            clock,
            registry,
            idempotency_window,
        }
    }

    /// Create the submission, or hand back the one this request already created.
    pub fn submit(
        &self,
        ctx: &ConsentAccessContext,
        version: ApiVersion,
        request: &SubmissionRequest,
        deadline: &Deadline,
    ) -> Result<SubmitOutcome, EngineError> {
        let draft = Draft {
            ctx,
            request,
            version,
            now: self.clock.now(),
        };
        policy::policy_for(request.kind.dedup_mode(), self.idempotency_window).submit(
            self.port.as_ref(),
            &draft,
            deadline,
        )
    }

    /// Latest persisted state, without any version check.
    pub fn get(
        &self,
        owner_scope: &str,
        id: &str,
        deadline: &Deadline,
    ) -> Result<Submission, EngineError> {
        Ok(self.load(owner_scope, id, deadline)?.1)
    }

    /// Latest persisted state, as seen through the caller's release.
    pub fn read(
        &self,
        owner_scope: &str,
        id: &str,
        requested: ApiVersion,
        deadline: &Deadline,
    ) -> Result<Submission, EngineError> {
        let submission = self.get(owner_scope, id, deadline)?;
        AccessGate::new(&self.registry)
            .evaluate(requested, &submission)
            .into_result()?;
        Ok(submission)
    }

    /// Move a submission to `next`, guarded by a compare-and-swap on the record
    /// that was read. Losing a race yields `StateConflict` if `next` is still
    /// reachable, `InvalidTransition` otherwise.
    pub fn transition(
        &self,
        owner_scope: &str,
        id: &str,
        next: SubmissionStatus,
        reason: Option<String>,
        deadline: &Deadline,
    ) -> Result<Submission, EngineError> {
        let (bytes, current) = self.load(owner_scope, id, deadline)?;
        let updated = lifecycle::apply(&current, next, reason, self.clock.now()).inspect_err(
            |err| warn!(id, from = ?current.status, to = ?next, %err, "transition rejected"),
        )?;

        match self.port.compare_and_swap(
            &current.key(),
            Some(&bytes),
            Some(updated.encode()?),
            deadline,
        )? {
            Swap::Applied => {
                info!(id, from = ?current.status, to = ?next, "submission transitioned");
                Ok(updated)
            }
            Swap::Rejected {
                current: Some(latest),
            } => {
                let latest = Submission::decode(&latest)?;
                warn!(id, status = ?latest.status, to = ?next, "transition lost a race");
                if latest.status.can_transition_to(next) {
                    Err(EngineError::StateConflict { id: id.to_string() })
                } else {
                    Err(EngineError::InvalidTransition {
                        from: latest.status,
                        to: next,
                    })
                }
            }
            Swap::Rejected { current: None } => Err(EngineError::NotFound { id: id.to_string() }),
        }
    }

    /// Every submission of `kind` made by one client, oldest id first.
    pub fn list_for_owner(
        &self,
        owner_scope: &str,
        kind: SubmissionKind,
        deadline: &Deadline,
    ) -> Result<Vec<Submission>, EngineError> {
        let prefix = Submission::owner_prefix(owner_scope);
        let mut submissions = vec![];
        for (_, bytes) in self.port.scan_prefix(&prefix, deadline)? {
            let submission = Submission::decode(&bytes)?;
            if submission.kind == kind {
                submissions.push(submission);
            }
        }
        Ok(submissions)
    }

    fn load(
        &self,
        owner_scope: &str,
        id: &str,
        deadline: &Deadline,
    ) -> Result<(Vec<u8>, Submission), EngineError> {
        let bytes = self
            .port
            .get(&Submission::record_key(owner_scope, id), deadline)?
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
        let submission = Submission::decode(&bytes)?;
        Ok((bytes, submission))
    }
}

/// Storage envelope for resources exposed through several releases.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord<T> {
    #[n(0)]
    pub origin_version: ApiVersion,
    #[n(1)]
    pub body: T,
    #[n(2)]
    pub updated_at: TimeStamp<Utc>,
}

impl<T> Versioned for VersionedRecord<T> {
    fn origin_version(&self) -> ApiVersion {
        self.origin_version
    }
}

pub struct ResourceStore {
    port: Arc<dyn RecordPort>,
    clock: Arc<dyn Clock>,
    registry: Arc<VersionRegistry>,
}

impl ResourceStore {
    pub fn new(
        port: Arc<dyn RecordPort>,
        clock: Arc<dyn Clock>,
        registry: Arc<VersionRegistry>,
    ) -> Self {
        Self {
            port,
            clock,
            registry,
        }
    }

    fn key(collection: &str, id: &str) -> String {
        format!(
            "resource/{}/{}",
            utils::key_segment(collection),
            utils::key_segment(id)
        )
    }

    pub fn create<T>(
        &self,
        collection: &str,
        id: &str,
        version: ApiVersion,
        body: T,
        deadline: &Deadline,
    ) -> Result<VersionedRecord<T>, EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let record = VersionedRecord {
            origin_version: version,
            body,
            updated_at: self.clock.now(),
        };
        match self.port.insert_if_absent(
            &Self::key(collection, id),
            minicbor::to_vec(&record)?,
            deadline,
        )? {
            Swap::Applied => {
                info!(collection, id, %version, "resource stored");
                Ok(record)
            }
            Swap::Rejected { .. } => Err(EngineError::StateConflict { id: id.to_string() }),
        }
    }

    pub fn read<T>(
        &self,
        collection: &str,
        id: &str,
        requested: ApiVersion,
        deadline: &Deadline,
    ) -> Result<T, EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let (_, record) = self.load::<T>(collection, id, deadline)?;
        AccessGate::new(&self.registry)
            .evaluate(requested, &record)
            .into_result()?;
        Ok(record.body)
    }

    /// Apply `change` to the body and restamp the record with the caller's release.
    pub fn update<T>(
        &self,
        collection: &str,
        id: &str,
        requested: ApiVersion,
        change: impl FnOnce(T) -> T,
        deadline: &Deadline,
    ) -> Result<VersionedRecord<T>, EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let (bytes, record) = self.load::<T>(collection, id, deadline)?;
        let origin_version = AccessGate::new(&self.registry).admit_mutation(requested, &record)?;
        let updated = VersionedRecord {
            origin_version,
            body: change(record.body),
            updated_at: self.clock.now(),
        };

        match self.port.compare_and_swap(
            &Self::key(collection, id),
            Some(&bytes),
            Some(minicbor::to_vec(&updated)?),
            deadline,
        )? {
            Swap::Applied => Ok(updated),
            Swap::Rejected { .. } => Err(EngineError::StateConflict { id: id.to_string() }),
        }
    }

    pub fn delete<T>(
        &self,
        collection: &str,
        id: &str,
        requested: ApiVersion,
        deadline: &Deadline,
    ) -> Result<(), EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let (bytes, record) = self.load::<T>(collection, id, deadline)?;
        AccessGate::new(&self.registry)
            .evaluate(requested, &record)
            .into_result()?;

        match self
            .port
            .compare_and_swap(&Self::key(collection, id), Some(&bytes), None, deadline)?
        {
            Swap::Applied => {
                info!(collection, id, "resource deleted");
                Ok(())
            }
            Swap::Rejected { .. } => Err(EngineError::StateConflict { id: id.to_string() }),
        }
    }

    fn load<T>(
        &self,
        collection: &str,
        id: &str,
        deadline: &Deadline,
    ) -> Result<(Vec<u8>, VersionedRecord<T>), EngineError>
    where
        T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        let bytes = self
            .port
            .get(&Self::key(collection, id), deadline)?
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
        let record: VersionedRecord<T> = minicbor::decode(&bytes)?;
        Ok((bytes, record))
    }
}
