//! Submission status state machine
//!
//! ```text
//! Created ─┬─> PendingAcceptance ─┬─> Accepted
//!          │                      ├─> Rejected
//!          │                      └─> Cancelled
//!          └─> PendingInitiation ─┬─> Completed
//!                                 ├─> Rejected
//!                                 └─> Cancelled
//! ```
//!
//! `Created` only exists between construction and the first write; persisted
//! records are always in a pending or terminal state.

use chrono::Utc;

use crate::error::EngineError;
use crate::submission::Submission;
use crate::types::TimeStamp;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    #[n(0)]
    Created,
    #[n(1)]
    PendingAcceptance,
    #[n(2)]
    PendingInitiation,
    #[n(3)]
    Accepted,
    #[n(4)]
    Completed,
    #[n(5)]
    Rejected,
    #[n(6)]
    Cancelled,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 7] = [
        SubmissionStatus::Created,
        SubmissionStatus::PendingAcceptance,
        SubmissionStatus::PendingInitiation,
        SubmissionStatus::Accepted,
        SubmissionStatus::Completed,
        SubmissionStatus::Rejected,
        SubmissionStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Accepted
                | SubmissionStatus::Completed
                | SubmissionStatus::Rejected
                | SubmissionStatus::Cancelled
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::PendingAcceptance | SubmissionStatus::PendingInitiation
        )
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;

        match (self, next) {
            (_, Created) => false,
            (Created, PendingAcceptance | PendingInitiation | Rejected) => true,
            (PendingAcceptance, Accepted | Rejected | Cancelled) => true,
            (PendingInitiation, Completed | Rejected | Cancelled) => true,
            _ => false,
        }
    }

    /// Wire name used in API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Created => "Created",
            SubmissionStatus::PendingAcceptance => "Pending",
            SubmissionStatus::PendingInitiation => "InitiationPending",
            SubmissionStatus::Accepted => "AcceptedSettlementCompleted",
            SubmissionStatus::Completed => "InitiationCompleted",
            SubmissionStatus::Rejected => "Rejected",
            SubmissionStatus::Cancelled => "Cancelled",
        }
    }
}

/// Move a freshly constructed submission into its kind's initial steady state.
pub fn enter_initial(mut submission: Submission) -> Result<Submission, EngineError> {
    let next = submission.kind.initial_status();
    if !submission.status.can_transition_to(next) {
        return Err(EngineError::InvalidTransition {
            from: submission.status,
            to: next,
        });
    }
    submission.status = next;
    Ok(submission)
}

/// The submission as it would look after moving to `next`. Only `Rejected` keeps a reason.
pub fn apply(
    current: &Submission,
    next: SubmissionStatus,
    reason: Option<String>,
    now: TimeStamp<Utc>,
) -> Result<Submission, EngineError> {
    if !current.status.can_transition_to(next) {
        return Err(EngineError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    let mut updated = current.clone();
    updated.status = next;
    updated.status_reason = reason.filter(|_| next == SubmissionStatus::Rejected);
    updated.updated_at = now;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::SubmissionStatus::*;
    use super::*;
    use crate::submission::{SubmissionKind, SubmissionRequest};
    use crate::version::ApiVersion;

    fn created(kind: SubmissionKind) -> Submission {
        let request = SubmissionRequest::new(kind, "k1", "{}");
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
    fn initial_state_follows_kind() {
        let payment = enter_initial(created(SubmissionKind::DomesticPayment)).unwrap();
        assert_eq!(payment.status, PendingAcceptance);

        let order = enter_initial(created(SubmissionKind::DomesticStandingOrder)).unwrap();
        assert_eq!(order.status, PendingInitiation);

        assert!(enter_initial(payment).is_err());
    }

    #[test]
    fn apply_stamps_time_and_keeps_reason_only_for_rejection() {
        let pending = enter_initial(created(SubmissionKind::DomesticPayment)).unwrap();
        let later = pending.created_at.plus(chrono::Duration::seconds(5)).unwrap();

        let rejected = apply(&pending, Rejected, Some("insufficient funds".into()), later.clone())
            .unwrap();
        assert_eq!(rejected.status_reason.as_deref(), Some("insufficient funds"));
        assert_eq!(rejected.updated_at, later);
        assert_eq!(rejected.created_at, pending.created_at);

        let accepted = apply(&pending, Accepted, Some("ignored".into()), later).unwrap();
        assert_eq!(accepted.status_reason, None);
    }

    #[test]
    fn nothing_leaves_a_terminal_state() {
        for from in [Accepted, Completed, Rejected, Cancelled] {
            for to in super::SubmissionStatus::ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn pending_states_have_their_own_success_state() {
        assert!(PendingAcceptance.can_transition_to(Accepted));
        assert!(!PendingAcceptance.can_transition_to(Completed));
        assert!(PendingInitiation.can_transition_to(Completed));
        assert!(!PendingInitiation.can_transition_to(Accepted));
        assert!(!PendingAcceptance.can_transition_to(PendingInitiation));
    }
}
