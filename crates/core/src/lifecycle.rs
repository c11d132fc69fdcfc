//! Issue lifecycle state machine.
//!
//! ```text
//! pending       --claim-------------> processing
//! processing    --push succeeded----> pending_merge
//! processing    --step failed-------> processing      (error recorded, caller may retry)
//! processing    --terminate---------> terminated
//! pending_merge --terminate---------> terminated
//! pending_merge --confirm merge-----> merged          (terminal)
//! terminated    --restart-----------> pending
//! ```
//!
//! The database layer applies each transition as a compare-and-set on the
//! statuses returned by [`IssueAction::allowed_from`]; this module is the
//! single source of truth for which transitions exist.

use crate::error::CoreError;
use crate::status::IssueStatus;
use crate::types::DbId;

/// `error_message` recorded when the heartbeat sweep terminates an issue.
pub const NODE_UNRESPONSIVE_MESSAGE: &str = "node unresponsive";

/// An action that moves an issue between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Claim,
    PushSucceeded,
    StepFailed,
    Terminate,
    ConfirmMerge,
    Restart,
}

impl IssueAction {
    /// Verb used in error messages ("Cannot claim an issue in status ...").
    pub fn verb(self) -> &'static str {
        match self {
            IssueAction::Claim => "claim",
            IssueAction::PushSucceeded => "commit and push",
            IssueAction::StepFailed => "record a failure on",
            IssueAction::Terminate => "terminate",
            IssueAction::ConfirmMerge => "confirm merge of",
            IssueAction::Restart => "restart",
        }
    }

    /// Statuses from which this action is legal.
    pub fn allowed_from(self) -> &'static [IssueStatus] {
        match self {
            IssueAction::Claim => &[IssueStatus::Pending],
            IssueAction::PushSucceeded | IssueAction::StepFailed => &[IssueStatus::Processing],
            IssueAction::Terminate => &[IssueStatus::Processing, IssueStatus::PendingMerge],
            IssueAction::ConfirmMerge => &[IssueStatus::PendingMerge],
            IssueAction::Restart => &[IssueStatus::Terminated],
        }
    }

    /// Status reached when the action succeeds.
    pub fn target(self) -> IssueStatus {
        match self {
            IssueAction::Claim | IssueAction::StepFailed => IssueStatus::Processing,
            IssueAction::PushSucceeded => IssueStatus::PendingMerge,
            IssueAction::Terminate => IssueStatus::Terminated,
            IssueAction::ConfirmMerge => IssueStatus::Merged,
            IssueAction::Restart => IssueStatus::Pending,
        }
    }
}

/// Compute the next status for `action` applied in status `from`.
pub fn transition(from: IssueStatus, action: IssueAction) -> Result<IssueStatus, CoreError> {
    if action.allowed_from().contains(&from) {
        Ok(action.target())
    } else {
        Err(CoreError::InvalidTransition {
            from,
            action: action.verb(),
        })
    }
}

/// Explain why a compare-and-set for `action` matched no row.
///
/// `current` is the status observed after the failed write. If the action is
/// illegal from that status the caller gets [`CoreError::InvalidTransition`];
/// if it is legal the row changed underneath us (or the node did not match)
/// and the caller gets a [`CoreError::Conflict`].
pub fn explain_failed_transition(
    current: IssueStatus,
    action: IssueAction,
    issue_id: DbId,
) -> CoreError {
    match transition(current, action) {
        Err(_) if action == IssueAction::Claim && current.holds_node() => {
            CoreError::AlreadyClaimed { issue_id }
        }
        Err(err) => err,
        Ok(_) => CoreError::Conflict(format!(
            "Issue {issue_id} changed concurrently or is assigned to a different node"
        )),
    }
}

/// Whether an issue in `status` may still be edited (title, priority, deps...).
pub fn ensure_editable(status: IssueStatus) -> Result<(), CoreError> {
    if status.is_terminal() {
        return Err(CoreError::Conflict(
            "Merged issues can no longer be modified".to_string(),
        ));
    }
    Ok(())
}

/// Whether an issue in `status` may be deleted.
pub fn ensure_deletable(status: IssueStatus) -> Result<(), CoreError> {
    if status.holds_node() {
        return Err(CoreError::Conflict(format!(
            "Issue is {status}; terminate it before deleting"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [IssueAction; 6] = [
        IssueAction::Claim,
        IssueAction::PushSucceeded,
        IssueAction::StepFailed,
        IssueAction::Terminate,
        IssueAction::ConfirmMerge,
        IssueAction::Restart,
    ];

    #[test]
    fn happy_path_reaches_merged() {
        let mut status = IssueStatus::Pending;
        for action in [
            IssueAction::Claim,
            IssueAction::StepFailed,
            IssueAction::PushSucceeded,
            IssueAction::ConfirmMerge,
        ] {
            status = transition(status, action).unwrap();
        }
        assert_eq!(status, IssueStatus::Merged);
    }

    #[test]
    fn merged_is_terminal() {
        for action in ACTIONS {
            assert!(transition(IssueStatus::Merged, action).is_err());
        }
    }

    #[test]
    fn terminated_only_restarts() {
        for action in ACTIONS {
            let result = transition(IssueStatus::Terminated, action);
            if action == IssueAction::Restart {
                assert_eq!(result.unwrap(), IssueStatus::Pending);
            } else {
                assert!(result.is_err(), "{action:?} should be rejected");
            }
        }
    }

    #[test]
    fn terminate_allowed_from_processing_and_pending_merge() {
        assert!(transition(IssueStatus::Processing, IssueAction::Terminate).is_ok());
        assert!(transition(IssueStatus::PendingMerge, IssueAction::Terminate).is_ok());
        assert!(transition(IssueStatus::Pending, IssueAction::Terminate).is_err());
    }

    #[test]
    fn push_on_pending_is_a_state_error() {
        let err = transition(IssueStatus::Pending, IssueAction::PushSucceeded).unwrap_err();
        match err {
            CoreError::InvalidTransition { from, action } => {
                assert_eq!(from, IssueStatus::Pending);
                assert_eq!(action, "commit and push");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn every_target_that_holds_a_node_comes_from_claim_or_push() {
        for action in ACTIONS {
            if action.target().holds_node() {
                assert!(matches!(
                    action,
                    IssueAction::Claim | IssueAction::StepFailed | IssueAction::PushSucceeded
                ));
            }
        }
    }

    #[test]
    fn failed_claim_is_reported_as_already_claimed() {
        let err = explain_failed_transition(IssueStatus::Processing, IssueAction::Claim, 7);
        assert!(matches!(err, CoreError::AlreadyClaimed { issue_id: 7 }));
    }

    #[test]
    fn claiming_a_terminated_issue_is_a_state_error() {
        let err = explain_failed_transition(IssueStatus::Terminated, IssueAction::Claim, 7);
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn failed_legal_transition_is_a_conflict() {
        let err = explain_failed_transition(IssueStatus::Processing, IssueAction::PushSucceeded, 3);
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn failed_illegal_transition_keeps_state_error() {
        let err = explain_failed_transition(IssueStatus::Merged, IssueAction::Terminate, 3);
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn merged_issue_not_editable() {
        assert!(ensure_editable(IssueStatus::Merged).is_err());
        assert!(ensure_editable(IssueStatus::Terminated).is_ok());
    }

    #[test]
    fn active_issue_not_deletable() {
        assert!(ensure_deletable(IssueStatus::Processing).is_err());
        assert!(ensure_deletable(IssueStatus::PendingMerge).is_err());
        assert!(ensure_deletable(IssueStatus::Pending).is_ok());
    }
}
