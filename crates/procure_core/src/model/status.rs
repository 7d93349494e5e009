//! Purchase-order workflow statuses and transitions.
//!
//! # Responsibility
//! - Define the five workflow stages and their seeded storage ids.
//! - Decide which action moves a PO from one stage to the next and which
//!   roles may perform it.
//!
//! # Invariants
//! - Forward path is linear: Pending -> Verified -> Approved -> Received.
//! - Reject is allowed from any non-terminal stage and requires remarks.
//! - `Received` and `Rejected` accept no further actions.

use crate::model::directory::Role;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Workflow stage of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    Pending,
    Verified,
    Approved,
    Received,
    Rejected,
}

impl PoStatus {
    pub const ALL: [PoStatus; 5] = [
        PoStatus::Pending,
        PoStatus::Verified,
        PoStatus::Approved,
        PoStatus::Received,
        PoStatus::Rejected,
    ];

    /// Seeded primary key in the `statuses` table.
    pub fn id(self) -> i64 {
        match self {
            Self::Pending => 1,
            Self::Verified => 2,
            Self::Approved => 3,
            Self::Received => 4,
            Self::Rejected => 5,
        }
    }

    pub fn from_id(id: i64) -> Option<PoStatus> {
        Self::ALL.into_iter().find(|status| status.id() == id)
    }

    /// Stable code stored in `statuses.code`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Approved => "approved",
            Self::Received => "received",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<PoStatus> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.code() == normalized)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Received | Self::Rejected)
    }

    /// Forward action expected at this stage, if any.
    pub fn pending_action(self) -> Option<WorkflowAction> {
        match self {
            Self::Pending => Some(WorkflowAction::Verify),
            Self::Verified => Some(WorkflowAction::Approve),
            Self::Approved => Some(WorkflowAction::Receive),
            Self::Received | Self::Rejected => None,
        }
    }
}

impl Display for PoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Status row as stored, including its superadmin-editable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDefinition {
    pub status: PoStatus,
    pub label: String,
    pub sort_order: i64,
}

/// Action a user applies to move a PO through the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Verify,
    Approve,
    Receive,
    Reject,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Approve => "approve",
            Self::Receive => "receive",
            Self::Reject => "reject",
        }
    }

    /// Role (besides superadmin) that performs this forward action.
    fn forward_role(self) -> Option<Role> {
        match self {
            Self::Verify => Some(Role::Finance),
            Self::Approve => Some(Role::DepartmentHead),
            Self::Receive => Some(Role::Authorized),
            Self::Reject => None,
        }
    }
}

impl Display for WorkflowAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected workflow transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Action does not apply to the current stage.
    InvalidTransition {
        from: PoStatus,
        action: WorkflowAction,
    },
    /// Role may not perform the action at the current stage.
    RoleNotPermitted {
        role: Role,
        action: WorkflowAction,
        status: PoStatus,
    },
    /// Rejection needs a reason.
    RemarksRequired,
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, action } => {
                write!(f, "cannot {action} a purchase order that is {from}")
            }
            Self::RoleNotPermitted {
                role,
                action,
                status,
            } => write!(
                f,
                "role `{role}` may not {action} a purchase order that is {status}"
            ),
            Self::RemarksRequired => write!(f, "remarks are required when rejecting"),
        }
    }
}

impl Error for WorkflowError {}

/// Computes the stage reached by applying `action` at `from`.
///
/// Does not look at roles; see [`authorize`] for permission checks.
pub fn next_status(from: PoStatus, action: WorkflowAction) -> Result<PoStatus, WorkflowError> {
    let to = match (from, action) {
        (PoStatus::Pending, WorkflowAction::Verify) => PoStatus::Verified,
        (PoStatus::Verified, WorkflowAction::Approve) => PoStatus::Approved,
        (PoStatus::Approved, WorkflowAction::Receive) => PoStatus::Received,
        (status, WorkflowAction::Reject) if !status.is_terminal() => PoStatus::Rejected,
        _ => return Err(WorkflowError::InvalidTransition { from, action }),
    };
    Ok(to)
}

/// Checks that `role` may apply `action` to a PO currently at `status`.
///
/// Rejecting is granted to the role that owns the stage's forward action,
/// so finance rejects pending POs, department heads reject verified POs, and
/// so on.
pub fn authorize(role: Role, action: WorkflowAction, status: PoStatus) -> Result<(), WorkflowError> {
    if role.is_superadmin() {
        return Ok(());
    }

    let owning_action = match action {
        WorkflowAction::Reject => status.pending_action(),
        forward => Some(forward),
    };
    let permitted = owning_action
        .and_then(WorkflowAction::forward_role)
        .is_some_and(|expected| expected == role);

    if permitted {
        Ok(())
    } else {
        Err(WorkflowError::RoleNotPermitted {
            role,
            action,
            status,
        })
    }
}

/// Validates a full transition request and returns the target stage.
pub fn plan_transition(
    role: Role,
    from: PoStatus,
    action: WorkflowAction,
    remarks: Option<&str>,
) -> Result<PoStatus, WorkflowError> {
    let to = next_status(from, action)?;
    authorize(role, action, from)?;
    if action == WorkflowAction::Reject && remarks.map_or(true, |text| text.trim().is_empty()) {
        return Err(WorkflowError::RemarksRequired);
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::{authorize, next_status, plan_transition, PoStatus, WorkflowAction, WorkflowError};
    use crate::model::directory::Role;

    #[test]
    fn forward_path_is_linear() {
        assert_eq!(
            next_status(PoStatus::Pending, WorkflowAction::Verify),
            Ok(PoStatus::Verified)
        );
        assert_eq!(
            next_status(PoStatus::Verified, WorkflowAction::Approve),
            Ok(PoStatus::Approved)
        );
        assert_eq!(
            next_status(PoStatus::Approved, WorkflowAction::Receive),
            Ok(PoStatus::Received)
        );
        assert!(matches!(
            next_status(PoStatus::Pending, WorkflowAction::Approve),
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        for status in [PoStatus::Received, PoStatus::Rejected] {
            for action in [
                WorkflowAction::Verify,
                WorkflowAction::Approve,
                WorkflowAction::Receive,
                WorkflowAction::Reject,
            ] {
                assert!(next_status(status, action).is_err(), "{status} {action}");
            }
        }
    }

    #[test]
    fn reject_belongs_to_the_stage_owner() {
        assert!(authorize(Role::Finance, WorkflowAction::Reject, PoStatus::Pending).is_ok());
        assert!(authorize(Role::Finance, WorkflowAction::Reject, PoStatus::Verified).is_err());
        assert!(
            authorize(Role::DepartmentHead, WorkflowAction::Reject, PoStatus::Verified).is_ok()
        );
        assert!(authorize(Role::Authorized, WorkflowAction::Reject, PoStatus::Approved).is_ok());
        assert!(authorize(Role::Requestor, WorkflowAction::Reject, PoStatus::Pending).is_err());
    }

    #[test]
    fn superadmin_may_do_everything_but_still_follows_the_path() {
        assert!(authorize(Role::Superadmin, WorkflowAction::Receive, PoStatus::Pending).is_ok());
        assert!(matches!(
            plan_transition(Role::Superadmin, PoStatus::Pending, WorkflowAction::Receive, None),
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reject_requires_remarks() {
        assert_eq!(
            plan_transition(Role::Finance, PoStatus::Pending, WorkflowAction::Reject, Some("  ")),
            Err(WorkflowError::RemarksRequired)
        );
        assert_eq!(
            plan_transition(
                Role::Finance,
                PoStatus::Pending,
                WorkflowAction::Reject,
                Some("duplicate request")
            ),
            Ok(PoStatus::Rejected)
        );
    }

    #[test]
    fn status_ids_match_seed_rows() {
        for status in PoStatus::ALL {
            assert_eq!(PoStatus::from_id(status.id()), Some(status));
            assert_eq!(PoStatus::parse(status.code()), Some(status));
        }
    }
}
