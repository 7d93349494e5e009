//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce who may do what: active actors, role checks, superadmin-only
//!   administration.
//! - Keep the CLI decoupled from storage details.
//!
//! # Invariants
//! - Every mutating use-case takes the acting user's id and re-reads that
//!   user from storage before doing anything.
//! - Deactivated users cannot act.

use crate::model::directory::{Role, SupplierId, User, UserId};
use crate::model::purchase_order::PoId;
use crate::model::status::{PoStatus, WorkflowError};
use crate::model::validation::ValidationError;
use crate::pricing::PricingError;
use crate::repo::directory_repo::UserRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod approval_service;
pub mod dashboard_service;
pub mod directory_service;
pub mod maintenance_service;
pub mod po_service;
pub mod settings_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error shared by all use-case services.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed field validation.
    Validation(ValidationError),
    /// Line prices or charges are inconsistent.
    Pricing(PricingError),
    /// Workflow transition was refused.
    Workflow(WorkflowError),
    /// Target record does not exist.
    NotFound { entity: &'static str, key: String },
    /// Acting user id is unknown.
    UnknownActor(UserId),
    /// Acting user is deactivated.
    InactiveActor(UserId),
    /// Actor's role does not allow the operation.
    Forbidden {
        actor: UserId,
        role: Role,
        operation: &'static str,
    },
    /// Department head acting on a PO that belongs to another department.
    DepartmentMismatch { actor: UserId, po_id: PoId },
    /// Supplier exists but is deactivated.
    InactiveSupplier(SupplierId),
    /// Operation is not allowed at the PO's current status.
    StatusLocked {
        po_id: PoId,
        status: PoStatus,
        operation: &'static str,
    },
    /// Setting key is unknown or its value is out of range.
    InvalidSetting { key: String, reason: String },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Pricing(err) => write!(f, "{err}"),
            Self::Workflow(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::UnknownActor(id) => write!(f, "acting user not found: {id}"),
            Self::InactiveActor(id) => write!(f, "acting user is deactivated: {id}"),
            Self::Forbidden {
                actor,
                role,
                operation,
            } => write!(f, "user {actor} with role `{role}` may not {operation}"),
            Self::DepartmentMismatch { actor, po_id } => write!(
                f,
                "user {actor} is not head of the department of purchase order {po_id}"
            ),
            Self::InactiveSupplier(id) => write!(f, "supplier is deactivated: {id}"),
            Self::StatusLocked {
                po_id,
                status,
                operation,
            } => write!(
                f,
                "cannot {operation} purchase order {po_id} while it is {status}"
            ),
            Self::InvalidSetting { key, reason } => write!(f, "invalid setting `{key}`: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Pricing(err) => Some(err),
            Self::Workflow(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<PricingError> for ServiceError {
    fn from(value: PricingError) -> Self {
        match value {
            PricingError::Validation(err) => Self::Validation(err),
            other => Self::Pricing(other),
        }
    }
}

impl From<WorkflowError> for ServiceError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Loads the acting user and rejects unknown or deactivated accounts.
pub(crate) fn load_active_actor<U: UserRepository>(
    users: &U,
    actor_id: UserId,
) -> ServiceResult<User> {
    let actor = users
        .get_user(actor_id)?
        .ok_or(ServiceError::UnknownActor(actor_id))?;
    if !actor.is_active {
        return Err(ServiceError::InactiveActor(actor_id));
    }
    Ok(actor)
}

/// Loads the acting user and requires the superadmin role.
pub(crate) fn require_superadmin<U: UserRepository>(
    users: &U,
    actor_id: UserId,
    operation: &'static str,
) -> ServiceResult<User> {
    let actor = load_active_actor(users, actor_id)?;
    if !actor.role.is_superadmin() {
        return Err(ServiceError::Forbidden {
            actor: actor.id,
            role: actor.role,
            operation,
        });
    }
    Ok(actor)
}
