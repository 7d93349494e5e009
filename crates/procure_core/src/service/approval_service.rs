//! Workflow use-case service.
//!
//! # Responsibility
//! - Apply verify/approve/receive/reject actions to purchase orders.
//! - Serve and relabel the status list.
//!
//! # Invariants
//! - The transition is planned against the status read before the write and
//!   re-checked inside the write transaction.
//! - A department head only acts on POs of their own department when the PO
//!   carries one.

use crate::model::directory::{Role, UserId};
use crate::model::purchase_order::{PoId, PurchaseOrder};
use crate::model::status::{plan_transition, PoStatus, StatusDefinition, WorkflowAction};
use crate::repo::directory_repo::{SqliteUserRepository, UserRepository};
use crate::repo::po_repo::{PurchaseOrderRepository, SqlitePurchaseOrderRepository};
use crate::repo::RepoResult;
use crate::service::dashboard_service::DashboardCache;
use crate::service::{load_active_actor, require_superadmin, ServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::Connection;

/// Workflow facade over user and purchase-order repositories.
pub struct ApprovalService<U: UserRepository, P: PurchaseOrderRepository> {
    users: U,
    orders: P,
    dashboard: Option<DashboardCache>,
}

impl<U: UserRepository, P: PurchaseOrderRepository> ApprovalService<U, P> {
    pub fn new(users: U, orders: P) -> Self {
        Self {
            users,
            orders,
            dashboard: None,
        }
    }

    pub fn with_dashboard_cache(mut self, cache: DashboardCache) -> Self {
        self.dashboard = Some(cache);
        self
    }

    /// Applies `action` to the PO and returns it at its new status.
    pub fn apply(
        &self,
        actor_id: UserId,
        po_id: PoId,
        action: WorkflowAction,
        remarks: Option<&str>,
    ) -> ServiceResult<PurchaseOrder> {
        let actor = load_active_actor(&self.users, actor_id)?;
        let po = self
            .orders
            .get_purchase_order(po_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "purchase order",
                key: po_id.to_string(),
            })?;

        let to = match plan_transition(actor.role, po.status, action, remarks) {
            Ok(to) => to,
            Err(err) => {
                warn!(
                    "event=po_transition module=service status=rejected po_number={} action={} role={}",
                    po.po_number, action, actor.role
                );
                return Err(err.into());
            }
        };
        if actor.role == Role::DepartmentHead {
            if let Some(department_id) = po.department_id {
                if actor.department_id != Some(department_id) {
                    return Err(ServiceError::DepartmentMismatch {
                        actor: actor.id,
                        po_id,
                    });
                }
            }
        }

        self.orders
            .record_transition(po_id, po.status, to, actor.id, remarks)?;
        if let Some(cache) = &self.dashboard {
            cache.invalidate();
        }
        info!(
            "event=po_transition module=service status=ok po_number={} action={} from={} to={}",
            po.po_number, action, po.status, to
        );

        self.orders
            .get_purchase_order(po_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "purchase order",
                key: po_id.to_string(),
            })
    }

    pub fn list_statuses(&self) -> ServiceResult<Vec<StatusDefinition>> {
        Ok(self.orders.list_statuses()?)
    }

    /// Changes the display label of one status. Status identity never changes.
    pub fn relabel_status(
        &self,
        actor_id: UserId,
        status: PoStatus,
        label: &str,
    ) -> ServiceResult<StatusDefinition> {
        require_superadmin(&self.users, actor_id, "relabel statuses")?;
        let definition = self.orders.relabel_status(status, label)?;
        info!("event=status_relabel module=service status=ok code={status}");
        Ok(definition)
    }
}

impl<'conn> ApprovalService<SqliteUserRepository<'conn>, SqlitePurchaseOrderRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqlitePurchaseOrderRepository::try_new(conn)?,
        ))
    }
}
