//! Purchase-order use-case service.
//!
//! # Responsibility
//! - Create purchase orders: resolve line prices, compute totals, assign the
//!   next PO number, start the approval trail at `Pending`.
//! - Edit lines of pending POs, read, list and soft-delete POs.
//!
//! # Invariants
//! - Only active actors act; the supplier must be active at create time.
//! - Lines are editable only while the PO is `Pending`, and only by its
//!   requestor or a superadmin.
//! - Deletion is allowed only for `Pending` or `Rejected` POs.
//! - Explicit line prices are appended to the supplier's price history so the
//!   next PO without a price picks them up. They are written by the PO
//!   repository inside the same transaction as the lines.

use crate::model::directory::{Role, SupplierId, User, UserId};
use crate::model::purchase_order::{
    Approval, CreatePoRequest, LineInput, NewPurchaseOrder, PoId, PoSummary, PricedLine,
    PurchaseOrder, UpdateLinesRequest,
};
use crate::model::status::PoStatus;
use crate::model::validation::{require_text, ValidationError};
use crate::money::{Money, Rate};
use crate::pricing::{compute_totals, price_lines};
use crate::repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
use crate::repo::directory_repo::{
    SqliteSupplierRepository, SqliteUserRepository, SupplierRepository, UserRepository,
};
use crate::repo::po_repo::{PoListQuery, PurchaseOrderRepository, SqlitePurchaseOrderRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::RepoResult;
use crate::service::dashboard_service::DashboardCache;
use crate::service::settings_service::load_settings;
use crate::service::{load_active_actor, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

/// Purchase-order facade over the repositories it reads and writes.
pub struct PurchaseOrderService<U, S, C, P, T>
where
    U: UserRepository,
    S: SupplierRepository,
    C: CatalogRepository,
    P: PurchaseOrderRepository,
    T: SettingsRepository,
{
    users: U,
    suppliers: S,
    catalog: C,
    orders: P,
    settings: T,
    dashboard: Option<DashboardCache>,
}

impl<U, S, C, P, T> PurchaseOrderService<U, S, C, P, T>
where
    U: UserRepository,
    S: SupplierRepository,
    C: CatalogRepository,
    P: PurchaseOrderRepository,
    T: SettingsRepository,
{
    pub fn new(users: U, suppliers: S, catalog: C, orders: P, settings: T) -> Self {
        Self {
            users,
            suppliers,
            catalog,
            orders,
            settings,
            dashboard: None,
        }
    }

    /// Invalidates `cache` after every write that changes status counts.
    pub fn with_dashboard_cache(mut self, cache: DashboardCache) -> Self {
        self.dashboard = Some(cache);
        self
    }

    /// Creates a purchase order at `Pending`.
    pub fn create(
        &self,
        actor_id: UserId,
        request: &CreatePoRequest,
    ) -> ServiceResult<PurchaseOrder> {
        let actor = load_active_actor(&self.users, actor_id)?;
        let requestor = match request.requestor_id {
            Some(requestor_id) if requestor_id != actor.id => {
                // Filing on behalf of someone else is an administrative act.
                if !actor.role.is_superadmin() {
                    return Err(forbidden(&actor, "create a purchase order for another user"));
                }
                load_active_actor(&self.users, requestor_id)?
            }
            _ => actor,
        };

        self.ensure_active_supplier(request.supplier_id)?;
        let purpose = require_text("purpose", &request.purpose)?;
        if request.lines.is_empty() {
            return Err(ValidationError::EmptyLines.into());
        }
        let department_id = match request.department_id {
            Some(department_id) => {
                self.users
                    .get_department(department_id)?
                    .ok_or_else(|| not_found("department", department_id))?;
                Some(department_id)
            }
            None => requestor.department_id,
        };

        let app_settings = load_settings(&self.settings)?;
        let vat_rate = request.vat_rate.unwrap_or(app_settings.vat_rate);
        let lines = self.price(request.supplier_id, &request.lines)?;
        let totals = compute_totals(&lines, vat_rate, request.shipping, request.discount)?;

        let new_po = NewPurchaseOrder {
            id: Uuid::new_v4(),
            requestor_id: requestor.id,
            supplier_id: request.supplier_id,
            department_id,
            purpose,
            vat_rate,
            totals,
            lines,
        };
        let po = self.orders.insert_purchase_order(
            &new_po,
            app_settings.po_number_start,
            actor_id,
        )?;
        self.invalidate_dashboard();
        info!(
            "event=po_create module=service status=ok po_number={} lines={} total={}",
            po.po_number,
            po.lines.len(),
            po.totals.total
        );
        Ok(po)
    }

    /// Replaces all lines and charges of a pending purchase order.
    pub fn update_lines(
        &self,
        actor_id: UserId,
        po_id: PoId,
        request: &UpdateLinesRequest,
    ) -> ServiceResult<PurchaseOrder> {
        let actor = load_active_actor(&self.users, actor_id)?;
        let po = self.require_po(po_id)?;
        ensure_owner_or_superadmin(&actor, &po, "edit purchase order lines")?;
        if po.status != PoStatus::Pending {
            return Err(ServiceError::StatusLocked {
                po_id,
                status: po.status,
                operation: "edit lines of",
            });
        }
        if request.lines.is_empty() {
            return Err(ValidationError::EmptyLines.into());
        }

        let vat_rate: Rate = request.vat_rate.unwrap_or(po.vat_rate);
        let lines = self.price(po.supplier_id, &request.lines)?;
        let totals = compute_totals(&lines, vat_rate, request.shipping, request.discount)?;

        let updated =
            self.orders
                .replace_lines(po_id, PoStatus::Pending, vat_rate, &totals, &lines)?;
        info!(
            "event=po_update_lines module=service status=ok po_number={} lines={} total={}",
            updated.po_number,
            updated.lines.len(),
            updated.totals.total
        );
        Ok(updated)
    }

    pub fn get(&self, po_id: PoId) -> ServiceResult<PurchaseOrder> {
        self.require_po(po_id)
    }

    pub fn get_by_number(&self, po_number: i64) -> ServiceResult<PurchaseOrder> {
        self.orders
            .get_by_number(po_number)?
            .ok_or_else(|| not_found("purchase order", po_number))
    }

    pub fn list(&self, query: &PoListQuery) -> ServiceResult<Vec<PoSummary>> {
        Ok(self.orders.list_purchase_orders(query)?)
    }

    /// Approval trail, oldest first.
    pub fn history(&self, po_id: PoId) -> ServiceResult<Vec<Approval>> {
        self.require_po(po_id)?;
        Ok(self.orders.approval_history(po_id)?)
    }

    /// Number the next created PO would receive.
    pub fn peek_next_number(&self) -> ServiceResult<i64> {
        let app_settings = load_settings(&self.settings)?;
        Ok(self.orders.next_po_number(app_settings.po_number_start)?)
    }

    /// Soft-deletes a pending or rejected purchase order.
    pub fn delete(&self, actor_id: UserId, po_id: PoId) -> ServiceResult<()> {
        let actor = load_active_actor(&self.users, actor_id)?;
        let po = self.require_po(po_id)?;
        ensure_owner_or_superadmin(&actor, &po, "delete purchase orders")?;
        if !matches!(po.status, PoStatus::Pending | PoStatus::Rejected) {
            return Err(ServiceError::StatusLocked {
                po_id,
                status: po.status,
                operation: "delete",
            });
        }
        self.orders.soft_delete(po_id)?;
        self.invalidate_dashboard();
        info!(
            "event=po_delete module=service status=ok po_number={} actor={}",
            po.po_number, actor.id
        );
        Ok(())
    }

    fn require_po(&self, po_id: PoId) -> ServiceResult<PurchaseOrder> {
        self.orders
            .get_purchase_order(po_id)?
            .ok_or_else(|| not_found("purchase order", po_id))
    }

    fn ensure_active_supplier(&self, supplier_id: SupplierId) -> ServiceResult<()> {
        let supplier = self
            .suppliers
            .get_supplier(supplier_id)?
            .ok_or_else(|| not_found("supplier", supplier_id))?;
        if !supplier.is_active {
            return Err(ServiceError::InactiveSupplier(supplier_id));
        }
        Ok(())
    }

    /// Checks every item exists and resolves unit prices against `supplier_id`.
    fn price(&self, supplier_id: SupplierId, lines: &[LineInput]) -> ServiceResult<Vec<PricedLine>> {
        for line in lines {
            self.catalog
                .get_item(line.item_id)?
                .ok_or_else(|| not_found("item", line.item_id))?;
        }
        price_lines(lines, |line| -> ServiceResult<Option<Money>> {
            Ok(self.catalog.latest_price(line.item_id, supplier_id)?)
        })
    }

    fn invalidate_dashboard(&self) {
        if let Some(cache) = &self.dashboard {
            cache.invalidate();
        }
    }
}

impl<'conn>
    PurchaseOrderService<
        SqliteUserRepository<'conn>,
        SqliteSupplierRepository<'conn>,
        SqliteCatalogRepository<'conn>,
        SqlitePurchaseOrderRepository<'conn>,
        SqliteSettingsRepository<'conn>,
    >
{
    /// Wires the service to SQLite repositories sharing one connection.
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqliteSupplierRepository::try_new(conn)?,
            SqliteCatalogRepository::try_new(conn)?,
            SqlitePurchaseOrderRepository::try_new(conn)?,
            SqliteSettingsRepository::try_new(conn)?,
        ))
    }
}

fn ensure_owner_or_superadmin(
    actor: &User,
    po: &PurchaseOrder,
    operation: &'static str,
) -> ServiceResult<()> {
    if actor.id == po.requestor_id || actor.role == Role::Superadmin {
        Ok(())
    } else {
        Err(forbidden(actor, operation))
    }
}

fn forbidden(actor: &User, operation: &'static str) -> ServiceError {
    ServiceError::Forbidden {
        actor: actor.id,
        role: actor.role,
        operation,
    }
}

fn not_found(entity: &'static str, key: impl ToString) -> ServiceError {
    ServiceError::NotFound {
        entity,
        key: key.to_string(),
    }
}
