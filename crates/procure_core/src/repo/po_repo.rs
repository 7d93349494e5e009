//! Purchase-order repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist PO headers, lines and approval rows.
//! - Generate PO numbers and derive each PO's current status.
//! - Own status labels stored in `statuses`.
//!
//! # Invariants
//! - PO numbers are `MAX(po_number) + 1` (or the configured start), assigned
//!   inside the inserting IMMEDIATE transaction.
//! - A PO's current status is the `status_id` of its approval row with the
//!   highest `id`; every PO has at least one approval row.
//! - Writes that depend on the current status re-check it inside their
//!   transaction and fail with `StaleStatus` when it moved.
//! - Explicitly quoted line prices land in `item_prices` on the same
//!   transaction as the lines that carry them.

use crate::model::directory::{DepartmentId, SupplierId, UserId};
use crate::model::purchase_order::{
    format_po_number, Approval, NewPurchaseOrder, PoId, PoLine, PoSummary, PoTotals, PricedLine,
    PurchaseOrder,
};
use crate::model::status::{PoStatus, StatusDefinition};
use crate::model::validation::require_text;
use crate::money::{Money, Rate};
use crate::repo::catalog_repo::record_quoted_prices;
use crate::repo::{
    ensure_connection_ready, parse_optional_uuid, parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const PO_LIST_DEFAULT_LIMIT: u32 = 20;
const PO_LIST_LIMIT_MAX: u32 = 100;

/// Joins each PO to its latest approval row.
const LATEST_APPROVAL_JOIN: &str = "JOIN approvals a
    ON a.id = (
        SELECT MAX(a2.id)
        FROM approvals a2
        WHERE a2.po_id = po.id
    )";

const PO_SELECT_COLUMNS: &str = "po.id,
    po.po_number,
    po.requestor_id,
    po.supplier_id,
    po.department_id,
    po.purpose,
    po.vat_rate_bps,
    po.shipping_cents,
    po.discount_cents,
    po.subtotal_cents,
    po.vat_cents,
    po.total_cents,
    po.created_at,
    po.updated_at,
    a.status_id AS status_id";

/// Filter and pagination options for listing POs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoListQuery {
    pub status: Option<PoStatus>,
    pub requestor_id: Option<UserId>,
    pub supplier_id: Option<SupplierId>,
    pub department_id: Option<DepartmentId>,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Number of active POs currently at one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatusCount {
    pub status: PoStatus,
    pub count: i64,
}

/// Repository interface for purchase orders and their approval trail.
pub trait PurchaseOrderRepository {
    /// Returns the number the next inserted PO would receive.
    fn next_po_number(&self, start: i64) -> RepoResult<i64>;
    /// Inserts header, lines, quoted prices and the initial `Pending` approval
    /// row atomically.
    fn insert_purchase_order(
        &self,
        po: &NewPurchaseOrder,
        po_number_start: i64,
        actor_id: UserId,
    ) -> RepoResult<PurchaseOrder>;
    /// Replaces all lines and totals while the PO is still at `expected`.
    ///
    /// Quoted prices of `lines` are recorded only if the replacement commits.
    fn replace_lines(
        &self,
        po_id: PoId,
        expected: PoStatus,
        vat_rate: Rate,
        totals: &PoTotals,
        lines: &[PricedLine],
    ) -> RepoResult<PurchaseOrder>;
    fn get_purchase_order(&self, po_id: PoId) -> RepoResult<Option<PurchaseOrder>>;
    fn get_by_number(&self, po_number: i64) -> RepoResult<Option<PurchaseOrder>>;
    fn list_purchase_orders(&self, query: &PoListQuery) -> RepoResult<Vec<PoSummary>>;
    fn current_status(&self, po_id: PoId) -> RepoResult<Option<PoStatus>>;
    /// Appends an approval row moving the PO from `from` to `to`.
    fn record_transition(
        &self,
        po_id: PoId,
        from: PoStatus,
        to: PoStatus,
        actor_id: UserId,
        remarks: Option<&str>,
    ) -> RepoResult<Approval>;
    /// Approval rows oldest first.
    fn approval_history(&self, po_id: PoId) -> RepoResult<Vec<Approval>>;
    /// Counts of non-deleted POs per current status, one entry per status.
    fn status_counts(&self) -> RepoResult<Vec<StatusCount>>;
    fn soft_delete(&self, po_id: PoId) -> RepoResult<()>;
    fn list_statuses(&self) -> RepoResult<Vec<StatusDefinition>>;
    fn relabel_status(&self, status: PoStatus, label: &str) -> RepoResult<StatusDefinition>;
}

/// SQLite-backed purchase-order repository.
pub struct SqlitePurchaseOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePurchaseOrderRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "statuses",
                "purchase_orders",
                "po_items",
                "approvals",
                "item_prices",
            ],
        )?;
        Ok(Self { conn })
    }

    fn immediate_tx(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn load_required(&self, po_id: PoId) -> RepoResult<PurchaseOrder> {
        self.get_purchase_order(po_id)?
            .ok_or_else(|| RepoError::not_found("purchase order", po_id))
    }

    fn load_one(&self, filter_sql: &str, key: Value) -> RepoResult<Option<PurchaseOrder>> {
        let sql = format!(
            "SELECT {PO_SELECT_COLUMNS}
             FROM purchase_orders po
             {LATEST_APPROVAL_JOIN}
             WHERE po.is_deleted = 0 AND {filter_sql};"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([key])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut po = parse_po_row(row)?;
        po.lines = load_lines(self.conn, po.id)?;
        Ok(Some(po))
    }
}

impl PurchaseOrderRepository for SqlitePurchaseOrderRepository<'_> {
    fn next_po_number(&self, start: i64) -> RepoResult<i64> {
        next_po_number_in(self.conn, start)
    }

    fn insert_purchase_order(
        &self,
        po: &NewPurchaseOrder,
        po_number_start: i64,
        actor_id: UserId,
    ) -> RepoResult<PurchaseOrder> {
        let purpose = require_text("purpose", &po.purpose)?;
        let po_id_text = po.id.to_string();

        let tx = self.immediate_tx()?;
        let po_number = next_po_number_in(&tx, po_number_start)?;
        tx.execute(
            "INSERT INTO purchase_orders (
                id,
                po_number,
                requestor_id,
                supplier_id,
                department_id,
                purpose,
                vat_rate_bps,
                shipping_cents,
                discount_cents,
                subtotal_cents,
                vat_cents,
                total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                po_id_text.as_str(),
                po_number,
                po.requestor_id.to_string(),
                po.supplier_id.to_string(),
                po.department_id.map(|value| value.to_string()),
                purpose,
                po.vat_rate.bps(),
                po.totals.shipping.cents(),
                po.totals.discount.cents(),
                po.totals.subtotal.cents(),
                po.totals.vat.cents(),
                po.totals.total.cents(),
            ],
        )?;
        insert_lines(&tx, po_id_text.as_str(), &po.lines)?;
        record_quoted_prices(&tx, po.supplier_id, &po.lines)?;
        insert_approval(&tx, po_id_text.as_str(), PoStatus::Pending, actor_id, None)?;
        tx.commit()?;

        self.load_required(po.id)
    }

    fn replace_lines(
        &self,
        po_id: PoId,
        expected: PoStatus,
        vat_rate: Rate,
        totals: &PoTotals,
        lines: &[PricedLine],
    ) -> RepoResult<PurchaseOrder> {
        let po_id_text = po_id.to_string();
        let tx = self.immediate_tx()?;
        ensure_status_in(&tx, po_id, expected)?;

        tx.execute("DELETE FROM po_items WHERE po_id = ?1;", [po_id_text.as_str()])?;
        insert_lines(&tx, po_id_text.as_str(), lines)?;
        record_quoted_prices(&tx, supplier_of(&tx, po_id)?, lines)?;
        tx.execute(
            "UPDATE purchase_orders
             SET
                vat_rate_bps = ?2,
                shipping_cents = ?3,
                discount_cents = ?4,
                subtotal_cents = ?5,
                vat_cents = ?6,
                total_cents = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                po_id_text.as_str(),
                vat_rate.bps(),
                totals.shipping.cents(),
                totals.discount.cents(),
                totals.subtotal.cents(),
                totals.vat.cents(),
                totals.total.cents(),
            ],
        )?;
        tx.commit()?;

        self.load_required(po_id)
    }

    fn get_purchase_order(&self, po_id: PoId) -> RepoResult<Option<PurchaseOrder>> {
        self.load_one("po.id = ?1", Value::Text(po_id.to_string()))
    }

    fn get_by_number(&self, po_number: i64) -> RepoResult<Option<PurchaseOrder>> {
        self.load_one("po.po_number = ?1", Value::Integer(po_number))
    }

    fn list_purchase_orders(&self, query: &PoListQuery) -> RepoResult<Vec<PoSummary>> {
        let mut sql = format!(
            "SELECT
                po.id,
                po.po_number,
                po.requestor_id,
                po.supplier_id,
                s.name AS supplier_name,
                po.department_id,
                po.purpose,
                po.total_cents,
                po.created_at,
                a.status_id AS status_id
             FROM purchase_orders po
             {LATEST_APPROVAL_JOIN}
             JOIN suppliers s ON s.id = po.supplier_id
             WHERE po.is_deleted = 0"
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND a.status_id = ?");
            bind_values.push(Value::Integer(status.id()));
        }
        if let Some(requestor_id) = query.requestor_id {
            sql.push_str(" AND po.requestor_id = ?");
            bind_values.push(Value::Text(requestor_id.to_string()));
        }
        if let Some(supplier_id) = query.supplier_id {
            sql.push_str(" AND po.supplier_id = ?");
            bind_values.push(Value::Text(supplier_id.to_string()));
        }
        if let Some(department_id) = query.department_id {
            sql.push_str(" AND po.department_id = ?");
            bind_values.push(Value::Text(department_id.to_string()));
        }

        sql.push_str(" ORDER BY po.po_number DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_po_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(parse_summary_row(row)?);
        }
        Ok(summaries)
    }

    fn current_status(&self, po_id: PoId) -> RepoResult<Option<PoStatus>> {
        current_status_in(self.conn, po_id)
    }

    fn record_transition(
        &self,
        po_id: PoId,
        from: PoStatus,
        to: PoStatus,
        actor_id: UserId,
        remarks: Option<&str>,
    ) -> RepoResult<Approval> {
        let po_id_text = po_id.to_string();
        let tx = self.immediate_tx()?;
        ensure_status_in(&tx, po_id, from)?;
        let approval_id = insert_approval(&tx, po_id_text.as_str(), to, actor_id, remarks)?;
        tx.execute(
            "UPDATE purchase_orders
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [po_id_text.as_str()],
        )?;
        let approval = tx.query_row(
            "SELECT id, po_id, status_id, actor_id, remarks, created_at
             FROM approvals
             WHERE id = ?1;",
            [approval_id],
            |row| Ok(parse_approval_row(row)),
        )??;
        tx.commit()?;
        Ok(approval)
    }

    fn approval_history(&self, po_id: PoId) -> RepoResult<Vec<Approval>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, po_id, status_id, actor_id, remarks, created_at
             FROM approvals
             WHERE po_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([po_id.to_string()])?;
        let mut history = Vec::new();
        while let Some(row) = rows.next()? {
            history.push(parse_approval_row(row)?);
        }
        Ok(history)
    }

    fn status_counts(&self) -> RepoResult<Vec<StatusCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT a.status_id, COUNT(*)
             FROM purchase_orders po
             {LATEST_APPROVAL_JOIN}
             WHERE po.is_deleted = 0
             GROUP BY a.status_id;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut counts: Vec<StatusCount> = PoStatus::ALL
            .into_iter()
            .map(|status| StatusCount { status, count: 0 })
            .collect();
        while let Some(row) = rows.next()? {
            let status = parse_status_id(row.get(0)?)?;
            let count: i64 = row.get(1)?;
            if let Some(entry) = counts.iter_mut().find(|entry| entry.status == status) {
                entry.count = count;
            }
        }
        Ok(counts)
    }

    fn soft_delete(&self, po_id: PoId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE purchase_orders
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            [po_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("purchase order", po_id));
        }
        Ok(())
    }

    fn list_statuses(&self) -> RepoResult<Vec<StatusDefinition>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, label, sort_order FROM statuses ORDER BY sort_order ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut statuses = Vec::new();
        while let Some(row) = rows.next()? {
            statuses.push(StatusDefinition {
                status: parse_status_id(row.get("id")?)?,
                label: row.get("label")?,
                sort_order: row.get("sort_order")?,
            });
        }
        Ok(statuses)
    }

    fn relabel_status(&self, status: PoStatus, label: &str) -> RepoResult<StatusDefinition> {
        let label = require_text("label", label)?;
        let changed = self.conn.execute(
            "UPDATE statuses SET label = ?2 WHERE id = ?1;",
            params![status.id(), label.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("status", status));
        }
        let sort_order: i64 = self.conn.query_row(
            "SELECT sort_order FROM statuses WHERE id = ?1;",
            [status.id()],
            |row| row.get(0),
        )?;
        Ok(StatusDefinition {
            status,
            label,
            sort_order,
        })
    }
}

/// Normalizes list limit: `None`/0 -> 20, above 100 -> 100.
pub fn normalize_po_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => PO_LIST_DEFAULT_LIMIT,
        Some(value) if value > PO_LIST_LIMIT_MAX => PO_LIST_LIMIT_MAX,
        Some(value) => value,
    }
}

fn next_po_number_in(conn: &Connection, start: i64) -> RepoResult<i64> {
    // Soft-deleted rows keep their numbers, so they count toward MAX.
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(po_number) FROM purchase_orders;",
        [],
        |row| row.get(0),
    )?;
    let start = start.max(1);
    Ok(match max {
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| RepoError::InvalidData("po_number sequence exhausted".to_string()))?
            .max(start),
        None => start,
    })
}

fn current_status_in(conn: &Connection, po_id: PoId) -> RepoResult<Option<PoStatus>> {
    let status_id: Option<i64> = conn
        .query_row(
            "SELECT a.status_id
             FROM approvals a
             JOIN purchase_orders po ON po.id = a.po_id
             WHERE a.po_id = ?1
               AND po.is_deleted = 0
             ORDER BY a.id DESC
             LIMIT 1;",
            [po_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    status_id.map(parse_status_id).transpose()
}

fn ensure_status_in(tx: &Transaction<'_>, po_id: PoId, expected: PoStatus) -> RepoResult<()> {
    let actual = current_status_in(tx, po_id)?
        .ok_or_else(|| RepoError::not_found("purchase order", po_id))?;
    if actual != expected {
        return Err(RepoError::StaleStatus {
            po_id,
            expected,
            actual,
        });
    }
    Ok(())
}

fn supplier_of(tx: &Transaction<'_>, po_id: PoId) -> RepoResult<SupplierId> {
    let supplier_text: String = tx
        .query_row(
            "SELECT supplier_id FROM purchase_orders WHERE id = ?1;",
            [po_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepoError::not_found("purchase order", po_id))?;
    parse_uuid(&supplier_text, "purchase_orders.supplier_id")
}

fn insert_lines(tx: &Transaction<'_>, po_id: &str, lines: &[PricedLine]) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO po_items (
            po_id,
            line_no,
            item_id,
            description,
            quantity,
            unit_price_cents,
            amount_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
    )?;
    for line in lines {
        stmt.execute(params![
            po_id,
            line.line_no,
            line.item_id.to_string(),
            line.description.as_deref(),
            line.quantity,
            line.unit_price.cents(),
            line.amount.cents(),
        ])?;
    }
    Ok(())
}

fn insert_approval(
    tx: &Transaction<'_>,
    po_id: &str,
    status: PoStatus,
    actor_id: UserId,
    remarks: Option<&str>,
) -> RepoResult<i64> {
    let remarks = remarks.map(str::trim).filter(|text| !text.is_empty());
    tx.execute(
        "INSERT INTO approvals (po_id, status_id, actor_id, remarks) VALUES (?1, ?2, ?3, ?4);",
        params![po_id, status.id(), actor_id.to_string(), remarks],
    )?;
    Ok(tx.last_insert_rowid())
}

fn load_lines(conn: &Connection, po_id: PoId) -> RepoResult<Vec<PoLine>> {
    let mut stmt = conn.prepare(
        "SELECT
            pi.line_no,
            pi.item_id,
            i.name AS item_name,
            i.unit AS unit,
            pi.description,
            pi.quantity,
            pi.unit_price_cents,
            pi.amount_cents
         FROM po_items pi
         JOIN items i ON i.id = pi.item_id
         WHERE pi.po_id = ?1
         ORDER BY pi.line_no ASC;",
    )?;
    let mut rows = stmt.query([po_id.to_string()])?;
    let mut lines = Vec::new();
    while let Some(row) = rows.next()? {
        let item_text: String = row.get("item_id")?;
        lines.push(PoLine {
            line_no: row.get("line_no")?,
            item_id: parse_uuid(&item_text, "po_items.item_id")?,
            item_name: row.get("item_name")?,
            unit: row.get("unit")?,
            description: row.get("description")?,
            quantity: row.get("quantity")?,
            unit_price: Money::from_cents(row.get("unit_price_cents")?),
            amount: Money::from_cents(row.get("amount_cents")?),
        });
    }
    Ok(lines)
}

fn parse_status_id(status_id: i64) -> RepoResult<PoStatus> {
    PoStatus::from_id(status_id).ok_or_else(|| {
        RepoError::InvalidData(format!("unknown status id `{status_id}` in approvals"))
    })
}

fn parse_po_row(row: &Row<'_>) -> RepoResult<PurchaseOrder> {
    let id_text: String = row.get("id")?;
    let requestor_text: String = row.get("requestor_id")?;
    let supplier_text: String = row.get("supplier_id")?;
    let vat_bps: u32 = row.get("vat_rate_bps")?;
    let vat_rate = Rate::from_bps(vat_bps).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid vat rate `{vat_bps}` in purchase_orders.vat_rate_bps"
        ))
    })?;
    let po_number: i64 = row.get("po_number")?;

    Ok(PurchaseOrder {
        id: parse_uuid(&id_text, "purchase_orders.id")?,
        po_number,
        display_number: format_po_number(po_number),
        requestor_id: parse_uuid(&requestor_text, "purchase_orders.requestor_id")?,
        supplier_id: parse_uuid(&supplier_text, "purchase_orders.supplier_id")?,
        department_id: parse_optional_uuid(
            row.get("department_id")?,
            "purchase_orders.department_id",
        )?,
        purpose: row.get("purpose")?,
        vat_rate,
        totals: PoTotals {
            subtotal: Money::from_cents(row.get("subtotal_cents")?),
            discount: Money::from_cents(row.get("discount_cents")?),
            vat: Money::from_cents(row.get("vat_cents")?),
            shipping: Money::from_cents(row.get("shipping_cents")?),
            total: Money::from_cents(row.get("total_cents")?),
        },
        status: parse_status_id(row.get("status_id")?)?,
        lines: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<PoSummary> {
    let id_text: String = row.get("id")?;
    let requestor_text: String = row.get("requestor_id")?;
    let supplier_text: String = row.get("supplier_id")?;
    let po_number: i64 = row.get("po_number")?;
    Ok(PoSummary {
        id: parse_uuid(&id_text, "purchase_orders.id")?,
        po_number,
        display_number: format_po_number(po_number),
        requestor_id: parse_uuid(&requestor_text, "purchase_orders.requestor_id")?,
        supplier_id: parse_uuid(&supplier_text, "purchase_orders.supplier_id")?,
        supplier_name: row.get("supplier_name")?,
        department_id: parse_optional_uuid(
            row.get("department_id")?,
            "purchase_orders.department_id",
        )?,
        purpose: row.get("purpose")?,
        total: Money::from_cents(row.get("total_cents")?),
        status: parse_status_id(row.get("status_id")?)?,
        created_at: row.get("created_at")?,
    })
}

fn parse_approval_row(row: &Row<'_>) -> RepoResult<Approval> {
    let po_text: String = row.get("po_id")?;
    Ok(Approval {
        id: row.get("id")?,
        po_id: parse_uuid(&po_text, "approvals.po_id")?,
        status: parse_status_id(row.get("status_id")?)?,
        actor_id: parse_optional_uuid(row.get("actor_id")?, "approvals.actor_id")?,
        remarks: row.get("remarks")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_po_limit;

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(normalize_po_limit(None), 20);
        assert_eq!(normalize_po_limit(Some(0)), 20);
        assert_eq!(normalize_po_limit(Some(35)), 35);
        assert_eq!(normalize_po_limit(Some(500)), 100);
    }
}
