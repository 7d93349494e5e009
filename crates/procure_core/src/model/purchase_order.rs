//! Purchase-order records.
//!
//! # Responsibility
//! - Define PO header, line, totals and approval read models.
//! - Define the request shapes accepted by PO use-cases.
//!
//! # Invariants
//! - `po_number` is unique and strictly positive.
//! - Stored totals always equal `pricing::compute_totals` over stored lines.
//! - `status` is the stage of the latest approval row.

use crate::model::directory::{DepartmentId, SupplierId, UserId};
use crate::model::item::ItemId;
use crate::model::status::PoStatus;
use crate::money::{Money, Rate};
use crate::pricing::PriceSource;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable purchase-order identifier.
pub type PoId = Uuid;

const PO_NUMBER_PREFIX: &str = "PO-";
const PO_NUMBER_WIDTH: usize = 6;

/// Formats a sequential PO number for display, e.g. `PO-000042`.
pub fn format_po_number(po_number: i64) -> String {
    format!("{PO_NUMBER_PREFIX}{po_number:0width$}", width = PO_NUMBER_WIDTH)
}

/// Parses either a bare number (`42`) or a formatted one (`PO-000042`).
pub fn parse_po_number(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix(PO_NUMBER_PREFIX)
        .or_else(|| trimmed.strip_prefix("po-"))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|number| *number > 0)
}

/// Computed monetary summary of a purchase order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub vat: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Stored purchase-order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoLine {
    /// 1-based position within the PO.
    pub line_no: u32,
    pub item_id: ItemId,
    pub item_name: String,
    pub unit: String,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub amount: Money,
}

/// Purchase-order read model with derived current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PoId,
    pub po_number: i64,
    /// `po_number` in `PO-000042` form.
    pub display_number: String,
    pub requestor_id: UserId,
    pub supplier_id: SupplierId,
    pub department_id: Option<DepartmentId>,
    pub purpose: String,
    pub vat_rate: Rate,
    pub totals: PoTotals,
    pub status: PoStatus,
    pub lines: Vec<PoLine>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Line as requested by a caller, before price resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub item_id: ItemId,
    pub quantity: u32,
    /// Explicit unit price. When absent the latest supplier price is used.
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Line after price resolution, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub price_source: PriceSource,
    pub amount: Money,
}

/// Request for creating a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoRequest {
    /// Defaults to the acting user when absent.
    #[serde(default)]
    pub requestor_id: Option<UserId>,
    pub supplier_id: SupplierId,
    /// Defaults to the requestor's department when absent.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    pub purpose: String,
    pub lines: Vec<LineInput>,
    /// Defaults to the configured VAT rate when absent.
    #[serde(default)]
    pub vat_rate: Option<Rate>,
    #[serde(default)]
    pub shipping: Money,
    #[serde(default)]
    pub discount: Money,
}

/// Request for replacing the lines and charges of a pending purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLinesRequest {
    pub lines: Vec<LineInput>,
    /// Keeps the stored rate when absent.
    #[serde(default)]
    pub vat_rate: Option<Rate>,
    #[serde(default)]
    pub shipping: Money,
    #[serde(default)]
    pub discount: Money,
}

/// Header values persisted with a new purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub id: PoId,
    pub requestor_id: UserId,
    pub supplier_id: SupplierId,
    pub department_id: Option<DepartmentId>,
    pub purpose: String,
    pub vat_rate: Rate,
    pub totals: PoTotals,
    pub lines: Vec<PricedLine>,
}

/// Compact PO row for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoSummary {
    pub id: PoId,
    pub po_number: i64,
    pub display_number: String,
    pub requestor_id: UserId,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub department_id: Option<DepartmentId>,
    pub purpose: String,
    pub total: Money,
    pub status: PoStatus,
    pub created_at: i64,
}

/// One recorded workflow transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub po_id: PoId,
    pub status: PoStatus,
    pub actor_id: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: i64,
}
