//! Catalog items and their supplier price history.

use crate::model::directory::SupplierId;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable catalog item identifier.
pub type ItemId = Uuid;

/// Purchasable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Unit of measure, e.g. `pc`, `box`, `ream`.
    pub unit: String,
    pub description: Option<String>,
    pub created_at: i64,
}

/// Input for creating a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One recorded unit price of an item at a supplier.
///
/// Rows are append-only; the most recent row is the price used when a PO
/// line does not carry an explicit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub id: i64,
    pub item_id: ItemId,
    pub supplier_id: SupplierId,
    pub unit_price: Money,
    pub recorded_at: i64,
}
