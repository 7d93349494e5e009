//! Catalog item and supplier price-history repository.
//!
//! # Responsibility
//! - Persist purchasable items.
//! - Append supplier price observations and answer "latest price" lookups.
//!
//! # Invariants
//! - `item_prices` is append-only; the latest row has the highest `id`.
//! - Item names are unique case-insensitively.

use crate::model::directory::SupplierId;
use crate::model::item::{Item, ItemId, ItemPrice, NewItem};
use crate::model::purchase_order::PricedLine;
use crate::model::validation::{optional_text, require_text, ValidationError};
use crate::money::Money;
use crate::pricing::PriceSource;
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Repository interface for items and their prices.
pub trait CatalogRepository {
    fn create_item(&self, item: &NewItem) -> RepoResult<Item>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    fn list_items(&self) -> RepoResult<Vec<Item>>;
    /// Appends one price observation.
    fn record_price(
        &self,
        item_id: ItemId,
        supplier_id: SupplierId,
        unit_price: Money,
    ) -> RepoResult<ItemPrice>;
    /// Returns the most recently recorded price of `item_id` at `supplier_id`.
    fn latest_price(&self, item_id: ItemId, supplier_id: SupplierId) -> RepoResult<Option<Money>>;
    /// Lists price observations newest first, optionally limited to one supplier.
    fn price_history(
        &self,
        item_id: ItemId,
        supplier_id: Option<SupplierId>,
    ) -> RepoResult<Vec<ItemPrice>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["items", "item_prices"])?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_item(&self, item: &NewItem) -> RepoResult<Item> {
        let name = require_text("name", &item.name)?;
        let unit = require_text("unit", &item.unit)?;
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO items (id, name, unit, description) VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    name.as_str(),
                    unit,
                    optional_text(item.description.as_deref()),
                ],
            )
            .map_err(|err| RepoError::from_write("item", &name, err))?;
        self.get_item(id)?
            .ok_or_else(|| RepoError::not_found("item", id))
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, unit, description, created_at
             FROM items
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_item_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, unit, description, created_at
             FROM items
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn record_price(
        &self,
        item_id: ItemId,
        supplier_id: SupplierId,
        unit_price: Money,
    ) -> RepoResult<ItemPrice> {
        insert_price(self.conn, item_id, supplier_id, unit_price)
    }

    fn latest_price(&self, item_id: ItemId, supplier_id: SupplierId) -> RepoResult<Option<Money>> {
        latest_price_on(self.conn, item_id, supplier_id)
    }

    fn price_history(
        &self,
        item_id: ItemId,
        supplier_id: Option<SupplierId>,
    ) -> RepoResult<Vec<ItemPrice>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, supplier_id, unit_price_cents, recorded_at
             FROM item_prices
             WHERE item_id = ?1
               AND (?2 IS NULL OR supplier_id = ?2)
             ORDER BY id DESC;",
        )?;
        let mut rows = stmt.query(params![
            item_id.to_string(),
            supplier_id.map(|value| value.to_string())
        ])?;
        let mut prices = Vec::new();
        while let Some(row) = rows.next()? {
            prices.push(parse_price_row(row)?);
        }
        Ok(prices)
    }
}

/// Appends explicitly quoted line prices that differ from the supplier's
/// latest recorded price.
///
/// Purchase-order writes pass their open transaction as `conn`, so price rows
/// commit or roll back together with the order.
pub(crate) fn record_quoted_prices(
    conn: &Connection,
    supplier_id: SupplierId,
    lines: &[PricedLine],
) -> RepoResult<usize> {
    let mut recorded = 0;
    for line in lines
        .iter()
        .filter(|line| line.price_source == PriceSource::Explicit)
    {
        if latest_price_on(conn, line.item_id, supplier_id)? != Some(line.unit_price) {
            insert_price(conn, line.item_id, supplier_id, line.unit_price)?;
            recorded += 1;
        }
    }
    Ok(recorded)
}

fn insert_price(
    conn: &Connection,
    item_id: ItemId,
    supplier_id: SupplierId,
    unit_price: Money,
) -> RepoResult<ItemPrice> {
    if unit_price.is_negative() {
        return Err(ValidationError::NegativeAmount("unit_price").into());
    }
    conn.execute(
        "INSERT INTO item_prices (item_id, supplier_id, unit_price_cents)
         VALUES (?1, ?2, ?3);",
        params![
            item_id.to_string(),
            supplier_id.to_string(),
            unit_price.cents()
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        "SELECT id, item_id, supplier_id, unit_price_cents, recorded_at
         FROM item_prices
         WHERE id = ?1;",
        [id],
        |row| Ok(parse_price_row(row)),
    )?
}

fn latest_price_on(
    conn: &Connection,
    item_id: ItemId,
    supplier_id: SupplierId,
) -> RepoResult<Option<Money>> {
    let cents: Option<i64> = conn
        .query_row(
            "SELECT unit_price_cents
             FROM item_prices
             WHERE item_id = ?1
               AND supplier_id = ?2
             ORDER BY id DESC
             LIMIT 1;",
            params![item_id.to_string(), supplier_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(cents.map(Money::from_cents))
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    Ok(Item {
        id: parse_uuid(&id_text, "items.id")?,
        name: row.get("name")?,
        unit: row.get("unit")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_price_row(row: &Row<'_>) -> RepoResult<ItemPrice> {
    let item_text: String = row.get("item_id")?;
    let supplier_text: String = row.get("supplier_id")?;
    Ok(ItemPrice {
        id: row.get("id")?,
        item_id: parse_uuid(&item_text, "item_prices.item_id")?,
        supplier_id: parse_uuid(&supplier_text, "item_prices.supplier_id")?,
        unit_price: Money::from_cents(row.get("unit_price_cents")?),
        recorded_at: row.get("recorded_at")?,
    })
}
