//! Dashboard counts served through a short-lived cache.
//!
//! # Responsibility
//! - Report how many purchase orders sit at each workflow status.
//! - Share one cache handle with writers so they can drop stale counts.
//!
//! # Invariants
//! - Counts come from `PurchaseOrderRepository::status_counts`, one entry per
//!   status in workflow order.
//! - A zero TTL disables caching.

use crate::cache::TtlCache;
use crate::repo::po_repo::{PurchaseOrderRepository, SqlitePurchaseOrderRepository, StatusCount};
use crate::repo::RepoResult;
use crate::service::ServiceResult;
use log::debug;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Duration;

const STATUS_COUNTS_KEY: &str = "status_counts";

/// Per-status counts plus their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub counts: Vec<StatusCount>,
    pub total: i64,
}

impl DashboardSnapshot {
    fn from_counts(counts: Vec<StatusCount>) -> Self {
        let total = counts.iter().map(|entry| entry.count).sum();
        Self { counts, total }
    }
}

/// Cloneable handle to the dashboard cache; clones share entries.
#[derive(Clone)]
pub struct DashboardCache {
    inner: TtlCache<&'static str, DashboardSnapshot>,
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(ttl),
        }
    }

    /// Drops cached counts after a write that changes them.
    pub fn invalidate(&self) {
        self.inner.invalidate(&STATUS_COUNTS_KEY);
        debug!("event=dashboard_invalidate module=service status=ok");
    }
}

/// Read-only dashboard facade.
pub struct DashboardService<P: PurchaseOrderRepository> {
    orders: P,
    cache: DashboardCache,
}

impl<P: PurchaseOrderRepository> DashboardService<P> {
    pub fn new(orders: P, cache: DashboardCache) -> Self {
        Self { orders, cache }
    }

    /// Returns per-status counts, loading them when the cache is cold.
    pub fn status_counts(&self) -> ServiceResult<DashboardSnapshot> {
        self.cache.inner.get_or_try_insert_with(STATUS_COUNTS_KEY, || {
            debug!("event=dashboard_load module=service status=start");
            let counts = self.orders.status_counts()?;
            Ok(DashboardSnapshot::from_counts(counts))
        })
    }

    pub fn cache(&self) -> &DashboardCache {
        &self.cache
    }
}

impl<'conn> DashboardService<SqlitePurchaseOrderRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection, cache: DashboardCache) -> RepoResult<Self> {
        Ok(Self::new(SqlitePurchaseOrderRepository::try_new(conn)?, cache))
    }
}
