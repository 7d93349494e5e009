//! Superadmin database maintenance.

use crate::db::maintenance::{self, IntegrityReport, TableStat};
use crate::model::directory::UserId;
use crate::repo::directory_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::{require_superadmin, ServiceResult};
use rusqlite::Connection;

/// Maintenance facade. Every operation requires a superadmin actor.
pub struct MaintenanceService<'conn, U: UserRepository> {
    conn: &'conn Connection,
    users: U,
}

impl<'conn, U: UserRepository> MaintenanceService<'conn, U> {
    pub fn new(conn: &'conn Connection, users: U) -> Self {
        Self { conn, users }
    }

    pub fn integrity_check(&self, actor_id: UserId) -> ServiceResult<IntegrityReport> {
        require_superadmin(&self.users, actor_id, "run integrity checks")?;
        Ok(maintenance::integrity_check(self.conn).map_err(RepoError::from)?)
    }

    pub fn vacuum(&self, actor_id: UserId) -> ServiceResult<()> {
        require_superadmin(&self.users, actor_id, "vacuum the database")?;
        Ok(maintenance::vacuum(self.conn).map_err(RepoError::from)?)
    }

    pub fn analyze(&self, actor_id: UserId) -> ServiceResult<()> {
        require_superadmin(&self.users, actor_id, "analyze the database")?;
        Ok(maintenance::analyze(self.conn).map_err(RepoError::from)?)
    }

    pub fn table_stats(&self, actor_id: UserId) -> ServiceResult<Vec<TableStat>> {
        require_superadmin(&self.users, actor_id, "read table statistics")?;
        Ok(maintenance::table_stats(self.conn).map_err(RepoError::from)?)
    }
}

impl<'conn> MaintenanceService<'conn, SqliteUserRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(conn, SqliteUserRepository::try_new(conn)?))
    }
}
