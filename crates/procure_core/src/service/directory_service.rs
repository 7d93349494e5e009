//! Directory administration: users, departments, suppliers and catalog items.
//!
//! # Responsibility
//! - Gate every directory mutation behind the superadmin role.
//! - Expose read paths to any caller.
//!
//! # Invariants
//! - A superadmin cannot deactivate or demote their own account, so at least
//!   one superadmin remains able to administer the system.
//! - Department references are checked before users are written.

use crate::logging::log_field;
use crate::model::directory::{
    Department, DepartmentId, NewUser, Role, Supplier, SupplierId, SupplierInput, User, UserId,
};
use crate::model::item::{Item, ItemId, ItemPrice, NewItem};
use crate::money::Money;
use crate::repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
use crate::repo::directory_repo::{
    SqliteSupplierRepository, SqliteUserRepository, SupplierListQuery, SupplierRepository,
    UserListQuery, UserRepository,
};
use crate::repo::RepoResult;
use crate::service::{require_superadmin, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Directory facade over user, supplier and catalog repositories.
pub struct DirectoryService<U, S, C>
where
    U: UserRepository,
    S: SupplierRepository,
    C: CatalogRepository,
{
    users: U,
    suppliers: S,
    catalog: C,
}

impl<U, S, C> DirectoryService<U, S, C>
where
    U: UserRepository,
    S: SupplierRepository,
    C: CatalogRepository,
{
    pub fn new(users: U, suppliers: S, catalog: C) -> Self {
        Self {
            users,
            suppliers,
            catalog,
        }
    }

    /// Creates the first superadmin of an empty directory.
    ///
    /// Refused once any superadmin exists; afterwards accounts are created
    /// through [`Self::create_user`].
    pub fn bootstrap_superadmin(&self, name: &str, email: &str) -> ServiceResult<User> {
        let existing = self.users.list_users(&UserListQuery {
            role: Some(Role::Superadmin),
            ..UserListQuery::default()
        })?;
        if !existing.is_empty() {
            return Err(ServiceError::Forbidden {
                actor: existing[0].id,
                role: Role::Superadmin,
                operation: "bootstrap a second superadmin",
            });
        }
        let user = self.users.create_user(&NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Superadmin,
            department_id: None,
        })?;
        info!("event=directory_bootstrap module=service status=ok user={}", user.id);
        Ok(user)
    }

    pub fn create_department(&self, actor_id: UserId, name: &str) -> ServiceResult<Department> {
        require_superadmin(&self.users, actor_id, "create departments")?;
        let department = self.users.create_department(name)?;
        info!(
            "event=department_create module=service status=ok name={}",
            log_field(&department.name)
        );
        Ok(department)
    }

    pub fn list_departments(&self) -> ServiceResult<Vec<Department>> {
        Ok(self.users.list_departments()?)
    }

    pub fn create_user(&self, actor_id: UserId, user: &NewUser) -> ServiceResult<User> {
        require_superadmin(&self.users, actor_id, "create users")?;
        self.ensure_department(user.department_id)?;
        let created = self.users.create_user(user)?;
        info!(
            "event=user_create module=service status=ok user={} role={}",
            created.id, created.role
        );
        Ok(created)
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.users
            .get_user(id)?
            .ok_or_else(|| not_found("user", id))
    }

    /// Looks a user up by e-mail, ignoring case and surrounding whitespace.
    pub fn get_user_by_email(&self, email: &str) -> ServiceResult<User> {
        self.users
            .get_user_by_email(email)?
            .ok_or_else(|| not_found("user", email.trim()))
    }

    pub fn list_users(&self, query: &UserListQuery) -> ServiceResult<Vec<User>> {
        Ok(self.users.list_users(query)?)
    }

    /// Assigns a role and department to a user.
    pub fn assign_role(
        &self,
        actor_id: UserId,
        user_id: UserId,
        role: Role,
        department_id: Option<DepartmentId>,
    ) -> ServiceResult<User> {
        let actor = require_superadmin(&self.users, actor_id, "assign roles")?;
        if actor.id == user_id && role != Role::Superadmin {
            return Err(ServiceError::Forbidden {
                actor: actor.id,
                role: actor.role,
                operation: "demote their own account",
            });
        }
        self.ensure_department(department_id)?;
        let user = self.users.update_user_role(user_id, role, department_id)?;
        info!(
            "event=user_role module=service status=ok user={} role={}",
            user.id, user.role
        );
        Ok(user)
    }

    pub fn set_user_active(
        &self,
        actor_id: UserId,
        user_id: UserId,
        is_active: bool,
    ) -> ServiceResult<User> {
        let actor = require_superadmin(&self.users, actor_id, "change user status")?;
        if actor.id == user_id && !is_active {
            return Err(ServiceError::Forbidden {
                actor: actor.id,
                role: actor.role,
                operation: "deactivate their own account",
            });
        }
        let user = self.users.set_user_active(user_id, is_active)?;
        info!(
            "event=user_active module=service status=ok user={} active={}",
            user.id, user.is_active
        );
        Ok(user)
    }

    pub fn create_supplier(&self, actor_id: UserId, input: &SupplierInput) -> ServiceResult<Supplier> {
        require_superadmin(&self.users, actor_id, "create suppliers")?;
        let supplier = self.suppliers.create_supplier(input)?;
        info!(
            "event=supplier_create module=service status=ok supplier={} name={}",
            supplier.id,
            log_field(&supplier.name)
        );
        Ok(supplier)
    }

    pub fn update_supplier(
        &self,
        actor_id: UserId,
        supplier_id: SupplierId,
        input: &SupplierInput,
    ) -> ServiceResult<Supplier> {
        require_superadmin(&self.users, actor_id, "update suppliers")?;
        Ok(self.suppliers.update_supplier(supplier_id, input)?)
    }

    pub fn set_supplier_active(
        &self,
        actor_id: UserId,
        supplier_id: SupplierId,
        is_active: bool,
    ) -> ServiceResult<Supplier> {
        require_superadmin(&self.users, actor_id, "change supplier status")?;
        let supplier = self.suppliers.set_supplier_active(supplier_id, is_active)?;
        info!(
            "event=supplier_active module=service status=ok supplier={} active={}",
            supplier.id, supplier.is_active
        );
        Ok(supplier)
    }

    pub fn get_supplier(&self, id: SupplierId) -> ServiceResult<Supplier> {
        self.suppliers
            .get_supplier(id)?
            .ok_or_else(|| not_found("supplier", id))
    }

    pub fn list_suppliers(&self, query: &SupplierListQuery) -> ServiceResult<Vec<Supplier>> {
        Ok(self.suppliers.list_suppliers(query)?)
    }

    pub fn create_item(&self, actor_id: UserId, item: &NewItem) -> ServiceResult<Item> {
        require_superadmin(&self.users, actor_id, "create items")?;
        let created = self.catalog.create_item(item)?;
        info!(
            "event=item_create module=service status=ok item={} name={}",
            created.id,
            log_field(&created.name)
        );
        Ok(created)
    }

    pub fn list_items(&self) -> ServiceResult<Vec<Item>> {
        Ok(self.catalog.list_items()?)
    }

    /// Records a quoted unit price outside of any purchase order.
    pub fn record_price(
        &self,
        actor_id: UserId,
        item_id: ItemId,
        supplier_id: SupplierId,
        unit_price: Money,
    ) -> ServiceResult<ItemPrice> {
        require_superadmin(&self.users, actor_id, "record item prices")?;
        self.catalog
            .get_item(item_id)?
            .ok_or_else(|| not_found("item", item_id))?;
        self.get_supplier(supplier_id)?;
        Ok(self.catalog.record_price(item_id, supplier_id, unit_price)?)
    }

    pub fn price_history(
        &self,
        item_id: ItemId,
        supplier_id: Option<SupplierId>,
    ) -> ServiceResult<Vec<ItemPrice>> {
        Ok(self.catalog.price_history(item_id, supplier_id)?)
    }

    fn ensure_department(&self, department_id: Option<DepartmentId>) -> ServiceResult<()> {
        if let Some(department_id) = department_id {
            self.users
                .get_department(department_id)?
                .ok_or_else(|| not_found("department", department_id))?;
        }
        Ok(())
    }
}

impl<'conn>
    DirectoryService<
        SqliteUserRepository<'conn>,
        SqliteSupplierRepository<'conn>,
        SqliteCatalogRepository<'conn>,
    >
{
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqliteSupplierRepository::try_new(conn)?,
            SqliteCatalogRepository::try_new(conn)?,
        ))
    }
}

fn not_found(entity: &'static str, key: impl ToString) -> ServiceError {
    ServiceError::NotFound {
        entity,
        key: key.to_string(),
    }
}
