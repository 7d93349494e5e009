//! User, department and supplier repositories.
//!
//! # Responsibility
//! - Persist directory records behind `UserRepository` and `SupplierRepository`.
//! - Normalize names and e-mail addresses before they reach SQL.
//!
//! # Invariants
//! - Records are deactivated, never deleted, so historical POs keep their
//!   references.
//! - Listing order is deterministic: `name COLLATE NOCASE ASC, id ASC`.

use crate::model::directory::{
    Department, DepartmentId, NewUser, Role, Supplier, SupplierId, SupplierInput, User, UserId,
};
use crate::model::validation::{normalize_email, optional_text, require_text};
use crate::repo::{
    bool_to_int, ensure_connection_ready, like_pattern, parse_bool, parse_optional_uuid,
    parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    role,
    department_id,
    is_active,
    created_at,
    updated_at
FROM users";

const SUPPLIER_SELECT_SQL: &str = "SELECT
    id,
    name,
    contact_person,
    email,
    phone,
    address,
    tin,
    is_active,
    created_at,
    updated_at
FROM suppliers";

/// Filter options for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub department_id: Option<DepartmentId>,
    pub active_only: bool,
}

/// Filter options for listing suppliers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierListQuery {
    /// Case-insensitive substring match on supplier name.
    pub name_contains: Option<String>,
    pub active_only: bool,
}

/// Repository interface for users and departments.
pub trait UserRepository {
    fn create_department(&self, name: &str) -> RepoResult<Department>;
    fn list_departments(&self) -> RepoResult<Vec<Department>>;
    fn get_department(&self, id: DepartmentId) -> RepoResult<Option<Department>>;
    fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
    /// Changes role and department assignment in one update.
    fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        department_id: Option<DepartmentId>,
    ) -> RepoResult<User>;
    fn set_user_active(&self, id: UserId, is_active: bool) -> RepoResult<User>;
}

/// Repository interface for suppliers.
pub trait SupplierRepository {
    fn create_supplier(&self, input: &SupplierInput) -> RepoResult<Supplier>;
    fn get_supplier(&self, id: SupplierId) -> RepoResult<Option<Supplier>>;
    fn list_suppliers(&self, query: &SupplierListQuery) -> RepoResult<Vec<Supplier>>;
    fn update_supplier(&self, id: SupplierId, input: &SupplierInput) -> RepoResult<Supplier>;
    fn set_supplier_active(&self, id: SupplierId, is_active: bool) -> RepoResult<Supplier>;
}

/// SQLite-backed user/department repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["departments", "users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_department(&self, name: &str) -> RepoResult<Department> {
        let name = require_text("name", name)?;
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO departments (id, name) VALUES (?1, ?2);",
                params![id.to_string(), name.as_str()],
            )
            .map_err(|err| RepoError::from_write("department", &name, err))?;
        self.get_department(id)?
            .ok_or_else(|| RepoError::not_found("department", id))
    }

    fn list_departments(&self) -> RepoResult<Vec<Department>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at
             FROM departments
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut departments = Vec::new();
        while let Some(row) = rows.next()? {
            departments.push(parse_department_row(row)?);
        }
        Ok(departments)
    }

    fn get_department(&self, id: DepartmentId) -> RepoResult<Option<Department>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM departments WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_department_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let name = require_text("name", &user.name)?;
        let email = normalize_email(&user.email)?;
        let id = Uuid::new_v4();

        self.conn
            .execute(
                "INSERT INTO users (id, name, email, role, department_id, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1);",
                params![
                    id.to_string(),
                    name,
                    email.as_str(),
                    user.role.as_str(),
                    user.department_id.map(|value| value.to_string()),
                ],
            )
            .map_err(|err| RepoError::from_write("user", &email, err))?;

        self.load_required_user(id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE;"))?;
        let mut rows = stmt.query([email.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(role) = query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        if let Some(department_id) = query.department_id {
            sql.push_str(" AND department_id = ?");
            bind_values.push(Value::Text(department_id.to_string()));
        }
        if query.active_only {
            sql.push_str(" AND is_active = 1");
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn update_user_role(
        &self,
        id: UserId,
        role: Role,
        department_id: Option<DepartmentId>,
    ) -> RepoResult<User> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                role = ?2,
                department_id = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                role.as_str(),
                department_id.map(|value| value.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        self.load_required_user(id)
    }

    fn set_user_active(&self, id: UserId, is_active: bool) -> RepoResult<User> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                is_active = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_active)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        self.load_required_user(id)
    }
}

impl SqliteUserRepository<'_> {
    fn load_required_user(&self, id: UserId) -> RepoResult<User> {
        self.get_user(id)?
            .ok_or_else(|| RepoError::not_found("user", id))
    }
}

/// SQLite-backed supplier repository.
pub struct SqliteSupplierRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSupplierRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["suppliers"])?;
        Ok(Self { conn })
    }
}

impl SupplierRepository for SqliteSupplierRepository<'_> {
    fn create_supplier(&self, input: &SupplierInput) -> RepoResult<Supplier> {
        let fields = NormalizedSupplier::try_from_input(input)?;
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO suppliers (
                    id,
                    name,
                    contact_person,
                    email,
                    phone,
                    address,
                    tin,
                    is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1);",
                params![
                    id.to_string(),
                    fields.name.as_str(),
                    fields.contact_person,
                    fields.email,
                    fields.phone,
                    fields.address,
                    fields.tin,
                ],
            )
            .map_err(|err| RepoError::from_write("supplier", &fields.name, err))?;
        self.load_required_supplier(id)
    }

    fn get_supplier(&self, id: SupplierId) -> RepoResult<Option<Supplier>> {
        self.conn
            .query_row(
                &format!("{SUPPLIER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_supplier_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_suppliers(&self, query: &SupplierListQuery) -> RepoResult<Vec<Supplier>> {
        let mut sql = format!("{SUPPLIER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(term) = query
            .name_contains
            .as_deref()
            .filter(|term| !term.trim().is_empty())
        {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_pattern(term)));
        }
        if query.active_only {
            sql.push_str(" AND is_active = 1");
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut suppliers = Vec::new();
        while let Some(row) = rows.next()? {
            suppliers.push(parse_supplier_row(row)?);
        }
        Ok(suppliers)
    }

    fn update_supplier(&self, id: SupplierId, input: &SupplierInput) -> RepoResult<Supplier> {
        let fields = NormalizedSupplier::try_from_input(input)?;
        let changed = self
            .conn
            .execute(
                "UPDATE suppliers
                 SET
                    name = ?2,
                    contact_person = ?3,
                    email = ?4,
                    phone = ?5,
                    address = ?6,
                    tin = ?7,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    id.to_string(),
                    fields.name.as_str(),
                    fields.contact_person,
                    fields.email,
                    fields.phone,
                    fields.address,
                    fields.tin,
                ],
            )
            .map_err(|err| RepoError::from_write("supplier", &fields.name, err))?;
        if changed == 0 {
            return Err(RepoError::not_found("supplier", id));
        }
        self.load_required_supplier(id)
    }

    fn set_supplier_active(&self, id: SupplierId, is_active: bool) -> RepoResult<Supplier> {
        let changed = self.conn.execute(
            "UPDATE suppliers
             SET
                is_active = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_active)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("supplier", id));
        }
        self.load_required_supplier(id)
    }
}

impl SqliteSupplierRepository<'_> {
    fn load_required_supplier(&self, id: SupplierId) -> RepoResult<Supplier> {
        self.get_supplier(id)?
            .ok_or_else(|| RepoError::not_found("supplier", id))
    }
}

struct NormalizedSupplier {
    name: String,
    contact_person: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    tin: Option<String>,
}

impl NormalizedSupplier {
    fn try_from_input(input: &SupplierInput) -> RepoResult<Self> {
        let email = match optional_text(input.email.as_deref()) {
            Some(value) => Some(normalize_email(&value)?),
            None => None,
        };
        Ok(Self {
            name: require_text("name", &input.name)?,
            contact_person: optional_text(input.contact_person.as_deref()),
            email,
            phone: optional_text(input.phone.as_deref()),
            address: optional_text(input.address.as_deref()),
            tin: optional_text(input.tin.as_deref()),
        })
    }
}

fn parse_department_row(row: &Row<'_>) -> RepoResult<Department> {
    let id_text: String = row.get("id")?;
    Ok(Department {
        id: parse_uuid(&id_text, "departments.id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;

    Ok(User {
        id: parse_uuid(&id_text, "users.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
        department_id: parse_optional_uuid(row.get("department_id")?, "users.department_id")?,
        is_active: parse_bool(row.get("is_active")?, "users.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_supplier_row(row: &Row<'_>) -> RepoResult<Supplier> {
    let id_text: String = row.get("id")?;
    Ok(Supplier {
        id: parse_uuid(&id_text, "suppliers.id")?,
        name: row.get("name")?,
        contact_person: row.get("contact_person")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        tin: row.get("tin")?,
        is_active: parse_bool(row.get("is_active")?, "suppliers.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
