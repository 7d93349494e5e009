//! Directory records: users, departments and suppliers.
//!
//! # Responsibility
//! - Define who may act on purchase orders and whom they buy from.
//! - Map roles to their workflow permissions.
//!
//! # Invariants
//! - `email` is stored lowercase and unique.
//! - Inactive users cannot act; inactive suppliers cannot receive new POs.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;
/// Stable department identifier.
pub type DepartmentId = Uuid;
/// Stable supplier identifier.
pub type SupplierId = Uuid;

/// Account role controlling which workflow actions a user may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates and edits own purchase orders.
    Requestor,
    /// Verifies pending purchase orders.
    Finance,
    /// Approves verified purchase orders of their department.
    DepartmentHead,
    /// Confirms delivery of approved purchase orders.
    Authorized,
    /// Full administrative access, including every workflow action.
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Requestor,
        Role::Finance,
        Role::DepartmentHead,
        Role::Authorized,
        Role::Superadmin,
    ];

    /// Stable storage and CLI code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requestor => "requestor",
            Self::Finance => "finance",
            Self::DepartmentHead => "department_head",
            Self::Authorized => "authorized",
            Self::Superadmin => "superadmin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
    }

    pub fn is_superadmin(self) -> bool {
        self == Self::Superadmin
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organizational unit that owns purchase orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub created_at: i64,
}

/// Application account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

/// Vendor that purchase orders are issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Tax identification number.
    pub tin: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Editable supplier fields, used for both create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInput {
    pub name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tin: Option<String>,
}
