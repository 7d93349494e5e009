#![allow(dead_code)]

use procure_core::db::open_db_in_memory;
use procure_core::model::directory::{Department, NewUser, Role, Supplier, SupplierInput, User};
use procure_core::model::item::{Item, NewItem};
use procure_core::model::purchase_order::{CreatePoRequest, LineInput};
use procure_core::money::Money;
use procure_core::service::directory_service::DirectoryService;
use rusqlite::Connection;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn money(text: &str) -> Money {
    text.parse().unwrap()
}

/// Directory records shared by service tests.
pub struct Seed {
    pub admin: User,
    pub requestor: User,
    pub finance: User,
    pub head: User,
    pub authorized: User,
    pub department: Department,
    pub other_department: Department,
    pub supplier: Supplier,
    pub paper: Item,
    pub toner: Item,
}

pub fn seed(conn: &Connection) -> Seed {
    let directory = DirectoryService::from_connection(conn).unwrap();
    let admin = directory
        .bootstrap_superadmin("Root Admin", "admin@example.com")
        .unwrap();
    let department = directory.create_department(admin.id, "Operations").unwrap();
    let other_department = directory.create_department(admin.id, "Marketing").unwrap();

    let create_user = |name: &str, email: &str, role: Role| {
        directory
            .create_user(
                admin.id,
                &NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    role,
                    department_id: Some(department.id),
                },
            )
            .unwrap()
    };
    let requestor = create_user("Rita Requestor", "rita@example.com", Role::Requestor);
    let finance = create_user("Fred Finance", "fred@example.com", Role::Finance);
    let head = create_user("Hana Head", "hana@example.com", Role::DepartmentHead);
    let authorized = create_user("Abe Authorized", "abe@example.com", Role::Authorized);

    let supplier = directory
        .create_supplier(
            admin.id,
            &SupplierInput {
                name: "Acme Office Supply".to_string(),
                email: Some("sales@acme.example".to_string()),
                ..SupplierInput::default()
            },
        )
        .unwrap();
    let paper = directory
        .create_item(
            admin.id,
            &NewItem {
                name: "Bond paper A4".to_string(),
                unit: "ream".to_string(),
                description: None,
            },
        )
        .unwrap();
    let toner = directory
        .create_item(
            admin.id,
            &NewItem {
                name: "Toner cartridge".to_string(),
                unit: "pc".to_string(),
                description: Some("Black, high yield".to_string()),
            },
        )
        .unwrap();

    Seed {
        admin,
        requestor,
        finance,
        head,
        authorized,
        department,
        other_department,
        supplier,
        paper,
        toner,
    }
}

pub fn line(item: &Item, quantity: u32, unit_price: Option<&str>) -> LineInput {
    LineInput {
        item_id: item.id,
        quantity,
        unit_price: unit_price.map(money),
        description: None,
    }
}

/// Two-line request at the seeded supplier with explicit prices.
pub fn simple_request(seed: &Seed) -> CreatePoRequest {
    CreatePoRequest {
        requestor_id: None,
        supplier_id: seed.supplier.id,
        department_id: None,
        purpose: "Quarterly office supplies".to_string(),
        lines: vec![
            line(&seed.paper, 3, Some("100.00")),
            line(&seed.toner, 2, Some("25.50")),
        ],
        vat_rate: None,
        shipping: money("150.00"),
        discount: money("51.00"),
    }
}
