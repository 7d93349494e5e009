//! Procurement domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the purchase-order workflow state machine and role permissions.
//!
//! # Invariants
//! - Every directory record and PO is identified by a stable UUID.
//! - Workflow stages only move forward; `Received` and `Rejected` are terminal.

pub mod directory;
pub mod item;
pub mod purchase_order;
pub mod status;
pub mod validation;
