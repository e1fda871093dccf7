//! Core types and traits for Flash Report storage backends.
//!
//! This crate provides the `StorageBackend` trait, the typed query
//! description, the canonical schema and the domain models, so storage
//! implementations can live in separate crates.

pub mod ids;
pub mod models;
pub mod query;
pub mod schema;
pub mod storage;
pub mod transaction;

// Re-export key types at crate root for convenience
pub use ids::new_id;
pub use models::entities::{
    BusinessUnit, CashMovement, MovementCategory, Partner, PartnerAccount, PartnerAccountTransaction,
    PartnerRole, PointOfSale,
};
pub use models::read::{BalanceSummary, DateRange, MovementFilter, MovementListing};
pub use models::write::{
    BusinessUnitPatch, NewBusinessUnit, NewCashMovement, NewCategory, NewPartner, NewPartnerTransaction,
    PartnerPatch,
};
pub use models::{CategoryType, MovementType, Record, Value};
pub use query::{Predicate, Query, Row, Rows};
pub use schema::{ColumnKind, Table, TableDef};
pub use storage::{StorageBackend, StorageError, TransactionId};
pub use transaction::TransactionGate;
