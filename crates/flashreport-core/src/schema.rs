//! Canonical table definitions and factory default rows.
//!
//! Both backends derive their layout from these definitions: the Local variant
//! uses the column kinds to decode its persisted blob, the Remote variant
//! generates its DDL from them.

use std::fmt::Display;

use rust_decimal::Decimal;

use crate::{
    models::Record,
    storage::{StorageBackend, StorageError},
};

/// Soft-delete flag column shared by every table that supports it.
pub const ACTIVE_COLUMN: &str = "is_active";

pub const DEFAULT_BUSINESS_UNIT_ID: &str = "bu-main";
pub const DEFAULT_MANAGING_PARTNER_ID: &str = "partner-managing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    BusinessUnits,
    Categories,
    Partners,
    PartnerAccounts,
    PartnerAccountTransactions,
    CashMovements,
    PointsOfSale,
    AppConfig,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::BusinessUnits,
        Table::Categories,
        Table::Partners,
        Table::PartnerAccounts,
        Table::PartnerAccountTransactions,
        Table::CashMovements,
        Table::PointsOfSale,
        Table::AppConfig,
    ];

    /// Tables that must never be empty after the store is opened.
    pub const REQUIRED: [Table; 3] = [Table::BusinessUnits, Table::Categories, Table::Partners];

    pub fn name(&self) -> &'static str {
        self.def().name
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn def(&self) -> &'static TableDef {
        match self {
            Table::BusinessUnits => &BUSINESS_UNITS,
            Table::Categories => &CATEGORIES,
            Table::Partners => &PARTNERS,
            Table::PartnerAccounts => &PARTNER_ACCOUNTS,
            Table::PartnerAccountTransactions => &PARTNER_ACCOUNT_TRANSACTIONS,
            Table::CashMovements => &CASH_MOVEMENTS,
            Table::PointsOfSale => &POINTS_OF_SALE,
            Table::AppConfig => &APP_CONFIG,
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Bool,
    Money,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, nullable: false }
}

const fn opt(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, nullable: true }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    pub soft_delete: bool,
    pub unique_keys: &'static [&'static [&'static str]],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

use ColumnKind::*;

static BUSINESS_UNITS: TableDef = TableDef {
    name: "business_units",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("name", Text),
        col("color", Text),
        opt("location", Text),
        col("display_order", Int),
        col("is_active", Bool),
    ],
    soft_delete: true,
    unique_keys: &[],
};

static CATEGORIES: TableDef = TableDef {
    name: "movement_categories",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("code", Text),
        col("name", Text),
        col("category_type", Text),
        col("description", Text),
    ],
    soft_delete: false,
    unique_keys: &[&["code"]],
};

static PARTNERS: TableDef = TableDef {
    name: "partners",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("name", Text),
        col("alias", Text),
        col("participation_percentage", Money),
        col("role", Text),
        col("is_managing_partner", Bool),
        col("is_active", Bool),
    ],
    soft_delete: true,
    unique_keys: &[],
};

static PARTNER_ACCOUNTS: TableDef = TableDef {
    name: "partner_accounts",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("partner_id", Text),
        col("current_balance", Money),
    ],
    soft_delete: false,
    unique_keys: &[&["partner_id"]],
};

static PARTNER_ACCOUNT_TRANSACTIONS: TableDef = TableDef {
    name: "partner_account_transactions",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("partner_account_id", Text),
        col("amount", Money),
        col("description", Text),
        col("transaction_date", Timestamp),
        col("created_at", Timestamp),
    ],
    soft_delete: false,
    unique_keys: &[],
};

static CASH_MOVEMENTS: TableDef = TableDef {
    name: "cash_movements",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("business_unit_id", Text),
        col("category_id", Text),
        col("movement_type", Text),
        col("amount", Money),
        col("description", Text),
        col("transaction_date", Timestamp),
        col("sequence_number", Int),
        opt("point_of_sale_id", Text),
        opt("created_by", Text),
        col("is_active", Bool),
        col("created_at", Timestamp),
    ],
    soft_delete: true,
    unique_keys: &[&["business_unit_id", "sequence_number"]],
};

static POINTS_OF_SALE: TableDef = TableDef {
    name: "points_of_sale",
    primary_key: "id",
    columns: &[
        col("id", Text),
        col("business_unit_id", Text),
        col("name", Text),
        col("fiscal_id", Text),
        col("is_active", Bool),
    ],
    soft_delete: true,
    unique_keys: &[],
};

static APP_CONFIG: TableDef = TableDef {
    name: "app_config",
    primary_key: "key",
    columns: &[col("key", Text), col("value", Text)],
    soft_delete: false,
    unique_keys: &[],
};

/// Factory default rows for a table. Ids are fixed so re-seeding is a no-op.
pub fn default_rows(table: Table) -> Vec<Record> {
    match table {
        Table::BusinessUnits => vec![Record::new()
            .with("id", DEFAULT_BUSINESS_UNIT_ID)
            .with("name", "Main Store")
            .with("color", "#1E88E5")
            .with("location", Option::<&str>::None)
            .with("display_order", 1i64)
            .with("is_active", true)],
        Table::Categories => vec![
            category("cat-sales", "VTA", "Sales", "CR", "Daily sales income"),
            category("cat-other-income", "OIN", "Other income", "CR", "Income not related to sales"),
            category("cat-supplies", "SUP", "Supplies", "DB", "Merchandise and supplies"),
            category("cat-payroll", "SAL", "Payroll", "DB", "Wages and salaries"),
            category("cat-services", "SRV", "Services", "DB", "Rent, utilities and services"),
            category("cat-adjustment", "ADJ", "Adjustment", "BOTH", "Cash count adjustments"),
        ],
        Table::Partners => vec![Record::new()
            .with("id", DEFAULT_MANAGING_PARTNER_ID)
            .with("name", "Managing Partner")
            .with("alias", "Admin")
            .with("participation_percentage", Decimal::ONE_HUNDRED)
            .with("role", "admin")
            .with("is_managing_partner", true)
            .with("is_active", true)],
        Table::PartnerAccounts => vec![Record::new()
            .with("id", "acct-partner-managing")
            .with("partner_id", DEFAULT_MANAGING_PARTNER_ID)
            .with("current_balance", Decimal::ZERO)],
        Table::AppConfig => vec![Record::new()
            .with("key", "managing_partner_id")
            .with("value", DEFAULT_MANAGING_PARTNER_ID)],
        Table::PartnerAccountTransactions | Table::CashMovements | Table::PointsOfSale => Vec::new(),
    }
}

fn category(id: &str, code: &str, name: &str, category_type: &str, description: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("code", code)
        .with("name", name)
        .with("category_type", category_type)
        .with("description", description)
}

/// Inserts every default row that is not already present. Returns how many
/// rows were added. A default that clashes with a user row on a unique key is
/// skipped with a warning and the user row is kept.
pub fn seed(backend: &dyn StorageBackend) -> Result<usize, StorageError> {
    let mut inserted = 0;
    for table in Table::ALL {
        for row in default_rows(table) {
            let id = row.text(table.def().primary_key).unwrap_or_default().to_string();
            match backend.insert_if_absent(table, row) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(StorageError::ConstraintViolation(reason)) => {
                    tracing::warn!(table = %table, id = %id, %reason, "Skipping conflicting default row");
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_row_matches_its_table() {
        for table in Table::ALL {
            let def = table.def();
            for row in default_rows(table) {
                for (column, _) in row.iter() {
                    assert!(def.column(column).is_some(), "{}.{} is not declared", def.name, column);
                }
                assert!(row.text(def.primary_key).is_some());
            }
        }
    }

    #[test]
    fn test_defaults_cover_credit_and_debit_categories() {
        let rows = default_rows(Table::Categories);
        assert!(rows.iter().any(|r| r.text("category_type") == Some("CR")));
        assert!(rows.iter().any(|r| r.text("category_type") == Some("DB")));
    }

    #[test]
    fn test_table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.name()), Some(table));
        }
    }
}
