//! Typed domain entities and their mapping to and from storage records.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use super::{CategoryType, MovementType, Record};
use crate::storage::StorageError;

fn text(r: &Record, entity: &str, column: &str) -> Result<Arc<str>, StorageError> {
    r.text(column)
        .map(Arc::from)
        .ok_or_else(|| missing(entity, column))
}

fn opt_text(r: &Record, column: &str) -> Option<Arc<str>> {
    r.text(column).map(Arc::from)
}

fn flag(r: &Record, entity: &str, column: &str) -> Result<bool, StorageError> {
    r.bool(column).ok_or_else(|| missing(entity, column))
}

fn money(r: &Record, entity: &str, column: &str) -> Result<Decimal, StorageError> {
    r.money(column).ok_or_else(|| missing(entity, column))
}

fn timestamp(r: &Record, entity: &str, column: &str) -> Result<OffsetDateTime, StorageError> {
    r.timestamp(column).ok_or_else(|| missing(entity, column))
}

fn missing(entity: &str, column: &str) -> StorageError {
    StorageError::Serialization(format!("{} is missing {}", entity, column))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessUnit {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub color: Arc<str>,
    pub location: Option<Arc<str>>,
    pub display_order: i64,
    pub is_active: bool,
}

impl BusinessUnit {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("name", &self.name)
            .with("color", &self.color)
            .with("location", self.location.clone())
            .with("display_order", self.display_order)
            .with("is_active", self.is_active)
    }
}

impl TryFrom<&Record> for BusinessUnit {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            id: text(r, "business unit", "id")?,
            name: text(r, "business unit", "name")?,
            color: text(r, "business unit", "color")?,
            location: opt_text(r, "location"),
            display_order: r.int("display_order").unwrap_or_default(),
            is_active: flag(r, "business unit", "is_active")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementCategory {
    pub id: Arc<str>,
    pub code: Arc<str>,
    pub name: Arc<str>,
    pub category_type: CategoryType,
    pub description: Arc<str>,
}

impl MovementCategory {
    pub fn accepts(&self, movement_type: MovementType) -> bool {
        self.category_type.accepts(movement_type)
    }

    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("code", &self.code)
            .with("name", &self.name)
            .with("category_type", self.category_type.code())
            .with("description", &self.description)
    }
}

impl TryFrom<&Record> for MovementCategory {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        let category_type = text(r, "category", "category_type")?
            .parse::<CategoryType>()
            .map_err(StorageError::Serialization)?;
        Ok(Self {
            id: text(r, "category", "id")?,
            code: text(r, "category", "code")?,
            name: text(r, "category", "name")?,
            category_type,
            description: opt_text(r, "description").unwrap_or_else(|| Arc::from("")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerRole {
    Admin,
    Base,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partner {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub alias: Arc<str>,
    pub participation_percentage: Decimal,
    pub role: Arc<str>,
    pub is_managing_partner: bool,
    pub is_active: bool,
}

impl Partner {
    /// Role text is free-form; it is compared case-insensitively.
    pub fn role_kind(&self) -> PartnerRole {
        let role = self.role.trim();
        if role.eq_ignore_ascii_case("admin") {
            PartnerRole::Admin
        } else if role.eq_ignore_ascii_case("base") {
            PartnerRole::Base
        } else {
            PartnerRole::Other
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role_kind() == PartnerRole::Admin
    }

    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("name", &self.name)
            .with("alias", &self.alias)
            .with("participation_percentage", self.participation_percentage)
            .with("role", &self.role)
            .with("is_managing_partner", self.is_managing_partner)
            .with("is_active", self.is_active)
    }
}

impl TryFrom<&Record> for Partner {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            id: text(r, "partner", "id")?,
            name: text(r, "partner", "name")?,
            alias: opt_text(r, "alias").unwrap_or_else(|| Arc::from("")),
            participation_percentage: r.money("participation_percentage").unwrap_or_default(),
            role: opt_text(r, "role").unwrap_or_else(|| Arc::from("")),
            is_managing_partner: r.bool("is_managing_partner").unwrap_or(false),
            is_active: flag(r, "partner", "is_active")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerAccount {
    pub id: Arc<str>,
    pub partner_id: Arc<str>,
    pub current_balance: Decimal,
}

impl PartnerAccount {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("partner_id", &self.partner_id)
            .with("current_balance", self.current_balance)
    }
}

impl TryFrom<&Record> for PartnerAccount {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            id: text(r, "partner account", "id")?,
            partner_id: text(r, "partner account", "partner_id")?,
            current_balance: money(r, "partner account", "current_balance")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerAccountTransaction {
    pub id: Arc<str>,
    pub partner_account_id: Arc<str>,
    pub amount: Decimal,
    pub description: Arc<str>,
    #[serde(with = "time::serde::rfc3339")]
    pub transaction_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PartnerAccountTransaction {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("partner_account_id", &self.partner_account_id)
            .with("amount", self.amount)
            .with("description", &self.description)
            .with("transaction_date", self.transaction_date)
            .with("created_at", self.created_at)
    }
}

impl TryFrom<&Record> for PartnerAccountTransaction {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        let entity = "partner account transaction";
        Ok(Self {
            id: text(r, entity, "id")?,
            partner_account_id: text(r, entity, "partner_account_id")?,
            amount: money(r, entity, "amount")?,
            description: opt_text(r, "description").unwrap_or_else(|| Arc::from("")),
            transaction_date: timestamp(r, entity, "transaction_date")?,
            created_at: timestamp(r, entity, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashMovement {
    pub id: Arc<str>,
    pub business_unit_id: Arc<str>,
    pub category_id: Arc<str>,
    pub movement_type: MovementType,
    pub amount: Decimal,
    pub description: Arc<str>,
    #[serde(with = "time::serde::rfc3339")]
    pub transaction_date: OffsetDateTime,
    pub sequence_number: i64,
    pub point_of_sale_id: Option<Arc<str>>,
    pub created_by: Option<Arc<str>>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl CashMovement {
    pub fn is_credit(&self) -> bool {
        self.movement_type == MovementType::Credit
    }

    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("business_unit_id", &self.business_unit_id)
            .with("category_id", &self.category_id)
            .with("movement_type", self.movement_type.code())
            .with("amount", self.amount)
            .with("description", &self.description)
            .with("transaction_date", self.transaction_date)
            .with("sequence_number", self.sequence_number)
            .with("point_of_sale_id", self.point_of_sale_id.clone())
            .with("created_by", self.created_by.clone())
            .with("is_active", self.is_active)
            .with("created_at", self.created_at)
    }
}

impl TryFrom<&Record> for CashMovement {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        let entity = "cash movement";
        let movement_type = text(r, entity, "movement_type")?
            .parse::<MovementType>()
            .map_err(StorageError::Serialization)?;
        Ok(Self {
            id: text(r, entity, "id")?,
            business_unit_id: text(r, entity, "business_unit_id")?,
            category_id: text(r, entity, "category_id")?,
            movement_type,
            amount: money(r, entity, "amount")?,
            description: opt_text(r, "description").unwrap_or_else(|| Arc::from("")),
            transaction_date: timestamp(r, entity, "transaction_date")?,
            sequence_number: r
                .int("sequence_number")
                .ok_or_else(|| missing(entity, "sequence_number"))?,
            point_of_sale_id: opt_text(r, "point_of_sale_id"),
            created_by: opt_text(r, "created_by"),
            is_active: flag(r, entity, "is_active")?,
            created_at: timestamp(r, entity, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointOfSale {
    pub id: Arc<str>,
    pub business_unit_id: Arc<str>,
    pub name: Arc<str>,
    pub fiscal_id: Arc<str>,
    pub is_active: bool,
}

impl PointOfSale {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id", &self.id)
            .with("business_unit_id", &self.business_unit_id)
            .with("name", &self.name)
            .with("fiscal_id", &self.fiscal_id)
            .with("is_active", self.is_active)
    }
}

impl TryFrom<&Record> for PointOfSale {
    type Error = StorageError;

    fn try_from(r: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            id: text(r, "point of sale", "id")?,
            business_unit_id: text(r, "point of sale", "business_unit_id")?,
            name: text(r, "point of sale", "name")?,
            fiscal_id: opt_text(r, "fiscal_id").unwrap_or_else(|| Arc::from("")),
            is_active: flag(r, "point of sale", "is_active")?,
        })
    }
}
