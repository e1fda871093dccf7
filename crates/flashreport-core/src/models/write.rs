use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::{CategoryType, MovementType, Record};

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

fn percentage_in_range(value: Decimal) -> Result<(), String> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(format!("participation percentage must be between 0 and 100, got {}", value));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBusinessUnit {
    pub name: Arc<str>,
    pub color: Arc<str>,
    pub location: Option<Arc<str>>,
    /// Appended after the last unit when not given.
    pub display_order: Option<i64>,
}

impl NewBusinessUnit {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: Arc::from(name),
            color: Arc::from(color),
            location: None,
            display_order: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        require("name", &self.name)?;
        require("color", &self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BusinessUnitPatch {
    pub name: Option<Arc<str>>,
    pub color: Option<Arc<str>>,
    pub location: Option<Option<Arc<str>>>,
    pub display_order: Option<i64>,
}

impl BusinessUnitPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(color) = &self.color {
            require("color", color)?;
        }
        Ok(())
    }

    pub fn to_record(&self) -> Record {
        let mut patch = Record::new();
        if let Some(name) = &self.name {
            patch.set("name", name);
        }
        if let Some(color) = &self.color {
            patch.set("color", color);
        }
        if let Some(location) = &self.location {
            patch.set("location", location.clone());
        }
        if let Some(order) = self.display_order {
            patch.set("display_order", order);
        }
        patch
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub code: Arc<str>,
    pub name: Arc<str>,
    pub category_type: CategoryType,
    pub description: Arc<str>,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), String> {
        require("code", &self.code)?;
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPartner {
    pub name: Arc<str>,
    pub alias: Arc<str>,
    pub participation_percentage: Decimal,
    pub role: Arc<str>,
}

impl NewPartner {
    pub fn new(name: &str, participation_percentage: Decimal) -> Self {
        Self {
            name: Arc::from(name),
            alias: Arc::from(name),
            participation_percentage,
            role: Arc::from("base"),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        require("name", &self.name)?;
        percentage_in_range(self.participation_percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartnerPatch {
    pub name: Option<Arc<str>>,
    pub alias: Option<Arc<str>>,
    pub participation_percentage: Option<Decimal>,
    pub role: Option<Arc<str>>,
}

impl PartnerPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(pct) = self.participation_percentage {
            percentage_in_range(pct)?;
        }
        Ok(())
    }

    pub fn to_record(&self) -> Record {
        let mut patch = Record::new();
        if let Some(name) = &self.name {
            patch.set("name", name);
        }
        if let Some(alias) = &self.alias {
            patch.set("alias", alias);
        }
        if let Some(pct) = self.participation_percentage {
            patch.set("participation_percentage", pct);
        }
        if let Some(role) = &self.role {
            patch.set("role", role);
        }
        patch
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCashMovement {
    pub business_unit_id: Arc<str>,
    pub category_id: Arc<str>,
    pub movement_type: MovementType,
    /// Magnitude only; the sign comes from `movement_type`.
    pub amount: Decimal,
    pub description: Arc<str>,
    pub transaction_date: OffsetDateTime,
    pub point_of_sale_id: Option<Arc<str>>,
    pub created_by: Option<Arc<str>>,
}

impl NewCashMovement {
    pub fn new(
        business_unit_id: &str,
        category_id: &str,
        movement_type: MovementType,
        amount: Decimal,
        transaction_date: OffsetDateTime,
    ) -> Self {
        Self {
            business_unit_id: Arc::from(business_unit_id),
            category_id: Arc::from(category_id),
            movement_type,
            amount,
            description: Arc::from(""),
            transaction_date,
            point_of_sale_id: None,
            created_by: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Arc::from(description);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        require("business unit", &self.business_unit_id)?;
        require("category", &self.category_id)?;
        if self.amount <= Decimal::ZERO {
            return Err(format!("amount must be positive, got {}", self.amount));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPartnerTransaction {
    pub partner_id: Arc<str>,
    /// Signed: positive credits the partner, negative debits.
    pub amount: Decimal,
    pub description: Arc<str>,
    pub transaction_date: OffsetDateTime,
}

impl NewPartnerTransaction {
    pub fn validate(&self) -> Result<(), String> {
        require("partner", &self.partner_id)?;
        if self.amount.is_zero() {
            return Err("amount must not be zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    #[test]
    fn test_movement_amount_must_be_positive() {
        let at = datetime!(2024-01-01 10:00 UTC);
        let ok = NewCashMovement::new("bu1", "cat-sales", MovementType::Credit, dec!(10), at);
        assert!(ok.validate().is_ok());
        let zero = NewCashMovement { amount: Decimal::ZERO, ..ok.clone() };
        assert!(zero.validate().is_err());
        let negative = NewCashMovement { amount: dec!(-5), ..ok.clone() };
        assert!(negative.validate().is_err());
        let no_unit = NewCashMovement { business_unit_id: Arc::from(" "), ..ok };
        assert!(no_unit.validate().unwrap_err().contains("business unit"));
    }

    #[test]
    fn test_partner_percentage_bounds() {
        assert!(NewPartner::new("Ana", dec!(100)).validate().is_ok());
        assert!(NewPartner::new("Ana", dec!(100.01)).validate().is_err());
        assert!(NewPartner::new("", dec!(10)).validate().is_err());
    }

    #[test]
    fn test_patch_only_carries_set_fields() {
        let patch = BusinessUnitPatch {
            display_order: Some(3),
            location: Some(None),
            ..Default::default()
        };
        let record = patch.to_record();
        assert!(!record.contains("name"));
        assert!(record.contains("location") && record.get("location").is_null());
        assert_eq!(record.int("display_order"), Some(3));
    }
}
