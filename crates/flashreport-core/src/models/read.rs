use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use super::{entities::CashMovement, CategoryType, MovementType};

/// Inclusive calendar-date bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: Date, to: Date) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementFilter {
    pub business_unit_id: Option<Arc<str>>,
    /// `Some(true)` by default; `None` returns active and inactive rows.
    pub is_active: Option<bool>,
    pub movement_type: Option<MovementType>,
    pub category_id: Option<Arc<str>>,
    pub range: DateRange,
}

impl Default for MovementFilter {
    fn default() -> Self {
        Self {
            business_unit_id: None,
            is_active: Some(true),
            movement_type: None,
            category_id: None,
            range: DateRange::all(),
        }
    }
}

impl MovementFilter {
    pub fn for_unit(business_unit_id: &str) -> Self {
        Self {
            business_unit_id: Some(Arc::from(business_unit_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub code: Arc<str>,
    pub name: Arc<str>,
    pub category_type: CategoryType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessUnitSummary {
    pub name: Arc<str>,
    pub color: Arc<str>,
}

/// A movement with its left-joined category and business unit. Either side
/// is `None` when the reference does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementListing {
    pub movement: CashMovement,
    pub category: Option<CategorySummary>,
    pub business_unit: Option<BusinessUnitSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BalanceSummary {
    pub credits: Decimal,
    pub debits: Decimal,
    /// Number of credit movements.
    pub tickets: u64,
}

impl BalanceSummary {
    pub fn net(&self) -> Decimal {
        self.credits - self.debits
    }

    pub fn add(&mut self, movement: &CashMovement) {
        match movement.movement_type {
            MovementType::Credit => {
                self.credits += movement.amount;
                self.tickets += 1;
            }
            MovementType::Debit => self.debits += movement.amount,
        }
    }
}
