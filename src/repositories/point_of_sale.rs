use std::sync::Arc;

use flashreport_core::{new_id, BusinessUnit, PointOfSale, Query, StorageBackend, Table};

use super::{fetch_all, fetch_one};
use crate::error::{RepositoryError, Result};

#[derive(Clone)]
pub struct PointOfSaleRepository {
    backend: Arc<dyn StorageBackend>,
}

impl PointOfSaleRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Active points of sale of one unit.
    pub fn list_by_unit(&self, business_unit_id: &str) -> Result<Vec<PointOfSale>> {
        let query = Query::new(Table::PointsOfSale)
            .eq("business_unit_id", business_unit_id)
            .eq("is_active", true)
            .order_asc("name");
        fetch_all(self.backend.as_ref(), &query)
    }

    /// Returns the unit's first active point of sale, creating one if it has
    /// none.
    pub fn ensure_default(&self, business_unit_id: &str) -> Result<PointOfSale> {
        if let Some(existing) = self.list_by_unit(business_unit_id)?.into_iter().next() {
            return Ok(existing);
        }

        let unit: BusinessUnit = fetch_one(
            self.backend.as_ref(),
            Query::new(Table::BusinessUnits).eq("id", business_unit_id),
        )?
        .ok_or_else(|| RepositoryError::not_found("business unit", business_unit_id))?;

        let pos = PointOfSale {
            id: new_id(),
            business_unit_id: unit.id.clone(),
            name: Arc::from(format!("{} POS 1", unit.name).as_str()),
            fiscal_id: Arc::from(""),
            is_active: true,
        };
        self.backend.insert(Table::PointsOfSale, pos.to_record())?;
        tracing::info!(business_unit = %unit.id, id = %pos.id, "Default point of sale created");
        Ok(pos)
    }
}
