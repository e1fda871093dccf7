use std::sync::Arc;

use flashreport_core::{
    new_id, BusinessUnit, BusinessUnitPatch, NewBusinessUnit, Query, Record, StorageBackend, Table,
};

use super::{fetch_all, fetch_one};
use crate::error::{RepositoryError, Result};

#[derive(Clone)]
pub struct BusinessUnitRepository {
    backend: Arc<dyn StorageBackend>,
}

impl BusinessUnitRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Active units ordered by `display_order`. With `include_inactive`,
    /// active units come first.
    pub fn get_all(&self, include_inactive: bool) -> Result<Vec<BusinessUnit>> {
        let query = if include_inactive {
            Query::new(Table::BusinessUnits)
                .order_desc("is_active")
                .order_asc("display_order")
        } else {
            Query::new(Table::BusinessUnits)
                .eq("is_active", true)
                .order_asc("display_order")
        };
        fetch_all(self.backend.as_ref(), &query)
    }

    pub fn get(&self, id: &str) -> Result<BusinessUnit> {
        fetch_one(self.backend.as_ref(), Query::new(Table::BusinessUnits).eq("id", id))?
            .ok_or_else(|| RepositoryError::not_found("business unit", id))
    }

    pub fn create(&self, unit: NewBusinessUnit) -> Result<BusinessUnit> {
        unit.validate().map_err(RepositoryError::Validation)?;
        let display_order = match unit.display_order {
            Some(order) => order,
            None => self.next_display_order()?,
        };
        let unit = BusinessUnit {
            id: new_id(),
            name: unit.name,
            color: unit.color,
            location: unit.location,
            display_order,
            is_active: true,
        };
        self.backend.insert(Table::BusinessUnits, unit.to_record())?;
        tracing::info!(id = %unit.id, name = %unit.name, "Business unit created");
        Ok(unit)
    }

    pub fn update(&self, id: &str, patch: BusinessUnitPatch) -> Result<BusinessUnit> {
        patch.validate().map_err(RepositoryError::Validation)?;
        self.backend.update(Table::BusinessUnits, id, patch.to_record())?;
        self.get(id)
    }

    pub fn soft_delete(&self, id: &str) -> Result<()> {
        self.backend.delete(Table::BusinessUnits, id)?;
        tracing::info!(id, "Business unit deactivated");
        Ok(())
    }

    pub fn reactivate(&self, id: &str) -> Result<()> {
        self.backend
            .update(Table::BusinessUnits, id, Record::new().with("is_active", true))?;
        tracing::info!(id, "Business unit reactivated");
        Ok(())
    }

    fn next_display_order(&self) -> Result<i64> {
        let last: Option<BusinessUnit> = fetch_one(
            self.backend.as_ref(),
            Query::new(Table::BusinessUnits).order_desc("display_order"),
        )?;
        Ok(last.map_or(1, |u| u.display_order + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_local::LocalStorage;

    fn repo() -> BusinessUnitRepository {
        BusinessUnitRepository::new(Arc::new(LocalStorage::in_memory().unwrap()))
    }

    #[test]
    fn test_create_appends_display_order() {
        let repo = repo();
        let unit = repo.create(NewBusinessUnit::new("North", "#00FF00")).unwrap();
        assert_eq!(unit.display_order, 2);
        let names: Vec<String> = repo.get_all(false).unwrap().iter().map(|u| u.name.to_string()).collect();
        assert_eq!(names, vec!["Main Store", "North"]);
    }

    #[test]
    fn test_inactive_units_sort_last() {
        let repo = repo();
        let north = repo.create(NewBusinessUnit::new("North", "#00FF00")).unwrap();
        repo.soft_delete("bu-main").unwrap();

        assert_eq!(repo.get_all(false).unwrap().len(), 1);
        let all = repo.get_all(true).unwrap();
        assert_eq!(all[0].id, north.id);
        assert!(!all[1].is_active);
    }

    #[test]
    fn test_update_rejects_blank_name() {
        let repo = repo();
        let patch = BusinessUnitPatch {
            name: Some(Arc::from("  ")),
            ..Default::default()
        };
        assert!(matches!(repo.update("bu-main", patch), Err(RepositoryError::Validation(_))));
        assert!(matches!(
            repo.update("missing", BusinessUnitPatch::default()),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
