use std::sync::Arc;

use flashreport_core::{
    new_id, MovementCategory, MovementType, NewCategory, Predicate, Query, StorageBackend, Table, Value,
};

use super::{fetch_all, fetch_one};
use crate::error::{RepositoryError, Result};

#[derive(Clone)]
pub struct CategoryRepository {
    backend: Arc<dyn StorageBackend>,
}

impl CategoryRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn get_all(&self) -> Result<Vec<MovementCategory>> {
        fetch_all(self.backend.as_ref(), &Query::new(Table::Categories).order_asc("code"))
    }

    pub fn get(&self, id: &str) -> Result<MovementCategory> {
        fetch_one(self.backend.as_ref(), Query::new(Table::Categories).eq("id", id))?
            .ok_or_else(|| RepositoryError::not_found("category", id))
    }

    pub fn get_by_code(&self, code: &str) -> Result<Option<MovementCategory>> {
        fetch_one(self.backend.as_ref(), Query::new(Table::Categories).eq("code", code))
    }

    /// Categories usable for `movement_type`: its own type or `BOTH`.
    pub fn get_by_type(&self, movement_type: MovementType) -> Result<Vec<MovementCategory>> {
        let codes = vec![Value::from(movement_type.code()), Value::from("BOTH")];
        let query = Query::new(Table::Categories)
            .filter("category_type", Predicate::In(codes))
            .order_asc("code");
        fetch_all(self.backend.as_ref(), &query)
    }

    pub fn create(&self, category: NewCategory) -> Result<MovementCategory> {
        category.validate().map_err(RepositoryError::Validation)?;
        let category = MovementCategory {
            id: new_id(),
            code: category.code,
            name: category.name,
            category_type: category.category_type,
            description: category.description,
        };
        self.backend.insert(Table::Categories, category.to_record())?;
        tracing::info!(code = %category.code, "Category created");
        Ok(category)
    }
}
