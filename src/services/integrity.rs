use std::sync::Arc;

use flashreport_core::{
    BusinessUnit, CashMovement, CategoryType, MovementCategory, MovementType, Query, StorageBackend, Table,
};

use crate::error::{RepositoryError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DanglingReference {
    pub movement_id: Arc<str>,
    pub column: &'static str,
    pub target_id: Arc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeMismatch {
    pub movement_id: Arc<str>,
    pub category_id: Arc<str>,
    pub movement_type: MovementType,
    pub category_type: CategoryType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub movements_scanned: usize,
    pub dangling_references: Vec<DanglingReference>,
    pub type_mismatches: Vec<TypeMismatch>,
    /// Ids of stored movements that could not be read at all.
    pub unreadable: Vec<Arc<str>>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_references.is_empty() && self.type_mismatches.is_empty() && self.unreadable.is_empty()
    }
}

/// Finds movements whose category or business unit does not resolve, and
/// movements whose type the category does not accept. Reports only.
pub struct IntegrityService {
    backend: Arc<dyn StorageBackend>,
}

impl IntegrityService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn scan(&self) -> Result<IntegrityReport> {
        let query = Query::new(Table::CashMovements)
            .left_join(Table::Categories, "category_id", "category")
            .left_join(Table::BusinessUnits, "business_unit_id", "business_unit")
            .order_asc("business_unit_id")
            .order_asc("sequence_number");

        let mut report = IntegrityReport::default();
        for row in self.backend.query(&query)? {
            let movement = match CashMovement::try_from(&row.record) {
                Ok(movement) => movement,
                Err(e) => {
                    let id = row.record.text("id").unwrap_or_default();
                    tracing::warn!(movement = id, error = %e, "Unreadable movement");
                    report.unreadable.push(Arc::from(id));
                    continue;
                }
            };
            report.movements_scanned += 1;

            if row.joined("business_unit").and_then(|r| BusinessUnit::try_from(r).ok()).is_none() {
                report.dangling_references.push(DanglingReference {
                    movement_id: movement.id.clone(),
                    column: "business_unit_id",
                    target_id: movement.business_unit_id.clone(),
                });
            }

            match row.joined("category").and_then(|r| MovementCategory::try_from(r).ok()) {
                None => report.dangling_references.push(DanglingReference {
                    movement_id: movement.id.clone(),
                    column: "category_id",
                    target_id: movement.category_id.clone(),
                }),
                Some(category) if !category.accepts(movement.movement_type) => {
                    report.type_mismatches.push(TypeMismatch {
                        movement_id: movement.id.clone(),
                        category_id: category.id,
                        movement_type: movement.movement_type,
                        category_type: category.category_type,
                    })
                }
                Some(_) => {}
            }
        }

        for dangling in &report.dangling_references {
            tracing::warn!(
                movement = %dangling.movement_id,
                column = dangling.column,
                target = %dangling.target_id,
                "Dangling reference"
            );
        }
        for mismatch in &report.type_mismatches {
            tracing::warn!(
                movement = %mismatch.movement_id,
                category = %mismatch.category_id,
                "Movement type {} not accepted by category type {}",
                mismatch.movement_type,
                mismatch.category_type
            );
        }
        Ok(report)
    }

    /// Strict variant of [`scan`](Self::scan): fails on the first dangling
    /// reference.
    pub fn verify(&self) -> Result<()> {
        let report = self.scan()?;
        match report.dangling_references.into_iter().next() {
            Some(d) => Err(RepositoryError::DanglingReference {
                entity: "cash movement",
                id: d.movement_id.to_string(),
                target: if d.column == "category_id" { "category" } else { "business unit" },
                target_id: d.target_id.to_string(),
            }),
            None => Ok(()),
        }
    }
}
