use std::sync::Arc;

use flashreport_core::{
    models::read::{BusinessUnitSummary, CategorySummary},
    new_id, BalanceSummary, BusinessUnit, CashMovement, DateRange, MovementCategory, MovementFilter,
    MovementListing, NewCashMovement, Predicate, Query, Row, StorageBackend, Table,
};
use time::OffsetDateTime;

use super::{fetch_all, fetch_one, readable};
use crate::{
    error::{RepositoryError, Result},
    sequence::SequenceAllocator,
};

#[derive(Clone)]
pub struct CashMovementRepository {
    backend: Arc<dyn StorageBackend>,
    sequences: Arc<SequenceAllocator>,
}

fn apply_range(mut query: Query, range: &DateRange) -> Query {
    if let Some(from) = range.from {
        query = query.filter("transaction_date", Predicate::OnOrAfterDate(from));
    }
    if let Some(to) = range.to {
        query = query.filter("transaction_date", Predicate::OnOrBeforeDate(to));
    }
    query
}

/// `None` when the movement row itself cannot be read. A joined row that
/// cannot be read is treated as unresolved.
fn listing(row: &Row) -> Option<MovementListing> {
    let movement: CashMovement = readable(Table::CashMovements, &row.record)?;
    let category = row
        .joined("category")
        .and_then(|r| readable::<MovementCategory>(Table::Categories, r))
        .map(|c| CategorySummary {
            code: c.code,
            name: c.name,
            category_type: c.category_type,
        });
    let business_unit = row
        .joined("business_unit")
        .and_then(|r| readable::<BusinessUnit>(Table::BusinessUnits, r))
        .map(|u| BusinessUnitSummary {
            name: u.name,
            color: u.color,
        });
    Some(MovementListing {
        movement,
        category,
        business_unit,
    })
}

impl CashMovementRepository {
    pub fn new(backend: Arc<dyn StorageBackend>, sequences: Arc<SequenceAllocator>) -> Self {
        Self { backend, sequences }
    }

    pub fn sequences(&self) -> Arc<SequenceAllocator> {
        self.sequences.clone()
    }

    /// Validates the movement, then assigns the next sequence number of its
    /// business unit and stores it as active.
    pub fn create(&self, movement: NewCashMovement) -> Result<CashMovement> {
        movement.validate().map_err(RepositoryError::Validation)?;
        self.check_references(&movement)?;

        let unit_id = movement.business_unit_id.clone();
        let created = self.sequences.with_unit(&unit_id, || -> Result<CashMovement> {
            let sequence_number = self.max_sequence(&unit_id)? + 1;
            let created = CashMovement {
                id: new_id(),
                business_unit_id: movement.business_unit_id,
                category_id: movement.category_id,
                movement_type: movement.movement_type,
                amount: movement.amount,
                description: movement.description,
                transaction_date: movement.transaction_date,
                sequence_number,
                point_of_sale_id: movement.point_of_sale_id,
                created_by: movement.created_by,
                is_active: true,
                created_at: OffsetDateTime::now_utc(),
            };
            self.backend.insert(Table::CashMovements, created.to_record())?;
            Ok(created)
        })?;

        tracing::debug!(
            id = %created.id,
            business_unit = %created.business_unit_id,
            sequence = created.sequence_number,
            "Cash movement created"
        );
        Ok(created)
    }

    fn check_references(&self, movement: &NewCashMovement) -> Result<()> {
        let unit: Option<BusinessUnit> = fetch_one(
            self.backend.as_ref(),
            Query::new(Table::BusinessUnits).eq("id", &movement.business_unit_id),
        )?;
        if unit.is_none() {
            return Err(RepositoryError::Validation(format!(
                "unknown business unit {}",
                movement.business_unit_id
            )));
        }

        let category: Option<MovementCategory> = fetch_one(
            self.backend.as_ref(),
            Query::new(Table::Categories).eq("id", &movement.category_id),
        )?;
        match category {
            None => Err(RepositoryError::Validation(format!(
                "unknown category {}",
                movement.category_id
            ))),
            Some(c) if !c.accepts(movement.movement_type) => Err(RepositoryError::Validation(format!(
                "category {} ({}) does not accept {} movements",
                c.code, c.category_type, movement.movement_type
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn get(&self, id: &str) -> Result<CashMovement> {
        fetch_one(self.backend.as_ref(), Query::new(Table::CashMovements).eq("id", id))?
            .ok_or_else(|| RepositoryError::not_found("cash movement", id))
    }

    /// Movements matching `filter`, newest first, with their category and
    /// business unit left-joined. Rows that cannot be read are skipped.
    pub fn list_all(&self, filter: &MovementFilter) -> Result<Vec<MovementListing>> {
        let mut query = Query::new(Table::CashMovements);
        if let Some(unit) = &filter.business_unit_id {
            query = query.eq("business_unit_id", unit);
        }
        if let Some(active) = filter.is_active {
            query = query.eq("is_active", active);
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.eq("movement_type", movement_type.code());
        }
        if let Some(category) = &filter.category_id {
            query = query.eq("category_id", category);
        }
        let query = apply_range(query, &filter.range)
            .left_join(Table::Categories, "category_id", "category")
            .left_join(Table::BusinessUnits, "business_unit_id", "business_unit")
            .order_desc("transaction_date")
            .order_desc("sequence_number");

        Ok(self.backend.query(&query)?.filter_map(|row| listing(&row)).collect())
    }

    /// Totals over the active movements of one unit whose transaction date
    /// falls in `range`. Category and unit references are not resolved.
    pub fn get_balance(&self, business_unit_id: &str, range: DateRange) -> Result<BalanceSummary> {
        let query = Query::new(Table::CashMovements)
            .eq("business_unit_id", business_unit_id)
            .eq("is_active", true);
        let movements: Vec<CashMovement> = fetch_all(self.backend.as_ref(), &apply_range(query, &range))?;

        let mut summary = BalanceSummary::default();
        for movement in &movements {
            summary.add(movement);
        }
        Ok(summary)
    }

    /// Deactivation is terminal; repeating it is a no-op.
    pub fn soft_delete(&self, id: &str) -> Result<()> {
        self.backend.delete(Table::CashMovements, id)?;
        tracing::info!(id, "Cash movement deactivated");
        Ok(())
    }

    /// Highest sequence number ever assigned in the unit, active or not.
    /// Zero when the unit has no movements.
    pub fn max_sequence(&self, business_unit_id: &str) -> Result<i64> {
        let query = Query::new(Table::CashMovements)
            .eq("business_unit_id", business_unit_id)
            .order_desc("sequence_number")
            .limit(1);
        Ok(self
            .backend
            .query(&query)?
            .next()
            .and_then(|row| row.record.int("sequence_number"))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_core::MovementType;
    use flashreport_local::LocalStorage;
    use rust_decimal_macros::dec;
    use time::macros::{date, datetime};

    fn repo() -> CashMovementRepository {
        CashMovementRepository::new(
            Arc::new(LocalStorage::in_memory().unwrap()),
            Arc::new(SequenceAllocator::new()),
        )
    }

    fn sale(amount: rust_decimal::Decimal) -> NewCashMovement {
        NewCashMovement::new(
            "bu-main",
            "cat-sales",
            MovementType::Credit,
            amount,
            datetime!(2024-03-15 10:30 -03:00),
        )
    }

    #[test]
    fn test_sequence_numbers_are_consecutive() {
        let repo = repo();
        let numbers: Vec<i64> = (0..5)
            .map(|_| repo.create(sale(dec!(10))).unwrap().sequence_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_deleted_movement_keeps_its_sequence_taken() {
        let repo = repo();
        let first = repo.create(sale(dec!(10))).unwrap();
        repo.soft_delete(&first.id).unwrap();
        assert_eq!(repo.max_sequence("bu-main").unwrap(), 1);
        assert_eq!(repo.create(sale(dec!(10))).unwrap().sequence_number, 2);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let repo = repo();
        assert!(matches!(repo.create(sale(dec!(0))), Err(RepositoryError::Validation(_))));

        let mut unknown_unit = sale(dec!(10));
        unknown_unit.business_unit_id = Arc::from("bu-ghost");
        assert!(matches!(repo.create(unknown_unit), Err(RepositoryError::Validation(_))));

        let wrong_type = NewCashMovement::new(
            "bu-main",
            "cat-supplies",
            MovementType::Credit,
            dec!(10),
            datetime!(2024-03-15 10:30 UTC),
        );
        assert!(matches!(repo.create(wrong_type), Err(RepositoryError::Validation(_))));
        assert_eq!(repo.max_sequence("bu-main").unwrap(), 0);
    }

    #[test]
    fn test_list_all_orders_newest_first() {
        let repo = repo();
        let mut older = sale(dec!(1));
        older.transaction_date = datetime!(2024-03-01 09:00 UTC);
        repo.create(older).unwrap();
        repo.create(sale(dec!(2))).unwrap();
        repo.create(sale(dec!(3))).unwrap();

        let listed = repo.list_all(&MovementFilter::for_unit("bu-main")).unwrap();
        let amounts: Vec<_> = listed.iter().map(|l| l.movement.amount).collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2), dec!(1)]);
        assert_eq!(listed[0].category.as_ref().map(|c| c.code.as_ref()), Some("VTA"));
        assert_eq!(listed[0].business_unit.as_ref().map(|u| u.name.as_ref()), Some("Main Store"));
    }

    #[test]
    fn test_balance_respects_range() {
        let repo = repo();
        repo.create(sale(dec!(100))).unwrap();
        let march = DateRange::between(date!(2024 - 03 - 01), date!(2024 - 03 - 31));
        let april = DateRange::between(date!(2024 - 04 - 01), date!(2024 - 04 - 30));
        assert_eq!(repo.get_balance("bu-main", march).unwrap().credits, dec!(100));
        assert_eq!(repo.get_balance("bu-main", april).unwrap(), BalanceSummary::default());
    }
}
