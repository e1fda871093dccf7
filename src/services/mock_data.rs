use std::ops::RangeInclusive;

use flashreport_core::{CategoryType, MovementType, NewCashMovement};
use rand::Rng;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use time::{Duration, OffsetDateTime, Time};

use crate::{
    error::{RepositoryError, Result},
    repositories::Repositories,
};

#[derive(Debug, Clone)]
pub struct MockDataOptions {
    /// Trailing window, ending today.
    pub days: u32,
    pub mean: Decimal,
    pub spread: Decimal,
}

impl Default for MockDataOptions {
    fn default() -> Self {
        Self {
            days: 30,
            mean: Decimal::new(150_000, 2),
            spread: Decimal::new(50_000, 2),
        }
    }
}

/// Fills active units with one daily sales movement each. Test and demo
/// support only.
pub struct MockDataGenerator {
    repos: Repositories,
}

impl MockDataGenerator {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Returns the number of movements created.
    pub fn generate(&self, options: &MockDataOptions) -> Result<usize> {
        self.generate_with_rng(options, &mut rand::thread_rng(), OffsetDateTime::now_utc())
    }

    pub fn generate_with_rng<R: Rng>(
        &self,
        options: &MockDataOptions,
        rng: &mut R,
        now: OffsetDateTime,
    ) -> Result<usize> {
        let amounts = cents_range(options.mean, options.spread)?;
        let category = self
            .repos
            .categories
            .get_by_type(MovementType::Credit)?
            .into_iter()
            .min_by_key(|c| c.category_type != CategoryType::Credit)
            .ok_or_else(|| RepositoryError::Validation("no category accepts credit movements".to_string()))?;

        let mut created = 0;
        for unit in self.repos.business_units.get_all(false)? {
            let pos = self.repos.points_of_sale.ensure_default(&unit.id)?;
            for day in (0..options.days).rev() {
                let date = (now - Duration::days(i64::from(day))).replace_time(Time::MIDNIGHT) + Duration::hours(12);
                let mut movement = NewCashMovement::new(
                    &unit.id,
                    &category.id,
                    MovementType::Credit,
                    random_amount(rng, &amounts),
                    date,
                )
                .with_description("Daily sales");
                movement.point_of_sale_id = Some(pos.id.clone());
                self.repos.movements.create(movement)?;
                created += 1;
            }
        }
        tracing::info!(movements = created, days = options.days, "Mock data generated");
        Ok(created)
    }
}

/// `mean ± spread` in cents. Fails when either bound does not fit an `i64`.
fn cents_range(mean: Decimal, spread: Decimal) -> Result<RangeInclusive<i64>> {
    let out_of_range = || RepositoryError::Validation(format!("mock amount {} ± {} is out of range", mean, spread));
    let cents = |d: Decimal| d.round_dp(2).checked_mul(Decimal::ONE_HUNDRED).and_then(|c| c.to_i64());
    let mean = cents(mean).ok_or_else(out_of_range)?;
    let spread = cents(spread.abs()).ok_or_else(out_of_range)?;
    let low = mean.checked_sub(spread).ok_or_else(out_of_range)?;
    let high = mean.checked_add(spread).ok_or_else(out_of_range)?;
    Ok(low..=high)
}

/// Uniform over `cents`, never below 0.01.
fn random_amount<R: Rng>(rng: &mut R, cents: &RangeInclusive<i64>) -> Decimal {
    Decimal::new(rng.gen_range(cents.clone()).max(1), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_core::{DateRange, MovementFilter, StorageBackend};
    use flashreport_local::LocalStorage;
    use rand::{rngs::StdRng, SeedableRng};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use time::macros::datetime;

    #[test]
    fn test_amounts_stay_in_range_and_positive() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = cents_range(dec!(100), dec!(20)).unwrap();
        for _ in 0..500 {
            let amount = random_amount(&mut rng, &range);
            assert!(amount >= dec!(80) && amount <= dec!(120));
            assert!(amount.scale() <= 2);
        }
        let range = cents_range(dec!(0.5), dec!(10)).unwrap();
        for _ in 0..100 {
            assert!(random_amount(&mut rng, &range) >= dec!(0.01));
        }
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        assert!(matches!(cents_range(Decimal::MAX, dec!(1)), Err(RepositoryError::Validation(_))));
        let near_limit = Decimal::from(i64::MAX) / Decimal::ONE_HUNDRED;
        assert!(matches!(cents_range(near_limit, dec!(1)), Err(RepositoryError::Validation(_))));
        assert_eq!(cents_range(dec!(12.346), dec!(-0.5)).unwrap(), 1185..=1285);

        let repos = Repositories::new(Arc::new(LocalStorage::in_memory().unwrap()));
        let options = MockDataOptions {
            mean: Decimal::MAX,
            ..Default::default()
        };
        let result = MockDataGenerator::new(repos.clone()).generate(&options);
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
        assert!(repos.points_of_sale.list_by_unit("bu-main").unwrap().is_empty());
    }

    #[test]
    fn test_one_movement_per_day_per_unit() {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
        let repos = Repositories::new(backend);
        let generator = MockDataGenerator::new(repos.clone());
        let options = MockDataOptions {
            days: 7,
            ..Default::default()
        };
        let now = datetime!(2024-06-30 18:00 UTC);

        let created = generator
            .generate_with_rng(&options, &mut StdRng::seed_from_u64(1), now)
            .unwrap();
        assert_eq!(created, 7);

        let listed = repos.movements.list_all(&MovementFilter::for_unit("bu-main")).unwrap();
        assert_eq!(listed.len(), 7);
        assert!(listed.iter().all(|l| l.movement.point_of_sale_id.is_some()));
        assert_eq!(repos.points_of_sale.list_by_unit("bu-main").unwrap().len(), 1);

        let balance = repos.movements.get_balance("bu-main", DateRange::all()).unwrap();
        assert_eq!(balance.tickets, 7);
        assert_eq!(balance.debits, Decimal::ZERO);
    }
}
