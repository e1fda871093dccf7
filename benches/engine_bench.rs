use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flashreport::Repositories;
use flashreport_core::{DateRange, MovementFilter, MovementType, NewCashMovement, StorageBackend};
use flashreport_local::LocalStorage;
use rust_decimal_macros::dec;
use time::macros::{date, datetime};

fn setup(movements: usize) -> Repositories {
    let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
    let repos = Repositories::new(backend);
    for i in 0..movements {
        let (kind, category) = if i % 4 == 0 {
            (MovementType::Debit, "cat-supplies")
        } else {
            (MovementType::Credit, "cat-sales")
        };
        repos
            .movements
            .create(NewCashMovement::new(
                "bu-main",
                category,
                kind,
                dec!(125.50),
                datetime!(2024-03-15 12:00 UTC),
            ))
            .unwrap();
    }
    repos
}

fn bench_create_movement(c: &mut Criterion) {
    let repos = setup(500);
    c.bench_function("create_movement", |b| {
        b.iter(|| {
            repos
                .movements
                .create(black_box(NewCashMovement::new(
                    "bu-main",
                    "cat-sales",
                    MovementType::Credit,
                    dec!(10),
                    datetime!(2024-03-16 09:00 UTC),
                )))
                .unwrap()
        })
    });
}

fn bench_get_balance(c: &mut Criterion) {
    let repos = setup(1000);
    let march = DateRange::between(date!(2024 - 03 - 01), date!(2024 - 03 - 31));
    c.bench_function("get_balance_month", |b| {
        b.iter(|| repos.movements.get_balance(black_box("bu-main"), march).unwrap())
    });
}

fn bench_list_all(c: &mut Criterion) {
    let repos = setup(1000);
    let filter = MovementFilter::for_unit("bu-main");
    c.bench_function("list_all_with_joins", |b| {
        b.iter(|| repos.movements.list_all(black_box(&filter)).unwrap())
    });
}

criterion_group!(benches, bench_create_movement, bench_get_balance, bench_list_all);
criterion_main!(benches);
