//! One repository per entity. Each holds the shared backend handle, builds
//! typed queries and maps rows back to domain structs.

mod business_unit;
mod category;
mod config;
mod movement;
mod partner;
mod partner_account;
mod point_of_sale;

use std::sync::Arc;

use flashreport_core::{Query, Record, StorageBackend, StorageError, Table};

pub use business_unit::BusinessUnitRepository;
pub use category::CategoryRepository;
pub use config::{ConfigRepository, BUSINESS_UNIT_NAME_KEY, MANAGING_PARTNER_ID_KEY, THEME_KEY};
pub use movement::CashMovementRepository;
pub use partner::PartnerRepository;
pub use partner_account::PartnerAccountRepository;
pub use point_of_sale::PointOfSaleRepository;

use crate::{error::Result, sequence::SequenceAllocator};

/// Every repository over one backend, sharing the sequence allocator.
///
/// Bundles that write movements to the same backend must share one
/// allocator: build the first with [`new`](Self::new), then clone it or pass
/// [`sequences`](Self::sequences) to [`with_sequences`](Self::with_sequences).
#[derive(Clone)]
pub struct Repositories {
    pub business_units: BusinessUnitRepository,
    pub categories: CategoryRepository,
    pub partners: PartnerRepository,
    pub partner_accounts: PartnerAccountRepository,
    pub movements: CashMovementRepository,
    pub points_of_sale: PointOfSaleRepository,
    pub config: ConfigRepository,
}

impl Repositories {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_sequences(backend, Arc::new(SequenceAllocator::new()))
    }

    pub fn with_sequences(backend: Arc<dyn StorageBackend>, sequences: Arc<SequenceAllocator>) -> Self {
        Self {
            business_units: BusinessUnitRepository::new(backend.clone()),
            categories: CategoryRepository::new(backend.clone()),
            partners: PartnerRepository::new(backend.clone()),
            partner_accounts: PartnerAccountRepository::new(backend.clone()),
            movements: CashMovementRepository::new(backend.clone(), sequences),
            points_of_sale: PointOfSaleRepository::new(backend.clone()),
            config: ConfigRepository::new(backend),
        }
    }

    pub fn sequences(&self) -> Arc<SequenceAllocator> {
        self.movements.sequences()
    }
}

/// Maps a stored row, or logs and skips it when it cannot be read.
pub(crate) fn readable<T>(table: Table, record: &Record) -> Option<T>
where
    T: for<'a> TryFrom<&'a Record, Error = StorageError>,
{
    match T::try_from(record) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(table = %table, id = record.text("id").unwrap_or("?"), error = %e, "Skipping unreadable row");
            None
        }
    }
}

/// Every readable row matching `query`. Unreadable rows are skipped.
pub(crate) fn fetch_all<T>(backend: &dyn StorageBackend, query: &Query) -> Result<Vec<T>>
where
    T: for<'a> TryFrom<&'a Record, Error = StorageError>,
{
    Ok(backend
        .query(query)?
        .filter_map(|row| readable(query.table, &row.record))
        .collect())
}

pub(crate) fn fetch_one<T>(backend: &dyn StorageBackend, query: Query) -> Result<Option<T>>
where
    T: for<'a> TryFrom<&'a Record, Error = StorageError>,
{
    match backend.query(&query.limit(1))?.next() {
        Some(row) => Ok(Some(T::try_from(&row.record)?)),
        None => Ok(None),
    }
}

/// Runs `f` inside a backend transaction, committing on success and rolling
/// back on error.
pub(crate) fn in_transaction<T>(backend: &dyn StorageBackend, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let tx_id = backend.begin_transaction()?;
    match f() {
        Ok(value) => {
            backend.commit_transaction(tx_id)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = backend.rollback_transaction(tx_id) {
                tracing::warn!(tx_id, error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}
