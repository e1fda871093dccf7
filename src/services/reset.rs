use std::sync::Arc;

use flashreport_core::{schema, PartnerAccount, Query, Record, StorageBackend, Table};
use rust_decimal::Decimal;

use crate::{
    error::Result,
    repositories::{fetch_all, in_transaction},
};

/// Destructive bulk operations. Each runs in one backend transaction and is
/// rolled back on failure.
pub struct ResetService {
    backend: Arc<dyn StorageBackend>,
}

impl ResetService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Removes every cash movement and partner transaction and zeroes all
    /// partner balances. Units, categories and partners are kept.
    pub fn clear_movements(&self) -> Result<()> {
        in_transaction(self.backend.as_ref(), || self.purge_movements())?;
        tracing::info!("Movements cleared");
        Ok(())
    }

    /// Clears everything and restores the factory defaults.
    pub fn factory_reset(&self) -> Result<()> {
        let backend = self.backend.as_ref();
        in_transaction(backend, || {
            self.purge_movements()?;
            for table in Table::ALL {
                backend.purge(table)?;
            }
            schema::seed(backend)?;
            Ok(())
        })?;
        tracing::info!("Factory reset completed");
        Ok(())
    }

    fn purge_movements(&self) -> Result<()> {
        let backend = self.backend.as_ref();
        let movements = backend.purge(Table::CashMovements)?;
        let transactions = backend.purge(Table::PartnerAccountTransactions)?;
        let accounts: Vec<PartnerAccount> = fetch_all(backend, &Query::new(Table::PartnerAccounts))?;
        for account in &accounts {
            backend.update(
                Table::PartnerAccounts,
                &account.id,
                Record::new().with("current_balance", Decimal::ZERO),
            )?;
        }
        tracing::debug!(movements, transactions, accounts = accounts.len(), "Movement data purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::Repositories;
    use flashreport_core::{
        MovementType, NewBusinessUnit, NewCashMovement, NewPartnerTransaction, Rows, StorageError, TransactionId,
    };
    use flashreport_local::LocalStorage;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    /// Delegates to a local store but refuses to purge one table.
    struct FailingPurge {
        inner: LocalStorage,
        fail_on: Table,
    }

    impl StorageBackend for FailingPurge {
        fn insert(&self, table: Table, record: Record) -> std::result::Result<Record, StorageError> {
            self.inner.insert(table, record)
        }
        fn insert_if_absent(&self, table: Table, record: Record) -> std::result::Result<bool, StorageError> {
            self.inner.insert_if_absent(table, record)
        }
        fn upsert(&self, table: Table, record: Record) -> std::result::Result<Record, StorageError> {
            self.inner.upsert(table, record)
        }
        fn update(&self, table: Table, id: &str, patch: Record) -> std::result::Result<(), StorageError> {
            self.inner.update(table, id, patch)
        }
        fn query(&self, query: &Query) -> std::result::Result<Rows, StorageError> {
            self.inner.query(query)
        }
        fn delete(&self, table: Table, id: &str) -> std::result::Result<(), StorageError> {
            self.inner.delete(table, id)
        }
        fn purge(&self, table: Table) -> std::result::Result<u64, StorageError> {
            if table == self.fail_on {
                return Err(StorageError::Other("purge refused".to_string()));
            }
            self.inner.purge(table)
        }
        fn begin_transaction(&self) -> std::result::Result<TransactionId, StorageError> {
            self.inner.begin_transaction()
        }
        fn commit_transaction(&self, tx_id: TransactionId) -> std::result::Result<(), StorageError> {
            self.inner.commit_transaction(tx_id)
        }
        fn rollback_transaction(&self, tx_id: TransactionId) -> std::result::Result<(), StorageError> {
            self.inner.rollback_transaction(tx_id)
        }
    }

    fn populate(repos: &Repositories) {
        repos
            .movements
            .create(NewCashMovement::new(
                "bu-main",
                "cat-sales",
                MovementType::Credit,
                dec!(500),
                datetime!(2024-02-02 12:00 UTC),
            ))
            .unwrap();
        repos
            .partner_accounts
            .apply_transaction(NewPartnerTransaction {
                partner_id: Arc::from(schema::DEFAULT_MANAGING_PARTNER_ID),
                amount: dec!(75),
                description: Arc::from("advance"),
                transaction_date: datetime!(2024-02-03 12:00 UTC),
            })
            .unwrap();
    }

    #[test]
    fn test_clear_movements_keeps_reference_data() {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
        let repos = Repositories::new(backend.clone());
        let unit = repos.business_units.create(NewBusinessUnit::new("North", "#123456")).unwrap();
        populate(&repos);

        ResetService::new(backend.clone()).clear_movements().unwrap();

        assert_eq!(repos.movements.max_sequence("bu-main").unwrap(), 0);
        let account = repos.partner_accounts.get_by_partner(schema::DEFAULT_MANAGING_PARTNER_ID).unwrap();
        assert_eq!(account.current_balance, Decimal::ZERO);
        assert!(repos.partner_accounts.transactions(&account.id).unwrap().is_empty());
        assert!(repos.business_units.get(&unit.id).is_ok());
        assert!(repos.partners.get(schema::DEFAULT_MANAGING_PARTNER_ID).is_ok());
    }

    #[test]
    fn test_factory_reset_restores_defaults() {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
        let repos = Repositories::new(backend.clone());
        let unit = repos.business_units.create(NewBusinessUnit::new("North", "#123456")).unwrap();
        populate(&repos);

        ResetService::new(backend.clone()).factory_reset().unwrap();

        let units = repos.business_units.get_all(true).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id.as_ref(), schema::DEFAULT_BUSINESS_UNIT_ID);
        assert!(repos.business_units.get(&unit.id).is_err());
        assert_eq!(
            repos.config.managing_partner_id().unwrap().as_deref(),
            Some(schema::DEFAULT_MANAGING_PARTNER_ID)
        );
    }

    #[test]
    fn test_failed_reset_rolls_back() {
        let backend: Arc<dyn StorageBackend> = Arc::new(FailingPurge {
            inner: LocalStorage::in_memory().unwrap(),
            fail_on: Table::PartnerAccountTransactions,
        });
        let repos = Repositories::new(backend.clone());
        populate(&repos);

        assert!(ResetService::new(backend.clone()).clear_movements().is_err());
        assert_eq!(repos.movements.max_sequence("bu-main").unwrap(), 1);
        let account = repos.partner_accounts.get_by_partner(schema::DEFAULT_MANAGING_PARTNER_ID).unwrap();
        assert_eq!(account.current_balance, dec!(75));
    }
}
