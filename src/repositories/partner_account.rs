use std::sync::{Arc, Mutex};

use flashreport_core::{
    new_id, NewPartnerTransaction, PartnerAccount, PartnerAccountTransaction, Query, Record, StorageBackend,
    Table,
};
use time::OffsetDateTime;

use super::{fetch_all, fetch_one, in_transaction};
use crate::error::{RepositoryError, Result};

#[derive(Clone)]
pub struct PartnerAccountRepository {
    backend: Arc<dyn StorageBackend>,
    // Serializes balance read-modify-write.
    balance_lock: Arc<Mutex<()>>,
}

impl PartnerAccountRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            balance_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn get_by_partner(&self, partner_id: &str) -> Result<PartnerAccount> {
        fetch_one(
            self.backend.as_ref(),
            Query::new(Table::PartnerAccounts).eq("partner_id", partner_id),
        )?
        .ok_or_else(|| RepositoryError::not_found("partner account", partner_id))
    }

    /// Records the transaction and moves the account balance by its signed
    /// amount, both in one backend transaction.
    pub fn apply_transaction(&self, tx: NewPartnerTransaction) -> Result<PartnerAccountTransaction> {
        tx.validate().map_err(RepositoryError::Validation)?;
        let _guard = self.balance_lock.lock().unwrap();
        let account = self.get_by_partner(&tx.partner_id)?;

        let entry = PartnerAccountTransaction {
            id: new_id(),
            partner_account_id: account.id.clone(),
            amount: tx.amount,
            description: tx.description,
            transaction_date: tx.transaction_date,
            created_at: OffsetDateTime::now_utc(),
        };
        let balance = account.current_balance + entry.amount;

        let backend = self.backend.as_ref();
        in_transaction(backend, || {
            backend.insert(Table::PartnerAccountTransactions, entry.to_record())?;
            backend.update(
                Table::PartnerAccounts,
                &account.id,
                Record::new().with("current_balance", balance),
            )?;
            Ok(())
        })?;
        tracing::info!(account = %account.id, amount = %entry.amount, %balance, "Partner transaction applied");
        Ok(entry)
    }

    /// Newest first.
    pub fn transactions(&self, partner_account_id: &str) -> Result<Vec<PartnerAccountTransaction>> {
        let query = Query::new(Table::PartnerAccountTransactions)
            .eq("partner_account_id", partner_account_id)
            .order_desc("transaction_date")
            .order_desc("created_at");
        fetch_all(self.backend.as_ref(), &query)
    }
}
