use std::sync::Arc;

use flashreport_core::{
    new_id, NewPartner, Partner, PartnerAccount, PartnerPatch, Query, Record, StorageBackend, Table,
};
use rust_decimal::Decimal;

use super::{fetch_all, fetch_one, in_transaction};
use crate::error::{RepositoryError, Result};

#[derive(Clone)]
pub struct PartnerRepository {
    backend: Arc<dyn StorageBackend>,
}

impl PartnerRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn get_all(&self, include_inactive: bool) -> Result<Vec<Partner>> {
        let mut query = Query::new(Table::Partners);
        if !include_inactive {
            query = query.eq("is_active", true);
        }
        fetch_all(self.backend.as_ref(), &query.order_asc("name"))
    }

    pub fn get(&self, id: &str) -> Result<Partner> {
        fetch_one(self.backend.as_ref(), Query::new(Table::Partners).eq("id", id))?
            .ok_or_else(|| RepositoryError::not_found("partner", id))
    }

    /// Creates the partner together with its zero-balance account.
    pub fn create(&self, partner: NewPartner) -> Result<Partner> {
        partner.validate().map_err(RepositoryError::Validation)?;
        let partner = Partner {
            id: new_id(),
            name: partner.name,
            alias: partner.alias,
            participation_percentage: partner.participation_percentage,
            role: partner.role,
            is_managing_partner: false,
            is_active: true,
        };
        let account = PartnerAccount {
            id: new_id(),
            partner_id: partner.id.clone(),
            current_balance: Decimal::ZERO,
        };

        let backend = self.backend.as_ref();
        in_transaction(backend, || {
            backend.insert(Table::Partners, partner.to_record())?;
            backend.insert(Table::PartnerAccounts, account.to_record())?;
            Ok(())
        })?;
        tracing::info!(id = %partner.id, name = %partner.name, "Partner created");
        Ok(partner)
    }

    pub fn update(&self, id: &str, patch: PartnerPatch) -> Result<Partner> {
        patch.validate().map_err(RepositoryError::Validation)?;
        self.backend.update(Table::Partners, id, patch.to_record())?;
        self.get(id)
    }

    pub fn soft_delete(&self, id: &str) -> Result<()> {
        self.backend.delete(Table::Partners, id)?;
        tracing::info!(id, "Partner deactivated");
        Ok(())
    }

    pub fn reactivate(&self, id: &str) -> Result<()> {
        self.backend
            .update(Table::Partners, id, Record::new().with("is_active", true))?;
        tracing::info!(id, "Partner reactivated");
        Ok(())
    }

    /// Raw flag write. Uniqueness across partners is maintained by the
    /// managing partner sweep, not here.
    pub fn set_managing_flag(&self, id: &str, is_managing: bool) -> Result<()> {
        self.backend.update(
            Table::Partners,
            id,
            Record::new().with("is_managing_partner", is_managing),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_local::LocalStorage;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<dyn StorageBackend>, PartnerRepository) {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
        (backend.clone(), PartnerRepository::new(backend))
    }

    #[test]
    fn test_create_also_opens_account() {
        let (backend, repo) = setup();
        let partner = repo.create(NewPartner::new("Ana", dec!(40))).unwrap();
        let accounts: Vec<PartnerAccount> = fetch_all(
            backend.as_ref(),
            &Query::new(Table::PartnerAccounts).eq("partner_id", &partner.id),
        )
        .unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].current_balance, Decimal::ZERO);
        assert!(!partner.is_managing_partner);
    }

    #[test]
    fn test_participation_out_of_range_is_rejected() {
        let (_, repo) = setup();
        let err = repo.create(NewPartner::new("Ana", dec!(100.01))).unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        let patch = PartnerPatch {
            participation_percentage: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(matches!(
            repo.update("partner-managing", patch),
            Err(RepositoryError::Validation(_))
        ));
    }

    #[test]
    fn test_soft_delete_and_reactivate() {
        let (_, repo) = setup();
        let partner = repo.create(NewPartner::new("Ana", dec!(10))).unwrap();
        repo.soft_delete(&partner.id).unwrap();
        repo.soft_delete(&partner.id).unwrap();
        assert!(repo.get_all(false).unwrap().iter().all(|p| p.id != partner.id));
        assert!(!repo.get(&partner.id).unwrap().is_active);

        repo.reactivate(&partner.id).unwrap();
        assert!(repo.get_all(false).unwrap().iter().any(|p| p.id == partner.id));
    }
}
