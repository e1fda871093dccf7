use std::sync::Arc;

use flashreport_core::{NewPartner, Partner};
use rust_decimal::Decimal;

use crate::{
    error::Result,
    repositories::{ConfigRepository, PartnerRepository},
};

/// Keeps exactly one active managing partner and the config key pointing at
/// it.
pub struct ManagingPartnerService {
    partners: PartnerRepository,
    config: ConfigRepository,
    default_id: String,
}

impl ManagingPartnerService {
    pub fn new(partners: PartnerRepository, config: ConfigRepository, default_id: &str) -> Self {
        Self {
            partners,
            config,
            default_id: default_id.to_string(),
        }
    }

    /// Resolves the managing partner, persists the choice and clears the flag
    /// on every other partner. Returns the chosen id.
    pub fn enforce(&self) -> Result<Arc<str>> {
        let partners = self.partners.get_all(true)?;
        let configured = self.config.managing_partner_id()?;

        let chosen = match configured
            .as_deref()
            .and_then(|id| partners.iter().find(|p| p.id.as_ref() == id && p.is_active))
        {
            Some(p) => p.id.clone(),
            None => {
                let fallback = self.fallback(&partners)?;
                tracing::warn!(
                    configured = configured.as_deref().unwrap_or(""),
                    chosen = %fallback,
                    "Configured managing partner is missing or inactive, using fallback"
                );
                fallback
            }
        };

        if configured.as_deref() != Some(chosen.as_ref()) {
            self.config.set_managing_partner_id(&chosen)?;
        }
        self.sweep(&partners, &chosen);
        tracing::info!(managing_partner = %chosen, "Managing partner enforced");
        Ok(chosen)
    }

    /// Canonical default if it exists, else the first active partner, else a
    /// newly created one.
    fn fallback(&self, partners: &[Partner]) -> Result<Arc<str>> {
        if let Some(p) = partners.iter().find(|p| p.id.as_ref() == self.default_id) {
            return Ok(p.id.clone());
        }
        if let Some(p) = partners.iter().find(|p| p.is_active) {
            return Ok(p.id.clone());
        }
        let mut partner = NewPartner::new("Managing Partner", Decimal::ONE_HUNDRED);
        partner.alias = Arc::from("Admin");
        partner.role = Arc::from("admin");
        let created = self.partners.create(partner)?;
        Ok(created.id)
    }

    fn sweep(&self, partners: &[Partner], chosen: &str) {
        for partner in partners {
            let is_chosen = partner.id.as_ref() == chosen;
            if partner.is_managing_partner != is_chosen {
                if let Err(e) = self.partners.set_managing_flag(&partner.id, is_chosen) {
                    tracing::warn!(partner = %partner.id, error = %e, "Failed to update managing flag");
                }
            }
            if is_chosen && !partner.is_active {
                if let Err(e) = self.partners.reactivate(&partner.id) {
                    tracing::warn!(partner = %partner.id, error = %e, "Failed to reactivate managing partner");
                }
            }
        }
        // A partner created by the fallback is not in `partners`.
        if !partners.iter().any(|p| p.id.as_ref() == chosen) {
            if let Err(e) = self.partners.set_managing_flag(chosen, true) {
                tracing::warn!(partner = chosen, error = %e, "Failed to flag new managing partner");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::Repositories;
    use flashreport_core::{schema, StorageBackend};
    use flashreport_local::LocalStorage;
    use rust_decimal_macros::dec;

    fn setup() -> (Repositories, ManagingPartnerService) {
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage::in_memory().unwrap());
        schema::seed(backend.as_ref()).unwrap();
        let repos = Repositories::new(backend);
        let service = ManagingPartnerService::new(
            repos.partners.clone(),
            repos.config.clone(),
            schema::DEFAULT_MANAGING_PARTNER_ID,
        );
        (repos, service)
    }

    fn managing(repos: &Repositories) -> Vec<Partner> {
        repos
            .partners
            .get_all(true)
            .unwrap()
            .into_iter()
            .filter(|p| p.is_managing_partner)
            .collect()
    }

    #[test]
    fn test_sweep_clears_extra_flags() {
        let (repos, service) = setup();
        let other = repos.partners.create(NewPartner::new("Ana", dec!(20))).unwrap();
        repos.partners.set_managing_flag(&other.id, true).unwrap();

        let chosen = service.enforce().unwrap();
        assert_eq!(chosen.as_ref(), schema::DEFAULT_MANAGING_PARTNER_ID);
        let flagged = managing(&repos);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, chosen);
    }

    #[test]
    fn test_inactive_configured_partner_falls_back_to_default() {
        let (repos, service) = setup();
        let other = repos.partners.create(NewPartner::new("Ana", dec!(20))).unwrap();
        repos.config.set_managing_partner_id(&other.id).unwrap();
        repos.partners.soft_delete(&other.id).unwrap();
        repos.partners.soft_delete(schema::DEFAULT_MANAGING_PARTNER_ID).unwrap();

        let chosen = service.enforce().unwrap();
        assert_eq!(chosen.as_ref(), schema::DEFAULT_MANAGING_PARTNER_ID);
        assert!(repos.partners.get(&chosen).unwrap().is_active);
        assert_eq!(repos.config.managing_partner_id().unwrap().as_deref(), Some(chosen.as_ref()));
    }

    #[test]
    fn test_enforce_is_idempotent() {
        let (repos, service) = setup();
        let first = service.enforce().unwrap();
        let second = service.enforce().unwrap();
        assert_eq!(first, second);
        assert_eq!(managing(&repos).len(), 1);
    }
}
