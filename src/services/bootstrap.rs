use std::sync::Arc;

use flashreport_core::{schema, StorageBackend};

use super::ManagingPartnerService;
use crate::repositories::Repositories;

/// Outcome of startup checks. Failures of individual steps land in
/// `warnings` instead of aborting startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    pub managing_partner_id: Option<Arc<str>>,
    pub seeded_rows: usize,
    pub warnings: Vec<String>,
}

pub struct AppInitializer {
    backend: Arc<dyn StorageBackend>,
    repos: Repositories,
    default_managing_partner_id: String,
}

impl AppInitializer {
    pub fn new(backend: Arc<dyn StorageBackend>, repos: Repositories, default_managing_partner_id: &str) -> Self {
        Self {
            backend,
            repos,
            default_managing_partner_id: default_managing_partner_id.to_string(),
        }
    }

    /// Seeds defaults, enforces the managing partner and checks that basic
    /// data exists.
    pub fn run(&self) -> InitReport {
        let mut report = InitReport::default();

        match schema::seed(self.backend.as_ref()) {
            Ok(rows) => {
                report.seeded_rows = rows;
                tracing::info!(rows, "Default data seeded");
            }
            Err(e) => report.warn(format!("seeding defaults failed: {}", e)),
        }

        let service = ManagingPartnerService::new(
            self.repos.partners.clone(),
            self.repos.config.clone(),
            &self.default_managing_partner_id,
        );
        match service.enforce() {
            Ok(id) => report.managing_partner_id = Some(id),
            Err(e) => report.warn(format!("managing partner check failed: {}", e)),
        }

        self.check_basic_data(&mut report);
        tracing::info!(warnings = report.warnings.len(), "Initialization finished");
        report
    }

    fn check_basic_data(&self, report: &mut InitReport) {
        match self.repos.business_units.get_all(true) {
            Ok(units) if units.is_empty() => report.warn("no business units exist".to_string()),
            Ok(_) => {}
            Err(e) => report.warn(format!("business units could not be read: {}", e)),
        }
        match self.repos.categories.get_all() {
            Ok(categories) if categories.is_empty() => report.warn("no categories exist".to_string()),
            Ok(_) => {}
            Err(e) => report.warn(format!("categories could not be read: {}", e)),
        }
    }
}

impl InitReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}
