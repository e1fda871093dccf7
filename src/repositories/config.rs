use std::sync::Arc;

use flashreport_core::{Query, Record, StorageBackend, StorageError, Table};

use crate::error::Result;

pub const BUSINESS_UNIT_NAME_KEY: &str = "business_unit_name";
pub const MANAGING_PARTNER_ID_KEY: &str = "managing_partner_id";
pub const THEME_KEY: &str = "theme";

const DEFAULT_BUSINESS_UNIT_NAME: &str = "Flash Report";
const DEFAULT_THEME: &str = "light";

/// String key-value settings stored in `app_config`.
#[derive(Clone)]
pub struct ConfigRepository {
    backend: Arc<dyn StorageBackend>,
}

impl ConfigRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn get_optional(&self, key: &str) -> Result<Option<String>> {
        let row = self
            .backend
            .query(&Query::new(Table::AppConfig).eq("key", key).limit(1))?
            .next();
        Ok(row.and_then(|r| r.record.text("value").map(str::to_string)))
    }

    pub fn get(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get_optional(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.backend
            .upsert(Table::AppConfig, Record::new().with("key", key).with("value", value))?;
        tracing::debug!(key, value, "Config value set");
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        match self.backend.delete(Table::AppConfig, key) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn business_unit_name(&self) -> Result<String> {
        self.get(BUSINESS_UNIT_NAME_KEY, DEFAULT_BUSINESS_UNIT_NAME)
    }

    /// `None` when unset or blank.
    pub fn managing_partner_id(&self) -> Result<Option<String>> {
        Ok(self
            .get_optional(MANAGING_PARTNER_ID_KEY)?
            .filter(|id| !id.trim().is_empty()))
    }

    pub fn set_managing_partner_id(&self, partner_id: &str) -> Result<()> {
        self.set(MANAGING_PARTNER_ID_KEY, partner_id)
    }

    pub fn theme(&self) -> Result<String> {
        self.get(THEME_KEY, DEFAULT_THEME)
    }
}
