use flashreport_core::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("{entity} {id} references missing {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        id: String,
        target: &'static str,
        target_id: String,
    },
    #[error("backend timed out: {0}")]
    Timeout(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StorageError> for RepositoryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { table, id } => RepositoryError::NotFound {
                entity: table.name(),
                id,
            },
            StorageError::ConstraintViolation(msg) => RepositoryError::ConstraintViolation(msg),
            StorageError::Timeout(msg) => RepositoryError::Timeout(msg),
            StorageError::Unavailable(msg) => RepositoryError::BackendUnavailable(msg),
            other => RepositoryError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use flashreport_core::Table;

    #[test]
    fn test_storage_errors_map_to_typed_variants() {
        let err: RepositoryError = StorageError::not_found(Table::Partners, "p1").into();
        assert!(matches!(err, RepositoryError::NotFound { entity: "partners", .. }));

        let err: RepositoryError = StorageError::Timeout("statement timeout".into()).into();
        assert!(matches!(err, RepositoryError::Timeout(_)));

        let err: RepositoryError = StorageError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, RepositoryError::BackendUnavailable(_)));

        let err: RepositoryError = StorageError::Serialization("bad".into()).into();
        assert!(matches!(err, RepositoryError::Storage(_)));
    }
}
