use std::time::Duration;

use async_trait::async_trait;

use super::audit::AuditEvent;
use super::domain::{ApplicationId, CreditApplication};

/// Store holding the current state of each application.
///
/// Calls are independent round trips; nothing here spans the audit store.
#[async_trait]
pub trait CreditApplicationRepository: Send + Sync {
    async fn create(&self, application: CreditApplication)
        -> Result<CreditApplication, StorageError>;
    async fn get_by_id(&self, id: &ApplicationId)
        -> Result<Option<CreditApplication>, StorageError>;
    async fn update(&self, application: &CreditApplication) -> Result<(), StorageError>;
}

/// Append-only store of audit events keyed by application id.
#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn save_event(&self, event: &AuditEvent) -> Result<(), StorageError>;

    /// Every event saved for `id`, oldest first.
    async fn get_events_by_application_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError>;
}

/// Failure reported by either store. The service passes these through untouched.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is unreadable: {0}")]
    Corrupted(String),
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}
