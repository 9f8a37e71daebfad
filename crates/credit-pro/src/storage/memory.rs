use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::applications::audit::sort_chronologically;
use crate::applications::{
    ApplicationId, AuditEvent, AuditEventRepository, CreditApplication,
    CreditApplicationRepository, StorageError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("in-memory store mutex poisoned".to_string()))
}

/// Process-local application store.
#[derive(Default, Clone)]
pub struct InMemoryCreditApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, CreditApplication>>>,
}

#[async_trait]
impl CreditApplicationRepository for InMemoryCreditApplicationRepository {
    async fn create(
        &self,
        application: CreditApplication,
    ) -> Result<CreditApplication, StorageError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&application.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(application.id(), application.clone());
        Ok(application)
    }

    async fn get_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<CreditApplication>, StorageError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    async fn update(&self, application: &CreditApplication) -> Result<(), StorageError> {
        let mut guard = lock(&self.records)?;
        match guard.get_mut(&application.id()) {
            Some(existing) => {
                *existing = application.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

/// Process-local append-only audit store, grouped by application id.
#[derive(Default, Clone)]
pub struct InMemoryAuditEventRepository {
    events: Arc<Mutex<HashMap<String, Vec<AuditEvent>>>>,
}

impl InMemoryAuditEventRepository {
    /// Number of events held across all applications.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .map(|guard| guard.values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditEventRepository for InMemoryAuditEventRepository {
    async fn save_event(&self, event: &AuditEvent) -> Result<(), StorageError> {
        let mut guard = lock(&self.events)?;
        guard
            .entry(event.application_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn get_events_by_application_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        let mut history = {
            let guard = lock(&self.events)?;
            guard.get(&id.to_string()).cloned().unwrap_or_default()
        };
        sort_chronologically(&mut history);
        Ok(history)
    }
}
