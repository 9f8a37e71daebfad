use async_trait::async_trait;
use credit_pro::applications::{
    ApplicationId, AuditEvent, AuditEventRepository, CreditApplication,
    CreditApplicationRepository, StorageError,
};
use credit_pro::config::AppEnvironment;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Shared state for the operational endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Flipped once both stores finished their one-time setup.
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) environment: AppEnvironment,
}

/// Store handle served before setup completes. Calls fail as unavailable until a store
/// is installed, then delegate to it.
pub(crate) struct PendingStore<S> {
    inner: Arc<OnceCell<S>>,
}

impl<S> PendingStore<S> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(OnceCell::new()),
        }
    }

    /// Returns `false` when a store was already installed; the first one stays.
    pub(crate) fn install(&self, store: S) -> bool {
        self.inner.set(store).is_ok()
    }

    fn store(&self) -> Result<&S, StorageError> {
        self.inner
            .get()
            .ok_or_else(|| StorageError::Unavailable("store setup still in progress".to_string()))
    }
}

impl<S> Clone for PendingStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<S> CreditApplicationRepository for PendingStore<S>
where
    S: CreditApplicationRepository + 'static,
{
    async fn create(
        &self,
        application: CreditApplication,
    ) -> Result<CreditApplication, StorageError> {
        self.store()?.create(application).await
    }

    async fn get_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<CreditApplication>, StorageError> {
        self.store()?.get_by_id(id).await
    }

    async fn update(&self, application: &CreditApplication) -> Result<(), StorageError> {
        self.store()?.update(application).await
    }
}

#[async_trait]
impl<S> AuditEventRepository for PendingStore<S>
where
    S: AuditEventRepository + 'static,
{
    async fn save_event(&self, event: &AuditEvent) -> Result<(), StorageError> {
        self.store()?.save_event(event).await
    }

    async fn get_events_by_application_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        self.store()?.get_events_by_application_id(id).await
    }
}
