use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::applications::audit::sort_chronologically;
use crate::applications::{
    application_router, ApplicationId, AuditEvent, AuditEventRepository,
    CreateCreditApplicationRequest, CreditApplication, CreditApplicationRepository,
    CreditApplicationService, StorageError,
};

pub(super) fn application_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0)
        .single()
        .expect("valid date")
}

pub(super) fn create_request() -> CreateCreditApplicationRequest {
    CreateCreditApplicationRequest {
        customer_id: "CUST-12345".to_string(),
        credit_amount: Decimal::from(50_000),
        application_date: application_date(),
        collateral_description: Some("2019 Toyota Corolla".to_string()),
    }
}

pub(super) fn received_application() -> CreditApplication {
    CreditApplication::new("CUST-12345", Decimal::from(50_000), application_date(), None)
        .expect("valid application")
}

/// Application store that counts writes so tests can assert what reached storage.
#[derive(Default, Clone)]
pub(super) struct RecordingApplications {
    records: Arc<Mutex<HashMap<ApplicationId, CreditApplication>>>,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl RecordingApplications {
    pub(super) fn with(application: CreditApplication) -> Self {
        let repository = Self::default();
        repository
            .records
            .lock()
            .expect("repository mutex poisoned")
            .insert(application.id(), application);
        repository
    }

    pub(super) fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(super) fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub(super) fn stored(&self, id: &ApplicationId) -> Option<CreditApplication> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl CreditApplicationRepository for RecordingApplications {
    async fn create(
        &self,
        application: CreditApplication,
    ) -> Result<CreditApplication, StorageError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(application.id(), application.clone());
        Ok(application)
    }

    async fn get_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<CreditApplication>, StorageError> {
        Ok(self.stored(id))
    }

    async fn update(&self, application: &CreditApplication) -> Result<(), StorageError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(application.id(), application.clone());
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingAudit {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

#[async_trait]
impl AuditEventRepository for RecordingAudit {
    async fn save_event(&self, event: &AuditEvent) -> Result<(), StorageError> {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .push(event.clone());
        Ok(())
    }

    async fn get_events_by_application_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        let key = id.to_string();
        let mut history: Vec<AuditEvent> = self
            .events()
            .into_iter()
            .filter(|event| event.application_id == key)
            .collect();
        sort_chronologically(&mut history);
        Ok(history)
    }
}

pub(super) struct UnavailableApplications;

#[async_trait]
impl CreditApplicationRepository for UnavailableApplications {
    async fn create(
        &self,
        _application: CreditApplication,
    ) -> Result<CreditApplication, StorageError> {
        Err(StorageError::Unavailable("database offline".to_string()))
    }

    async fn get_by_id(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<CreditApplication>, StorageError> {
        Err(StorageError::Unavailable("database offline".to_string()))
    }

    async fn update(&self, _application: &CreditApplication) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("database offline".to_string()))
    }
}

/// Audit store whose writes always fail; reads return nothing.
pub(super) struct UnavailableAudit;

#[async_trait]
impl AuditEventRepository for UnavailableAudit {
    async fn save_event(&self, _event: &AuditEvent) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("audit table offline".to_string()))
    }

    async fn get_events_by_application_id(
        &self,
        _id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        Ok(Vec::new())
    }
}

pub(super) fn build_service() -> (
    CreditApplicationService<RecordingApplications, RecordingAudit>,
    Arc<RecordingApplications>,
    Arc<RecordingAudit>,
) {
    let applications = Arc::new(RecordingApplications::default());
    let audit = Arc::new(RecordingAudit::default());
    let service = CreditApplicationService::new(applications.clone(), audit.clone());
    (service, applications, audit)
}

pub(super) fn service_with(
    application: CreditApplication,
) -> (
    CreditApplicationService<RecordingApplications, RecordingAudit>,
    Arc<RecordingApplications>,
    Arc<RecordingAudit>,
) {
    let applications = Arc::new(RecordingApplications::with(application));
    let audit = Arc::new(RecordingAudit::default());
    let service = CreditApplicationService::new(applications.clone(), audit.clone());
    (service, applications, audit)
}

pub(super) fn router_with_service(
    service: CreditApplicationService<RecordingApplications, RecordingAudit>,
) -> axum::Router {
    application_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
