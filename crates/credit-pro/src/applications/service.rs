use std::sync::Arc;

use tracing::{debug, error};

use super::audit::AuditEvent;
use super::domain::{
    ApplicationId, CreditApplication, CreditApplicationStatus, ValidationError,
};
use super::dto::{
    CreateCreditApplicationRequest, CreateCreditApplicationResponse, CreditApplicationView,
    GetApplicationResponse, UpdateStatusRequest, UpdateStatusResponse,
};
use super::repository::{AuditEventRepository, CreditApplicationRepository, StorageError};

/// Service sequencing the application store and the audit store.
///
/// The two writes of each use case are not atomic. When the audit write fails after the
/// application write succeeded, the application stays committed without its audit record
/// and the storage error is returned as-is; nothing is retried or rolled back.
pub struct CreditApplicationService<R, A> {
    applications: Arc<R>,
    audit: Arc<A>,
}

impl<R, A> CreditApplicationService<R, A>
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
{
    pub fn new(applications: Arc<R>, audit: Arc<A>) -> Self {
        Self {
            applications,
            audit,
        }
    }

    /// Validate and persist a new application, then record its creation event.
    pub async fn create_application(
        &self,
        request: CreateCreditApplicationRequest,
    ) -> Result<CreateCreditApplicationResponse, ApplicationServiceError> {
        let application = CreditApplication::new(
            request.customer_id,
            request.credit_amount,
            request.application_date,
            request.collateral_description,
        )?;

        let application = self.applications.create(application).await?;

        let event = AuditEvent::creation(
            application.id(),
            application.customer_id(),
            application.credit_amount(),
        );
        self.record(&event).await?;

        debug!(application_id = %application.id(), "credit application created");
        Ok(CreditApplicationView::from(&application))
    }

    /// Overwrite an application's status and record the change.
    pub async fn update_status(
        &self,
        application_id: &ApplicationId,
        request: UpdateStatusRequest,
    ) -> Result<UpdateStatusResponse, ApplicationServiceError> {
        let mut application = self.load(application_id).await?;

        let new_status: CreditApplicationStatus = request.new_status.parse()?;
        let previous_status = application.update_status(new_status);

        self.applications.update(&application).await?;

        let event = AuditEvent::status_update(
            application.id(),
            previous_status,
            new_status,
            request.notes.as_deref(),
        );
        self.record(&event).await?;

        debug!(
            application_id = %application.id(),
            from = previous_status.label(),
            to = new_status.label(),
            "credit application status updated"
        );
        Ok(UpdateStatusResponse {
            application_id: application.id(),
            previous_status: previous_status.label().to_string(),
            new_status: new_status.label().to_string(),
            updated_at: application.updated_at(),
        })
    }

    /// Fetch an application together with its full audit trail.
    pub async fn get_with_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<GetApplicationResponse, ApplicationServiceError> {
        let application = self.load(application_id).await?;
        let audit_history = self
            .audit
            .get_events_by_application_id(application_id)
            .await?;

        Ok(GetApplicationResponse {
            application: CreditApplicationView::from(&application),
            audit_history,
        })
    }

    async fn load(
        &self,
        application_id: &ApplicationId,
    ) -> Result<CreditApplication, ApplicationServiceError> {
        self.applications
            .get_by_id(application_id)
            .await?
            .ok_or(ApplicationServiceError::NotFound(*application_id))
    }

    async fn record(&self, event: &AuditEvent) -> Result<(), StorageError> {
        self.audit.save_event(event).await.inspect_err(|err| {
            error!(
                application_id = %event.application_id,
                event_type = %event.event_type,
                error = %err,
                "audit event lost; application change is already committed"
            );
        })
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),
    #[error("application with id {0} not found")]
    NotFound(ApplicationId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
