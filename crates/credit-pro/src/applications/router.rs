use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use super::domain::ApplicationId;
use super::dto::{CreateCreditApplicationRequest, UpdateStatusRequest};
use super::repository::{AuditEventRepository, CreditApplicationRepository};
use super::service::{ApplicationServiceError, CreditApplicationService};

pub const APPLICATIONS_PATH: &str = "/api/credit-applications";

/// Router builder exposing the create, status-update, and history endpoints.
pub fn application_router<R, A>(service: Arc<CreditApplicationService<R, A>>) -> Router
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
{
    Router::new()
        .route(APPLICATIONS_PATH, post(create_handler::<R, A>))
        .route(
            "/api/credit-applications/:application_id",
            get(history_handler::<R, A>),
        )
        .route(
            "/api/credit-applications/:application_id/status",
            patch(update_status_handler::<R, A>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R, A>(
    State(service): State<Arc<CreditApplicationService<R, A>>>,
    Json(request): Json<CreateCreditApplicationRequest>,
) -> Response
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
{
    info!(customer_id = %request.customer_id, "creating credit application");

    match service.create_application(request).await {
        Ok(created) => {
            info!(application_id = %created.application_id, "credit application created");
            let location = format!("{APPLICATIONS_PATH}/{}", created.application_id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(created),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_status_handler<R, A>(
    State(service): State<Arc<CreditApplicationService<R, A>>>,
    Path(application_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
{
    let id = match application_id.parse::<ApplicationId>() {
        Ok(id) => id,
        Err(err) => return error_response(err.into()),
    };
    info!(application_id = %id, new_status = %request.new_status, "updating application status");

    match service.update_status(&id, request).await {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn history_handler<R, A>(
    State(service): State<Arc<CreditApplicationService<R, A>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: CreditApplicationRepository + 'static,
    A: AuditEventRepository + 'static,
{
    let id = match application_id.parse::<ApplicationId>() {
        Ok(id) => id,
        Err(err) => return error_response(err.into()),
    };
    info!(application_id = %id, "fetching application with history");

    match service.get_with_history(&id).await {
        Ok(found) => (StatusCode::OK, Json(found)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let (status, message) = match &err {
        ApplicationServiceError::InvalidArgument(validation) => {
            warn!(error = %validation, "rejected invalid request");
            (StatusCode::BAD_REQUEST, validation.to_string())
        }
        ApplicationServiceError::NotFound(id) => {
            warn!(application_id = %id, "application not found");
            (StatusCode::NOT_FOUND, err.to_string())
        }
        ApplicationServiceError::Storage(storage) => {
            error!(error = %storage, "storage failure while processing request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while processing the request".to_string(),
            )
        }
    };

    (status, Json(json!({ "error": message }))).into_response()
}
