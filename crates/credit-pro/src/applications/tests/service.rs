use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use super::common::*;
use crate::applications::domain::{ApplicationId, CreditApplicationStatus, ValidationError};
use crate::applications::dto::UpdateStatusRequest;
use crate::applications::repository::StorageError;
use crate::applications::{ApplicationServiceError, CreditApplicationService};

fn status_request(new_status: &str, notes: Option<&str>) -> UpdateStatusRequest {
    UpdateStatusRequest {
        new_status: new_status.to_string(),
        notes: notes.map(str::to_string),
    }
}

#[tokio::test]
async fn create_persists_one_application_and_one_creation_event() {
    let (service, applications, audit) = build_service();

    let created = service
        .create_application(create_request())
        .await
        .expect("valid request is accepted");

    assert_eq!(created.status, "Received");
    assert_eq!(created.customer_id, "CUST-12345");
    assert_eq!(created.credit_amount, Decimal::from(50_000));
    assert_eq!(
        created.collateral_description.as_deref(),
        Some("2019 Toyota Corolla")
    );
    assert_eq!(applications.creates(), 1);
    assert!(applications.stored(&created.application_id).is_some());

    let events = audit.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.application_id, created.application_id.to_string());
    assert_eq!(event.event_type, "Creation");
    assert_eq!(event.new_state, "Received");
    assert_eq!(event.details["creditAmount"], json!(50000.0));
    assert_eq!(event.details["customerId"], json!("CUST-12345"));
}

#[tokio::test]
async fn create_rejects_invalid_input_before_any_write() {
    let (service, applications, audit) = build_service();

    let mut blank_customer = create_request();
    blank_customer.customer_id = "   ".to_string();
    let mut too_small = create_request();
    too_small.credit_amount = Decimal::from(1_000);
    let mut too_large = create_request();
    too_large.credit_amount = Decimal::from(150_000);
    let mut sub_cent = create_request();
    sub_cent.credit_amount = Decimal::new(50_000_123, 3);

    for request in [blank_customer, too_small, too_large, sub_cent] {
        match service.create_application(request).await {
            Err(ApplicationServiceError::InvalidArgument(_)) => {}
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    assert_eq!(applications.creates(), 0);
    assert!(audit.events().is_empty());
}

#[tokio::test]
async fn update_status_returns_previous_and_new_status() {
    let application = received_application();
    let id = application.id();
    let created_at = application.created_at();
    let (service, applications, audit) = service_with(application);

    let updated = service
        .update_status(&id, status_request("InAnalysis", Some("Documents complete")))
        .await
        .expect("known status is accepted");

    assert_eq!(updated.application_id, id);
    assert_eq!(updated.previous_status, "Received");
    assert_eq!(updated.new_status, "InAnalysis");
    assert!(updated.updated_at > created_at);

    let stored = applications.stored(&id).expect("application stored");
    assert_eq!(stored.status(), CreditApplicationStatus::InAnalysis);
    assert_eq!(stored.updated_at(), updated.updated_at);
    assert_eq!(applications.updates(), 1);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "StatusUpdate");
    assert_eq!(events[0].new_state, "InAnalysis");
    assert_eq!(events[0].details["previousStatus"], json!("Received"));
    assert_eq!(events[0].details["notes"], json!("Documents complete"));
}

#[tokio::test]
async fn update_status_allows_any_transition() {
    let application = received_application();
    let id = application.id();
    let (service, applications, _) = service_with(application);

    for (next, previous) in [
        ("Approved", "Received"),
        ("Rejected", "Approved"),
        ("Received", "Rejected"),
        ("Received", "Received"),
    ] {
        let updated = service
            .update_status(&id, status_request(next, None))
            .await
            .expect("transition allowed");
        assert_eq!(updated.previous_status, previous);
        assert_eq!(updated.new_status, next);
    }
    assert_eq!(applications.updates(), 4);
}

#[tokio::test]
async fn update_status_reports_missing_application_before_writing() {
    let (service, applications, audit) = build_service();
    let missing = ApplicationId::generate();

    match service
        .update_status(&missing, status_request("Approved", None))
        .await
    {
        Err(ApplicationServiceError::NotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }

    assert_eq!(applications.updates(), 0);
    assert!(audit.events().is_empty());
}

#[tokio::test]
async fn update_status_rejects_unknown_statuses_without_writing() {
    let application = received_application();
    let id = application.id();
    let before = application.snapshot();
    let (service, applications, audit) = service_with(application);

    for raw in ["Pendiente", "", "InvalidStatus"] {
        match service.update_status(&id, status_request(raw, None)).await {
            Err(ApplicationServiceError::InvalidArgument(ValidationError::InvalidStatus {
                value,
            })) => assert_eq!(value, raw),
            other => panic!("expected invalid status for '{raw}', got {other:?}"),
        }
    }

    assert_eq!(applications.updates(), 0);
    assert!(audit.events().is_empty());
    assert_eq!(
        applications.stored(&id).expect("still stored").snapshot(),
        before
    );
}

#[tokio::test]
async fn history_lists_creation_then_updates_in_order() {
    let (service, _, _) = build_service();
    let created = service
        .create_application(create_request())
        .await
        .expect("created");
    let id = created.application_id;

    service
        .update_status(&id, status_request("InAnalysis", None))
        .await
        .expect("first update");
    service
        .update_status(&id, status_request("Approved", Some("Score above threshold")))
        .await
        .expect("second update");

    let found = service.get_with_history(&id).await.expect("history");

    assert_eq!(found.application.status, "Approved");
    let kinds: Vec<(&str, &str)> = found
        .audit_history
        .iter()
        .map(|event| (event.event_type.as_str(), event.new_state.as_str()))
        .collect();
    assert_eq!(
        kinds,
        [
            ("Creation", "Received"),
            ("StatusUpdate", "InAnalysis"),
            ("StatusUpdate", "Approved"),
        ]
    );
    let instants: Vec<_> = found
        .audit_history
        .iter()
        .map(|event| event.recorded_at().expect("parsable timestamp"))
        .collect();
    assert!(instants.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn history_returns_empty_trail_when_no_events_exist() {
    let application = received_application();
    let id = application.id();
    let (service, _, _) = service_with(application);

    let found = service.get_with_history(&id).await.expect("found");

    assert_eq!(found.application.application_id, id);
    assert!(found.audit_history.is_empty());
}

#[tokio::test]
async fn history_reports_missing_application() {
    let (service, _, _) = build_service();

    assert!(matches!(
        service.get_with_history(&ApplicationId::generate()).await,
        Err(ApplicationServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn audit_failure_leaves_the_application_committed() {
    let applications = Arc::new(RecordingApplications::default());
    let service = CreditApplicationService::new(applications.clone(), Arc::new(UnavailableAudit));

    match service.create_application(create_request()).await {
        Err(ApplicationServiceError::Storage(StorageError::Unavailable(_))) => {}
        other => panic!("expected storage error, got {other:?}"),
    }
    assert_eq!(applications.creates(), 1);
}

#[tokio::test]
async fn audit_failure_after_status_update_keeps_new_status() {
    let application = received_application();
    let id = application.id();
    let applications = Arc::new(RecordingApplications::with(application));
    let service = CreditApplicationService::new(applications.clone(), Arc::new(UnavailableAudit));

    assert!(matches!(
        service
            .update_status(&id, status_request("Rejected", None))
            .await,
        Err(ApplicationServiceError::Storage(_))
    ));
    assert_eq!(
        applications.stored(&id).expect("stored").status(),
        CreditApplicationStatus::Rejected
    );
}

#[tokio::test]
async fn storage_failures_surface_as_storage_errors() {
    let audit = Arc::new(RecordingAudit::default());
    let service = CreditApplicationService::new(Arc::new(UnavailableApplications), audit.clone());

    assert!(matches!(
        service.create_application(create_request()).await,
        Err(ApplicationServiceError::Storage(_))
    ));
    assert!(matches!(
        service.get_with_history(&ApplicationId::generate()).await,
        Err(ApplicationServiceError::Storage(_))
    ));
    assert!(audit.events().is_empty());
}

#[tokio::test]
async fn failed_status_write_skips_the_audit_store() {
    let audit = Arc::new(RecordingAudit::default());
    let service = CreditApplicationService::new(Arc::new(UnavailableApplications), audit.clone());

    assert!(matches!(
        service
            .update_status(&ApplicationId::generate(), status_request("Approved", None))
            .await,
        Err(ApplicationServiceError::Storage(_))
    ));
    assert!(audit.events().is_empty());
}
