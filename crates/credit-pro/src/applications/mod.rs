//! Credit application intake, status transitions, and the audit trail kept beside them.
//!
//! Current state and audit events live in two independent stores. Each use case writes the
//! application first and the audit event second, with no transaction spanning both.

pub mod audit;
pub mod domain;
pub mod dto;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use audit::{sort_chronologically, AuditEvent, AuditEventKind};
pub use domain::{
    ApplicationId, ApplicationSnapshot, CreditApplication, CreditApplicationStatus,
    ValidationError, CREDIT_AMOUNT_SCALE, MAX_CREDIT_AMOUNT, MIN_CREDIT_AMOUNT,
};
pub use dto::{
    CreateCreditApplicationRequest, CreateCreditApplicationResponse, CreditApplicationView,
    GetApplicationResponse, UpdateStatusRequest, UpdateStatusResponse,
};
pub use repository::{AuditEventRepository, CreditApplicationRepository, StorageError};
pub use router::{application_router, APPLICATIONS_PATH};
pub use service::{ApplicationServiceError, CreditApplicationService};
