//! Request and response shapes exchanged with callers of the application service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::audit::AuditEvent;
use super::domain::{ApplicationId, CreditApplication};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCreditApplicationRequest {
    /// Missing ids deserialize as empty and are rejected by validation.
    #[serde(default)]
    pub customer_id: String,
    pub credit_amount: Decimal,
    pub application_date: DateTime<Utc>,
    #[serde(default)]
    pub collateral_description: Option<String>,
}

/// Projection of an application with its status rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditApplicationView {
    pub application_id: ApplicationId,
    pub customer_id: String,
    pub credit_amount: Decimal,
    pub application_date: DateTime<Utc>,
    pub status: String,
    pub collateral_description: Option<String>,
}

pub type CreateCreditApplicationResponse = CreditApplicationView;

impl From<&CreditApplication> for CreditApplicationView {
    fn from(application: &CreditApplication) -> Self {
        Self {
            application_id: application.id(),
            customer_id: application.customer_id().to_string(),
            credit_amount: application.credit_amount(),
            application_date: application.application_date(),
            status: application.status().label().to_string(),
            collateral_description: application.collateral_description().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub new_status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub application_id: ApplicationId,
    pub previous_status: String,
    pub new_status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetApplicationResponse {
    pub application: CreditApplicationView,
    pub audit_history: Vec<AuditEvent>,
}
