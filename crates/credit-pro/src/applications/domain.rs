use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exclusive lower bound of a requested credit amount.
pub const MIN_CREDIT_AMOUNT: i64 = 1_000;
/// Exclusive upper bound of a requested credit amount.
pub const MAX_CREDIT_AMOUNT: i64 = 150_000;
/// Decimal places a credit amount may carry; matches the `NUMERIC(18, 2)` column.
pub const CREDIT_AMOUNT_SCALE: u32 = 2;

/// Identifier wrapper for credit applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApplicationId {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidApplicationId {
                value: raw.to_string(),
            })
    }
}

/// Lifecycle status of a credit application.
///
/// Any status may follow any other, including itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreditApplicationStatus {
    Received,
    InAnalysis,
    Approved,
    Rejected,
}

impl CreditApplicationStatus {
    pub const ALL: [CreditApplicationStatus; 4] = [
        CreditApplicationStatus::Received,
        CreditApplicationStatus::InAnalysis,
        CreditApplicationStatus::Approved,
        CreditApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CreditApplicationStatus::Received => "Received",
            CreditApplicationStatus::InAnalysis => "InAnalysis",
            CreditApplicationStatus::Approved => "Approved",
            CreditApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for CreditApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CreditApplicationStatus {
    type Err = ValidationError;

    /// Matches the exact status name; surrounding whitespace is ignored.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let candidate = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == candidate)
            .ok_or_else(|| ValidationError::InvalidStatus {
                value: raw.to_string(),
            })
    }
}

/// Invalid input rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("customer id cannot be empty")]
    EmptyCustomerId,
    #[error("credit amount must be greater than 1,000 and less than 150,000 (got {amount})")]
    AmountOutOfRange { amount: Decimal },
    #[error("credit amount cannot have more than 2 decimal places (got {amount})")]
    AmountPrecision { amount: Decimal },
    #[error("invalid status: '{value}'. Valid values are: Received, InAnalysis, Approved, Rejected")]
    InvalidStatus { value: String },
    #[error("invalid application id: '{value}'")]
    InvalidApplicationId { value: String },
}

/// Current state of one credit request.
///
/// Fields are private so the amount and customer invariants hold for every live value;
/// stores rebuild entities through [`CreditApplication::restore`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreditApplication {
    application_id: ApplicationId,
    customer_id: String,
    credit_amount: Decimal,
    application_date: DateTime<Utc>,
    status: CreditApplicationStatus,
    collateral_description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Plain field-for-field copy of a persisted application.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSnapshot {
    pub application_id: ApplicationId,
    pub customer_id: String,
    pub credit_amount: Decimal,
    pub application_date: DateTime<Utc>,
    pub status: CreditApplicationStatus,
    pub collateral_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditApplication {
    /// Validate the request and open a new application in the `Received` status.
    pub fn new(
        customer_id: impl Into<String>,
        credit_amount: Decimal,
        application_date: DateTime<Utc>,
        collateral_description: Option<String>,
    ) -> Result<Self, ValidationError> {
        let customer_id = customer_id.into();
        validate_customer_id(&customer_id)?;
        validate_credit_amount(credit_amount)?;

        let now = current_instant();
        Ok(Self {
            application_id: ApplicationId::generate(),
            customer_id,
            credit_amount,
            application_date,
            status: CreditApplicationStatus::Received,
            collateral_description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild an application read back from storage, re-checking its invariants.
    pub fn restore(snapshot: ApplicationSnapshot) -> Result<Self, ValidationError> {
        validate_customer_id(&snapshot.customer_id)?;
        validate_credit_amount(snapshot.credit_amount)?;

        Ok(Self {
            application_id: snapshot.application_id,
            customer_id: snapshot.customer_id,
            credit_amount: snapshot.credit_amount,
            application_date: snapshot.application_date,
            status: snapshot.status,
            collateral_description: snapshot.collateral_description,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }

    /// Overwrite the status and refresh the update timestamp, returning the previous status.
    ///
    /// No transition graph is enforced. The update timestamp always moves forward, even when
    /// the clock has not advanced since the last change.
    pub fn update_status(&mut self, status: CreditApplicationStatus) -> CreditApplicationStatus {
        let previous = self.status;
        self.status = status;
        self.updated_at = next_update_instant(self.updated_at);
        previous
    }

    pub fn id(&self) -> ApplicationId {
        self.application_id
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn credit_amount(&self) -> Decimal {
        self.credit_amount
    }

    pub fn application_date(&self) -> DateTime<Utc> {
        self.application_date
    }

    pub fn status(&self) -> CreditApplicationStatus {
        self.status
    }

    pub fn collateral_description(&self) -> Option<&str> {
        self.collateral_description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn snapshot(&self) -> ApplicationSnapshot {
        ApplicationSnapshot {
            application_id: self.application_id,
            customer_id: self.customer_id.clone(),
            credit_amount: self.credit_amount,
            application_date: self.application_date,
            status: self.status,
            collateral_description: self.collateral_description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn validate_customer_id(customer_id: &str) -> Result<(), ValidationError> {
    if customer_id.trim().is_empty() {
        return Err(ValidationError::EmptyCustomerId);
    }
    Ok(())
}

fn validate_credit_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::from(MIN_CREDIT_AMOUNT) || amount >= Decimal::from(MAX_CREDIT_AMOUNT) {
        return Err(ValidationError::AmountOutOfRange { amount });
    }
    if amount.normalize().scale() > CREDIT_AMOUNT_SCALE {
        return Err(ValidationError::AmountPrecision { amount });
    }
    Ok(())
}

// Microsecond precision so timestamps survive a round trip through Postgres unchanged.
pub(crate) fn current_instant() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn next_update_instant(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = current_instant();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
