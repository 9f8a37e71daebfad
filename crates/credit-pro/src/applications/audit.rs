use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{current_instant, ApplicationId, CreditApplicationStatus};

/// Kinds of state change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    Creation,
    StatusUpdate,
}

impl AuditEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            AuditEventKind::Creation => "Creation",
            AuditEventKind::StatusUpdate => "StatusUpdate",
        }
    }
}

/// One immutable record of a state change, stored apart from the application itself.
///
/// Fields stay stringly typed because the audit store is free text: events written by
/// other producers are read back as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub application_id: String,
    /// ISO-8601 UTC instant with microsecond precision.
    pub timestamp: String,
    pub event_type: String,
    pub new_state: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl AuditEvent {
    /// Event recorded when an application is opened.
    pub fn creation(
        application_id: ApplicationId,
        customer_id: &str,
        credit_amount: Decimal,
    ) -> Self {
        let mut details = BTreeMap::new();
        details.insert("creditAmount".to_string(), decimal_value(credit_amount));
        details.insert(
            "customerId".to_string(),
            Value::String(customer_id.to_string()),
        );

        Self::now(
            application_id,
            AuditEventKind::Creation,
            CreditApplicationStatus::Received,
            details,
        )
    }

    /// Event recorded when an application's status is overwritten.
    ///
    /// `notes` is kept only when it has visible content.
    pub fn status_update(
        application_id: ApplicationId,
        previous_status: CreditApplicationStatus,
        new_status: CreditApplicationStatus,
        notes: Option<&str>,
    ) -> Self {
        let mut details = BTreeMap::new();
        details.insert(
            "previousStatus".to_string(),
            Value::String(previous_status.label().to_string()),
        );
        if let Some(notes) = notes.filter(|notes| !notes.trim().is_empty()) {
            details.insert("notes".to_string(), Value::String(notes.to_string()));
        }

        Self::now(
            application_id,
            AuditEventKind::StatusUpdate,
            new_status,
            details,
        )
    }

    fn now(
        application_id: ApplicationId,
        kind: AuditEventKind,
        new_state: CreditApplicationStatus,
        details: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            application_id: application_id.to_string(),
            timestamp: format_timestamp(current_instant()),
            event_type: kind.label().to_string(),
            new_state: new_state.label().to_string(),
            details,
        }
    }

    /// Parsed form of [`AuditEvent::timestamp`], `None` when the stored text is not RFC 3339.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|instant| instant.with_timezone(&Utc))
    }
}

/// Order a history oldest-first. Events with unreadable timestamps sort first, and ties keep
/// their insertion order.
pub fn sort_chronologically(events: &mut [AuditEvent]) {
    events.sort_by_key(AuditEvent::recorded_at);
}

pub(crate) fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decimal_value(amount: Decimal) -> Value {
    serde_json::to_value(amount).unwrap_or_else(|_| Value::String(amount.to_string()))
}
