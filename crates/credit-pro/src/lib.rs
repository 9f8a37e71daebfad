//! Credit application lifecycle service: validated applications, free status transitions,
//! and an append-only audit trail kept in a separate store.

pub mod applications;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;
