//! Store implementations behind the application and audit repository traits.
//!
//! `memory` keeps both stores in process. `postgres` holds current application state and
//! `redis_audit` holds the audit trail; they share no connection and no transaction.

pub mod memory;
pub mod postgres;
pub mod redis_audit;

use std::future::Future;
use std::time::Duration;

use crate::applications::StorageError;

pub use memory::{InMemoryAuditEventRepository, InMemoryCreditApplicationRepository};
pub use postgres::PostgresCreditApplicationRepository;
pub use redis_audit::RedisAuditEventRepository;

/// Upper bound on a single call to an external store.
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound `call` by [`STORE_CALL_TIMEOUT`]. Dropping the returned future abandons the call,
/// but a request already sent to the store is not retracted.
pub(crate) async fn with_timeout<T, F>(operation: &'static str, call: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(STORE_CALL_TIMEOUT, call)
        .await
        .map_err(|_| StorageError::Timeout {
            operation,
            timeout: STORE_CALL_TIMEOUT,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_reports_slow_calls() {
        let result: Result<(), StorageError> = with_timeout("slow call", async {
            tokio::time::sleep(STORE_CALL_TIMEOUT * 2).await;
            Ok(())
        })
        .await;

        match result {
            Err(StorageError::Timeout { operation, timeout }) => {
                assert_eq!(operation, "slow call");
                assert_eq!(timeout, STORE_CALL_TIMEOUT);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn with_timeout_passes_through_store_errors() {
        let result: Result<(), StorageError> =
            with_timeout("failing call", async { Err(StorageError::Conflict) }).await;
        assert!(matches!(result, Err(StorageError::Conflict)));
    }
}
