//! PostgreSQL-backed application store.
//!
//! Status is persisted as its text name. Rows are rebuilt through
//! [`CreditApplication::restore`], so a row that violates the entity invariants surfaces as
//! [`StorageError::Corrupted`] instead of a live value.

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{with_timeout, STORE_CALL_TIMEOUT};
use crate::applications::{
    ApplicationId, ApplicationSnapshot, CreditApplication, CreditApplicationRepository,
    CreditApplicationStatus, StorageError,
};
use crate::config::DatabaseConfig;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS credit_applications (
        application_id UUID PRIMARY KEY,
        customer_id VARCHAR(100) NOT NULL,
        credit_amount NUMERIC(18, 2) NOT NULL,
        application_date TIMESTAMPTZ NOT NULL,
        status VARCHAR(50) NOT NULL,
        collateral_description TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_customer_id ON credit_applications (customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_status ON credit_applications (status)",
];

#[derive(Debug, Clone)]
pub struct PostgresCreditApplicationRepository {
    pool: PgPool,
}

impl PostgresCreditApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and create the schema, retrying while the database comes up.
    ///
    /// This is the one-time setup step run before the service accepts traffic.
    #[instrument(skip(config), fields(attempts = config.connect_attempts))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let max_attempts = config.connect_attempts.max(1);
        let mut attempt = 1;

        loop {
            match Self::try_connect(config).await {
                Ok(repository) => {
                    info!(attempt, "application store ready");
                    return Ok(repository);
                }
                Err(err) if attempt >= max_attempts => {
                    error!(attempt, error = %err, "application store unreachable, giving up");
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts,
                        delay = ?config.retry_delay,
                        error = %err,
                        "application store not ready, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(STORE_CALL_TIMEOUT)
            .connect(&config.url)
            .await
            .map_err(|err| map_sqlx_error("connect", err))?;

        let repository = Self::new(pool);
        repository.ensure_schema().await?;
        Ok(repository)
    }

    /// Create the `credit_applications` table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            with_timeout("ensure_schema", async {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|err| map_sqlx_error("ensure_schema", err))
            })
            .await?;
        }
        debug!("credit_applications schema in place");
        Ok(())
    }
}

#[async_trait::async_trait]
impl CreditApplicationRepository for PostgresCreditApplicationRepository {
    #[instrument(skip(self, application), fields(application_id = %application.id()), err)]
    async fn create(
        &self,
        application: CreditApplication,
    ) -> Result<CreditApplication, StorageError> {
        with_timeout("create", async {
            sqlx::query(
                r#"
                INSERT INTO credit_applications (
                    application_id,
                    customer_id,
                    credit_amount,
                    application_date,
                    status,
                    collateral_description,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(application.id().0)
            .bind(application.customer_id())
            .bind(application.credit_amount())
            .bind(application.application_date())
            .bind(application.status().label())
            .bind(application.collateral_description())
            .bind(application.created_at())
            .bind(application.updated_at())
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("create", err))
        })
        .await?;

        debug!("application row inserted");
        Ok(application)
    }

    #[instrument(skip(self), fields(application_id = %id), err)]
    async fn get_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<CreditApplication>, StorageError> {
        let row = with_timeout("get_by_id", async {
            sqlx::query(
                r#"
                SELECT
                    application_id,
                    customer_id,
                    credit_amount,
                    application_date,
                    status,
                    collateral_description,
                    created_at,
                    updated_at
                FROM credit_applications
                WHERE application_id = $1
                "#,
            )
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("get_by_id", err))
        })
        .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    #[instrument(skip(self, application), fields(application_id = %application.id()), err)]
    async fn update(&self, application: &CreditApplication) -> Result<(), StorageError> {
        let result = with_timeout("update", async {
            sqlx::query(
                r#"
                UPDATE credit_applications
                SET customer_id = $2,
                    credit_amount = $3,
                    application_date = $4,
                    status = $5,
                    collateral_description = $6,
                    updated_at = $7
                WHERE application_id = $1
                "#,
            )
            .bind(application.id().0)
            .bind(application.customer_id())
            .bind(application.credit_amount())
            .bind(application.application_date())
            .bind(application.status().label())
            .bind(application.collateral_description())
            .bind(application.updated_at())
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("update", err))
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn application_from_row(row: &PgRow) -> Result<CreditApplication, StorageError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let status = status
        .parse::<CreditApplicationStatus>()
        .map_err(|err| StorageError::Corrupted(err.to_string()))?;

    let snapshot = ApplicationSnapshot {
        application_id: ApplicationId(row.try_get::<Uuid, _>("application_id").map_err(decode_error)?),
        customer_id: row.try_get("customer_id").map_err(decode_error)?,
        credit_amount: row.try_get("credit_amount").map_err(decode_error)?,
        application_date: row.try_get("application_date").map_err(decode_error)?,
        status,
        collateral_description: row.try_get("collateral_description").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    };

    CreditApplication::restore(snapshot).map_err(|err| StorageError::Corrupted(err.to_string()))
}

fn decode_error(err: sqlx::Error) -> StorageError {
    StorageError::Corrupted(format!("failed to decode application row: {err}"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StorageError::Conflict
            } else {
                StorageError::Unavailable(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                ))
            }
        }
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::Corrupted(format!("{operation}: {err}"))
        }
        sqlx::Error::PoolTimedOut => {
            StorageError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StorageError::Unavailable(format!("connection pool closed in {operation}"))
        }
        other => StorageError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}
