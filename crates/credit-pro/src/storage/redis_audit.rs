//! Redis-backed audit store.
//!
//! Each application owns one list at `<prefix>:<application id>` holding JSON-encoded events.
//! `RPUSH` only appends, so identical events written concurrently are all kept. Reads sort
//! the list by event timestamp since concurrent writers may append out of order.

use redis::aio::MultiplexedConnection;
use tracing::{debug, info, instrument};

use super::with_timeout;
use crate::applications::audit::sort_chronologically;
use crate::applications::{ApplicationId, AuditEvent, AuditEventRepository, StorageError};
use crate::config::AuditStoreConfig;

#[derive(Clone)]
pub struct RedisAuditEventRepository {
    connection: MultiplexedConnection,
    key_prefix: String,
}

impl RedisAuditEventRepository {
    /// Open the connection and check the server answers before any event is written.
    ///
    /// This is the one-time setup step run before the service accepts traffic; individual
    /// calls never re-check it.
    #[instrument(skip(config), fields(key_prefix = %config.key_prefix))]
    pub async fn connect(config: &AuditStoreConfig) -> Result<Self, StorageError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|err| map_redis_error("open", err))?;

        let connection = with_timeout("connect", async {
            client
                .get_multiplexed_async_connection()
                .await
                .map_err(|err| map_redis_error("connect", err))
        })
        .await?;

        let repository = Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        };
        repository.ping().await?;
        info!("audit store ready");
        Ok(repository)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        let reply: String = with_timeout("ping", async {
            redis::cmd("PING")
                .query_async(&mut connection)
                .await
                .map_err(|err| map_redis_error("ping", err))
        })
        .await?;

        if reply != "PONG" {
            return Err(StorageError::Unavailable(format!(
                "unexpected PING reply from audit store: {reply}"
            )));
        }
        Ok(())
    }

    fn key(&self, application_id: &str) -> String {
        history_key(&self.key_prefix, application_id)
    }
}

#[async_trait::async_trait]
impl AuditEventRepository for RedisAuditEventRepository {
    #[instrument(skip(self, event), fields(application_id = %event.application_id), err)]
    async fn save_event(&self, event: &AuditEvent) -> Result<(), StorageError> {
        check_timestamp(event)?;
        let member = serde_json::to_string(event)
            .map_err(|err| StorageError::Corrupted(format!("failed to encode audit event: {err}")))?;
        let key = self.key(&event.application_id);
        let mut connection = self.connection.clone();
        let command = append_command(&key, &member);

        let _: i64 = with_timeout("save_event", async {
            command
                .query_async(&mut connection)
                .await
                .map_err(|err| map_redis_error("save_event", err))
        })
        .await?;

        debug!(%key, "audit event saved");
        Ok(())
    }

    #[instrument(skip(self), fields(application_id = %id), err)]
    async fn get_events_by_application_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Vec<AuditEvent>, StorageError> {
        let key = self.key(&id.to_string());
        let mut connection = self.connection.clone();

        let members: Vec<String> = with_timeout("get_events_by_application_id", async {
            redis::cmd("LRANGE")
                .arg(&key)
                .arg(0)
                .arg(-1)
                .query_async(&mut connection)
                .await
                .map_err(|err| map_redis_error("get_events_by_application_id", err))
        })
        .await?;

        let events = history_from_members(&members)?;

        debug!(count = events.len(), "audit history loaded");
        Ok(events)
    }
}

fn history_key(prefix: &str, application_id: &str) -> String {
    format!("{prefix}:{application_id}")
}

fn append_command(key: &str, member: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("RPUSH");
    cmd.arg(key).arg(member);
    cmd
}

fn check_timestamp(event: &AuditEvent) -> Result<(), StorageError> {
    match event.recorded_at() {
        Some(_) => Ok(()),
        None => Err(StorageError::Corrupted(format!(
            "audit event timestamp '{}' is not an ISO-8601 instant",
            event.timestamp
        ))),
    }
}

fn history_from_members(members: &[String]) -> Result<Vec<AuditEvent>, StorageError> {
    let mut events = members
        .iter()
        .map(|member| decode_event(member))
        .collect::<Result<Vec<_>, _>>()?;
    sort_chronologically(&mut events);
    Ok(events)
}

fn decode_event(member: &str) -> Result<AuditEvent, StorageError> {
    serde_json::from_str(member)
        .map_err(|err| StorageError::Corrupted(format!("failed to decode audit event: {err}")))
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StorageError {
    StorageError::Unavailable(format!("redis error in {operation}: {err}"))
}
