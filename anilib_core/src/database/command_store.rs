//! SQLite-backed command store

use super::Database;
use crate::error::{InternalError, Result};
use crate::protocol::Axis;
use crate::queue::{Command, CommandStore, CommandType, QueueName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

const COLUMNS: &str = "seq, command_id, command_type, priority, queue, payload, payload_version, created_at, updated_at";

/// Durable command store; survives restarts
#[derive(Clone)]
pub struct SqliteCommandStore {
    db: Database,
}

impl SqliteCommandStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn row_to_command(row: &SqliteRow) -> Result<Command> {
    let command_type: String = row.try_get("command_type")?;
    let queue: String = row.try_get("queue")?;
    let payload: String = row.try_get("payload")?;
    let priority: i64 = row.try_get("priority")?;
    let seq: i64 = row.try_get("seq")?;
    let payload_version: i64 = row.try_get("payload_version")?;

    Ok(Command {
        identity: row.try_get("command_id")?,
        command_type: command_type.parse()?,
        priority: u8::try_from(priority)
            .map_err(|_| InternalError::store(format!("priority {priority} out of range")))?,
        queue: queue.parse()?,
        payload: serde_json::from_str(&payload)?,
        payload_version: u32::try_from(payload_version).unwrap_or(u32::MAX),
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
        seq: u64::try_from(seq).unwrap_or_default(),
    })
}

/// Convert rows, skipping ones this build cannot read
fn rows_to_commands(rows: &[SqliteRow]) -> Vec<Command> {
    rows.iter()
        .filter_map(|row| match row_to_command(row) {
            Ok(command) => Some(command),
            Err(e) => {
                warn!("Skipping unreadable command row: {e}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl CommandStore for SqliteCommandStore {
    async fn try_insert(&self, command: Command) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO command_requests \
             (command_id, command_type, priority, queue, payload, payload_version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(command_id) DO NOTHING",
        )
        .bind(&command.identity)
        .bind(command.command_type.name())
        .bind(i64::from(command.priority))
        .bind(command.queue.as_str())
        .bind(command.payload.to_string())
        .bind(i64::from(command.payload_version))
        .bind(to_millis(command.created_at))
        .bind(to_millis(now))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn next_pending(&self, queue: QueueName, blocked: &[Axis]) -> Result<Option<Command>> {
        let gated = CommandType::gated_by(blocked);
        let runnable: Vec<CommandType> = CommandType::ALL
            .into_iter()
            .filter(|kind| !gated.contains(kind))
            .collect();

        // Rows of unknown types are never selected
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM command_requests WHERE queue = "
        ));
        query.push_bind(queue.as_str());
        query.push(" AND command_type IN (");
        let mut types = query.separated(", ");
        for kind in &runnable {
            types.push_bind(kind.name());
        }
        types.push_unseparated(")");
        query.push(" ORDER BY priority ASC, seq ASC LIMIT 1");

        let row = query.build().fetch_optional(self.db.pool()).await?;
        row.as_ref().map(row_to_command).transpose()
    }

    async fn delete(&self, identity: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM command_requests WHERE command_id = ?")
            .bind(identity)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn contains(&self, identity: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM command_requests WHERE command_id = ?",
        )
        .bind(identity)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count > 0)
    }

    async fn count(&self, queue: Option<QueueName>) -> Result<usize> {
        let count = match queue {
            Some(queue) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM command_requests WHERE queue = ?")
                    .bind(queue.as_str())
                    .fetch_one(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM command_requests")
                    .fetch_one(self.db.pool())
                    .await?
            }
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn list(&self, queue: Option<QueueName>) -> Result<Vec<Command>> {
        let rows = match queue {
            Some(queue) => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM command_requests WHERE queue = ? ORDER BY priority ASC, seq ASC"
                ))
                .bind(queue.as_str())
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM command_requests ORDER BY queue ASC, priority ASC, seq ASC"
                ))
                .fetch_all(self.db.pool())
                .await?
            }
        };
        Ok(rows_to_commands(&rows))
    }

    async fn clear(&self, queue: QueueName) -> Result<usize> {
        let result = sqlx::query("DELETE FROM command_requests WHERE queue = ?")
            .bind(queue.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or_default())
    }
}
