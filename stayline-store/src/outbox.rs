use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use stayline_core::events::BookingEvent;
use stayline_core::repository::StoreError;

/// A pending outbox row: the serialized event plus its routing metadata.
#[derive(Debug, sqlx::FromRow)]
pub struct OutboxRow {
    pub id: i64,
    pub topic: String,
    pub partition_key: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Durable outbox for domain events. Rows are written in the same
/// transaction as the state change they announce and drained by the
/// dispatcher, so a broker outage delays publication instead of losing it.
#[derive(Clone)]
pub struct OutboxRepository {
    pool: Pool<Postgres>,
}

impl OutboxRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Enqueue an event inside the caller's transaction.
    pub async fn enqueue(
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        event: &BookingEvent,
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_value(event).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO booking_outbox (topic, partition_key, payload) VALUES ($1, $2, $3)",
        )
        .bind(topic)
        .bind(event.key())
        .bind(payload)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Undispatched, not-dead rows in insertion order. Insertion order is
    /// publish order, which keeps per-booking events ordered on the wire.
    pub async fn pending(&self, limit: i64) -> Result<Vec<OutboxRow>, StoreError> {
        sqlx::query_as::<_, OutboxRow>(
            "SELECT id, topic, partition_key, payload, attempts, created_at \
             FROM booking_outbox \
             WHERE dispatched_at IS NULL AND NOT dead \
             ORDER BY id ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub async fn mark_dispatched(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE booking_outbox SET dispatched_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Count a failed publish; park the row dead once it has exhausted
    /// `max_attempts`. Returns whether the row is now dead.
    pub async fn record_failure(&self, id: i64, max_attempts: i32) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as(
            "UPDATE booking_outbox \
             SET attempts = attempts + 1, dead = (attempts + 1 >= $2) \
             WHERE id = $1 RETURNING dead",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.0)
    }
}
