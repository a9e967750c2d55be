use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use stayline_core::booking::{Booking, BookingStatus, CancelActor};
use stayline_core::events::BookingEvent;
use stayline_core::repository::{BookingStore, StoreError};

use crate::outbox::OutboxRepository;

const BOOKING_COLUMNS: &str = "id, property_id, traveler_id, owner_id, check_in, check_out, \
     guests, total_price, status, cancelled_by, cancelled_at, cancellation_reason, \
     created_at, updated_at";

#[derive(Clone)]
pub struct BookingRepository {
    pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    property_id: Uuid,
    traveler_id: Uuid,
    owner_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: i32,
    total_price: i64,
    status: String,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, StoreError> {
        let status: BookingStatus = row.status.parse().map_err(StoreError::Backend)?;
        let cancelled_by = row
            .cancelled_by
            .map(|s| s.parse::<CancelActor>())
            .transpose()
            .map_err(StoreError::Backend)?;
        Ok(Booking {
            id: row.id,
            property_id: row.property_id,
            traveler_id: row.traveler_id,
            owner_id: row.owner_id,
            check_in: row.check_in,
            check_out: row.check_out,
            guests: row.guests,
            total_price: row.total_price,
            status,
            cancelled_by,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Maps constraint violations to `Conflict` so the overlap guard surfaces
/// as a date conflict, not a generic server error. 23P01 is Postgres's
/// exclusion_violation, 23505 unique_violation.
fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code == "23P01" || code == "23505" {
                return StoreError::Conflict;
            }
        }
    }
    StoreError::Backend(e.to_string())
}

impl BookingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn insert_in<'e, E>(executor: E, booking: &Booking) -> Result<u64, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "INSERT INTO bookings (id, property_id, traveler_id, owner_id, check_in, check_out, \
             guests, total_price, status, cancelled_by, cancelled_at, cancellation_reason, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(booking.id)
        .bind(booking.property_id)
        .bind(booking.traveler_id)
        .bind(booking.owner_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.guests)
        .bind(booking.total_price)
        .bind(booking.status.as_str())
        .bind(booking.cancelled_by.map(|a| a.as_str()))
        .bind(booking.cancelled_at)
        .bind(booking.cancellation_reason.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(executor)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn update_in<'e, E>(executor: E, booking: &Booking) -> Result<u64, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, cancelled_by = $3, cancelled_at = $4, \
             cancellation_reason = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.cancelled_by.map(|a| a.as_str()))
        .bind(booking.cancelled_at)
        .bind(booking.cancellation_reason.as_deref())
        .bind(booking.updated_at)
        .execute(executor)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Persist a new booking and enqueue its event in one transaction, so
    /// nothing is ever announced that was not durably written.
    pub async fn create_with_event(
        &self,
        booking: &Booking,
        topic: &str,
        event: &BookingEvent,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        Self::insert_in(&mut *tx, booking).await?;
        OutboxRepository::enqueue(&mut tx, topic, event).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    /// Persist a status transition and enqueue the corresponding
    /// `booking-status-updated` event in one transaction.
    pub async fn update_with_event(
        &self,
        booking: &Booking,
        topic: &str,
        event: &BookingEvent,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let updated = Self::update_in(&mut *tx, booking).await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        OutboxRepository::enqueue(&mut tx, topic, event).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    fn collect(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[async_trait]
impl BookingStore for BookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        Self::insert_in(&self.pool, booking).await?;
        Ok(())
    }

    async fn insert_if_absent(&self, booking: &Booking) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO bookings (id, property_id, traveler_id, owner_id, check_in, check_out, \
             guests, total_price, status, cancelled_by, cancelled_at, cancellation_reason, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(booking.id)
        .bind(booking.property_id)
        .bind(booking.traveler_id)
        .bind(booking.owner_id)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.guests)
        .bind(booking.total_price)
        .bind(booking.status.as_str())
        .bind(booking.cancelled_by.map(|a| a.as_str()))
        .bind(booking.cancelled_at)
        .bind(booking.cancellation_reason.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Booking::try_from).transpose()
    }

    async fn update(&self, booking: &Booking) -> Result<(), StoreError> {
        let updated = Self::update_in(&self.pool, booking).await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_active_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE property_id = $1 \
             AND status IN ('PENDING', 'ACCEPTED') \
             AND check_in < $3 AND check_out > $2",
            BOOKING_COLUMNS
        ))
        .bind(property_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Self::collect(rows)
    }

    async fn list_for_traveler(
        &self,
        traveler_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE traveler_id = $1 \
             AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(traveler_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Self::collect(rows)
    }

    async fn list_for_owner(
        &self,
        owner_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE owner_id = $1 \
             AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(owner_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Self::collect(rows)
    }

    async fn find_completable(&self, today: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = 'ACCEPTED' AND check_out <= $1",
            BOOKING_COLUMNS
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Self::collect(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_not_a_conflict() {
        let err = map_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn row_with_unknown_status_is_a_backend_error() {
        let row = BookingRow {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            traveler_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            check_in: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 6, 4).unwrap(),
            guests: 2,
            total_price: 45_000,
            status: "CONFIRMED".to_string(),
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(Booking::try_from(row), Err(StoreError::Backend(_))));
    }
}
