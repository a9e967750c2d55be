use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::property::Property;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The store rejected a write that would violate the no-overlap
    /// guard (exclusion constraint on active bookings).
    #[error("booking dates conflict with an existing booking")]
    Conflict,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Repository trait for property lookups
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, StoreError>;
}

/// Repository trait for booking records
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Insert only if no booking with this id exists yet. Returns whether
    /// a row was written; used by the owner-side projector to stay
    /// idempotent under redelivery.
    async fn insert_if_absent(&self, booking: &Booking) -> Result<bool, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn update(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Bookings for the property whose `[check_in, check_out)` interval
    /// overlaps the given half-open range, restricted to PENDING and
    /// ACCEPTED.
    async fn find_active_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_for_traveler(
        &self,
        traveler_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_for_owner(
        &self,
        owner_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// ACCEPTED bookings whose stay has ended (check_out on or before
    /// `today`), due for the completion sweep.
    async fn find_completable(&self, today: NaiveDate) -> Result<Vec<Booking>, StoreError>;
}
