//! In-memory store and sink implementations, used by tests and local
//! demos in place of Postgres and a real delivery channel.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::admission::overlaps;
use crate::booking::{Booking, BookingStatus};
use crate::notification::{Notification, NotificationSink, NotifyError};
use crate::property::Property;
use crate::repository::{BookingStore, PropertyStore, StoreError};

#[derive(Default)]
pub struct InMemoryProperties {
    properties: RwLock<HashMap<Uuid, Property>>,
}

impl InMemoryProperties {
    pub async fn put(&self, property: Property) {
        self.properties.write().await.insert(property.id, property);
    }
}

#[async_trait]
impl PropertyStore for InMemoryProperties {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        Ok(self.properties.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryBookings {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookings {
    fn is_active(status: BookingStatus) -> bool {
        matches!(status, BookingStatus::Pending | BookingStatus::Accepted)
    }

    fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

#[async_trait]
impl BookingStore for InMemoryBookings {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        // Mirror the exclusion constraint the SQL store enforces.
        let conflict = bookings.values().any(|existing| {
            existing.property_id == booking.property_id
                && Self::is_active(existing.status)
                && overlaps(
                    existing.check_in,
                    existing.check_out,
                    booking.check_in,
                    booking.check_out,
                )
        });
        if conflict && Self::is_active(booking.status) {
            return Err(StoreError::Conflict);
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, booking: &Booking) -> Result<bool, StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Ok(false);
        }
        bookings.insert(booking.id, booking.clone());
        Ok(true)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        if !bookings.contains_key(&booking.id) {
            return Err(StoreError::NotFound);
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_active_overlapping(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| {
                b.property_id == property_id
                    && Self::is_active(b.status)
                    && overlaps(b.check_in, b.check_out, check_in, check_out)
            })
            .cloned()
            .collect())
    }

    async fn list_for_traveler(
        &self,
        traveler_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(Self::newest_first(
            bookings
                .values()
                .filter(|b| b.traveler_id == traveler_id)
                .filter(|b| status.is_none_or(|s| b.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_owner(
        &self,
        owner_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(Self::newest_first(
            bookings
                .values()
                .filter(|b| b.owner_id == owner_id)
                .filter(|b| status.is_none_or(|s| b.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn find_completable(&self, today: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.status == BookingStatus::Accepted && b.check_out <= today)
            .cloned()
            .collect())
    }
}

/// Records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.delivered.lock().await.push(notification);
        Ok(())
    }
}
