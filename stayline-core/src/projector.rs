use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::events::{BookingEvent, EventHandler, HandlerOutcome};
use crate::notification::{Notification, NotificationSink};
use crate::repository::BookingStore;

/// Owner-side handler for `booking-requested` events: materializes the
/// local projection of the booking and notifies the owner. Insert is
/// keyed by booking id, so redeliveries are no-ops.
pub struct RequestProjector {
    bookings: Arc<dyn BookingStore>,
    sink: Arc<dyn NotificationSink>,
}

impl RequestProjector {
    pub fn new(bookings: Arc<dyn BookingStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { bookings, sink }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_request(
        &self,
        booking_id: Uuid,
        property_id: Uuid,
        property_name: String,
        traveler_id: Uuid,
        owner_id: Uuid,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        guests: i32,
        total_price: i64,
    ) -> HandlerOutcome {
        if check_out <= check_in || guests <= 0 || total_price < 0 {
            warn!(%booking_id, "dropping booking request with invalid fields");
            return HandlerOutcome::Drop;
        }

        let now = Utc::now();
        let projection = Booking {
            id: booking_id,
            property_id,
            traveler_id,
            owner_id,
            check_in,
            check_out,
            guests,
            total_price,
            status: BookingStatus::Pending,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        match self.bookings.insert_if_absent(&projection).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%booking_id, "booking request already projected");
                return HandlerOutcome::Ack;
            }
            Err(e) => {
                error!(%booking_id, error = %e, "failed to project booking request");
                return HandlerOutcome::Retry;
            }
        }

        if let Err(e) = self
            .sink
            .deliver(Notification::RequestReceived {
                booking_id,
                owner_id,
                property_name,
                check_in,
                check_out,
                guests,
            })
            .await
        {
            error!(%booking_id, error = %e, "owner notification delivery failed");
        }

        HandlerOutcome::Ack
    }
}

#[async_trait]
impl EventHandler for RequestProjector {
    async fn handle(&self, payload: &[u8]) -> HandlerOutcome {
        match serde_json::from_slice::<BookingEvent>(payload) {
            Ok(BookingEvent::Requested {
                booking_id,
                property_id,
                property_name,
                traveler_id,
                owner_id,
                check_in,
                check_out,
                guests,
                total_price,
                ..
            }) => {
                self.on_request(
                    booking_id,
                    property_id,
                    property_name,
                    traveler_id,
                    owner_id,
                    check_in,
                    check_out,
                    guests,
                    total_price,
                )
                .await
            }
            Ok(other) => {
                warn!(key = %other.key(), "unexpected event on requests topic, dropping");
                HandlerOutcome::Drop
            }
            Err(e) => {
                warn!(error = %e, "malformed event payload, dropping");
                HandlerOutcome::Drop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryBookings, RecordingSink};
    use crate::property::Property;
    use chrono::NaiveDate;

    fn event() -> (BookingEvent, Uuid) {
        let property = Property {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Harbor Loft".to_string(),
            max_guests: 3,
            available: true,
        };
        let booking = Booking::create(
            property.id,
            Uuid::new_v4(),
            property.owner_id,
            NaiveDate::from_ymd_opt(2030, 7, 10).unwrap(),
            NaiveDate::from_ymd_opt(2030, 7, 12).unwrap(),
            2,
            28_000,
        );
        (BookingEvent::requested(&booking, &property), booking.id)
    }

    fn projector() -> (RequestProjector, Arc<InMemoryBookings>, Arc<RecordingSink>) {
        let bookings = Arc::new(InMemoryBookings::default());
        let sink = Arc::new(RecordingSink::default());
        let projector = RequestProjector::new(bookings.clone(), sink.clone());
        (projector, bookings, sink)
    }

    #[tokio::test]
    async fn projects_request_and_notifies_owner() {
        let (projector, bookings, sink) = projector();
        let (event, booking_id) = event();
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(projector.handle(&payload).await, HandlerOutcome::Ack);

        let stored = bookings.find(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn redelivered_request_is_a_noop() {
        let (projector, bookings, sink) = projector();
        let (event, booking_id) = event();
        let payload = serde_json::to_vec(&event).unwrap();

        assert_eq!(projector.handle(&payload).await, HandlerOutcome::Ack);
        assert_eq!(projector.handle(&payload).await, HandlerOutcome::Ack);

        assert!(bookings.find(booking_id).await.unwrap().is_some());
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn redelivery_does_not_clobber_a_progressed_projection() {
        let (projector, bookings, sink) = projector();
        let (event, booking_id) = event();
        let payload = serde_json::to_vec(&event).unwrap();
        projector.handle(&payload).await;

        let mut stored = bookings.find(booking_id).await.unwrap().unwrap();
        stored
            .transition(BookingStatus::Accepted, crate::booking::Actor::Owner, None)
            .unwrap();
        bookings.update(&stored).await.unwrap();

        assert_eq!(projector.handle(&payload).await, HandlerOutcome::Ack);
        let after = bookings.find(booking_id).await.unwrap().unwrap();
        assert_eq!(after.status, BookingStatus::Accepted);
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_fields_are_dropped() {
        let (projector, bookings, _) = projector();
        let raw = serde_json::json!({
            "type": "booking-requested",
            "bookingId": Uuid::new_v4(),
            "propertyId": Uuid::new_v4(),
            "propertyName": "Backwards Inn",
            "travelerId": Uuid::new_v4(),
            "ownerId": Uuid::new_v4(),
            "checkIn": "2030-07-12",
            "checkOut": "2030-07-10",
            "guests": 2,
            "totalPrice": 1000,
            "timestamp": "2030-07-01T00:00:00Z",
        });
        let payload = serde_json::to_vec(&raw).unwrap();
        assert_eq!(projector.handle(&payload).await, HandlerOutcome::Drop);
        assert!(bookings
            .list_for_owner(Uuid::nil(), None)
            .await
            .unwrap()
            .is_empty());
    }
}
