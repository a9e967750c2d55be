//! End-to-end protocol scenarios over in-memory stores: each side owns
//! its own booking store, and the broker is simulated by handing the
//! serialized event payloads to the other side's handler in publish
//! order.

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use stayline_core::admission::{AdmissionController, AdmissionError, BookingRequest};
use stayline_core::booking::{Actor, Booking, BookingStatus};
use stayline_core::events::{BookingEvent, EventHandler, HandlerOutcome};
use stayline_core::memory::{InMemoryBookings, InMemoryProperties, RecordingSink};
use stayline_core::notifier::StatusNotifier;
use stayline_core::projector::RequestProjector;
use stayline_core::property::Property;
use stayline_core::repository::BookingStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    property: Property,
    traveler_bookings: Arc<InMemoryBookings>,
    traveler_properties: Arc<InMemoryProperties>,
    traveler_sink: Arc<RecordingSink>,
    traveler_notifier: StatusNotifier,
    owner_bookings: Arc<InMemoryBookings>,
    owner_sink: Arc<RecordingSink>,
    owner_projector: RequestProjector,
    owner_notifier: StatusNotifier,
}

impl Harness {
    async fn new() -> Self {
        let property = Property {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Seaside Cottage".to_string(),
            max_guests: 4,
            available: true,
        };

        let traveler_bookings = Arc::new(InMemoryBookings::default());
        let traveler_properties = Arc::new(InMemoryProperties::default());
        traveler_properties.put(property.clone()).await;
        let traveler_sink = Arc::new(RecordingSink::default());
        let traveler_notifier =
            StatusNotifier::new(traveler_bookings.clone(), traveler_sink.clone());

        let owner_bookings = Arc::new(InMemoryBookings::default());
        let owner_sink = Arc::new(RecordingSink::default());
        let owner_projector =
            RequestProjector::new(owner_bookings.clone(), owner_sink.clone());
        let owner_notifier = StatusNotifier::new(owner_bookings.clone(), owner_sink.clone());

        Self {
            property,
            traveler_bookings,
            traveler_properties,
            traveler_sink,
            traveler_notifier,
            owner_bookings,
            owner_sink,
            owner_projector,
            owner_notifier,
        }
    }

    fn admission(&self) -> AdmissionController {
        AdmissionController::new(
            self.traveler_properties.clone(),
            self.traveler_bookings.clone(),
        )
    }

    /// Traveler-side create: admission, persist, return the request event
    /// payload that would go out through the outbox.
    async fn create_booking(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
    ) -> Result<(Booking, Vec<u8>), AdmissionError> {
        let request = BookingRequest {
            property_id: self.property.id,
            check_in,
            check_out,
            guests,
        };
        let property = self.admission().admit(&request, date(2030, 1, 1)).await?;

        let booking = Booking::create(
            property.id,
            Uuid::new_v4(),
            property.owner_id,
            check_in,
            check_out,
            guests,
            60_000,
        );
        self.traveler_bookings.insert(&booking).await.unwrap();

        let event = BookingEvent::requested(&booking, &property);
        Ok((booking, serde_json::to_vec(&event).unwrap()))
    }

    /// Owner-side transition: state machine + the update event payload.
    async fn owner_transition(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
        reason: Option<String>,
    ) -> Vec<u8> {
        let mut booking = self.owner_bookings.find(booking_id).await.unwrap().unwrap();
        booking.transition(target, Actor::Owner, reason.clone()).unwrap();
        self.owner_bookings.update(&booking).await.unwrap();
        serde_json::to_vec(&BookingEvent::status_updated(&booking, reason)).unwrap()
    }
}

#[tokio::test]
async fn request_approval_round_trip_converges() {
    let h = Harness::new().await;

    // Traveler creates a booking; it starts PENDING.
    let (booking, request_payload) = h
        .create_booking(date(2030, 6, 1), date(2030, 6, 4), 2)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    // The request event reaches the owner side and is projected.
    assert_eq!(
        h.owner_projector.handle(&request_payload).await,
        HandlerOutcome::Ack
    );
    let projected = h.owner_bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(projected.status, BookingStatus::Pending);
    assert_eq!(h.owner_sink.delivered().await.len(), 1);

    // The owner approves; the update event flows back.
    let update_payload = h
        .owner_transition(booking.id, BookingStatus::Accepted, None)
        .await;
    assert_eq!(
        h.traveler_notifier.handle(&update_payload).await,
        HandlerOutcome::Ack
    );

    let converged = h.traveler_bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(converged.status, BookingStatus::Accepted);
    assert_eq!(h.traveler_sink.delivered().await.len(), 1);
}

#[tokio::test]
async fn overlapping_request_is_rejected_while_first_is_pending() {
    let h = Harness::new().await;

    h.create_booking(date(2030, 6, 1), date(2030, 6, 4), 2)
        .await
        .unwrap();

    let err = h
        .create_booking(date(2030, 6, 3), date(2030, 6, 6), 2)
        .await
        .unwrap_err();
    assert_eq!(err, AdmissionError::DateConflict);

    // Back-to-back with the first stay is allowed.
    assert!(h
        .create_booking(date(2030, 6, 4), date(2030, 6, 7), 2)
        .await
        .is_ok());
}

#[tokio::test]
async fn ordered_updates_settle_on_the_last_status() {
    let h = Harness::new().await;

    let (booking, request_payload) = h
        .create_booking(date(2030, 6, 1), date(2030, 6, 4), 2)
        .await
        .unwrap();
    h.owner_projector.handle(&request_payload).await;

    let accepted = h
        .owner_transition(booking.id, BookingStatus::Accepted, None)
        .await;
    let cancelled = h
        .owner_transition(
            booking.id,
            BookingStatus::Cancelled,
            Some("plumbing failure".to_string()),
        )
        .await;

    // Same partition key, so the consumer sees them in publish order.
    assert_eq!(h.traveler_notifier.handle(&accepted).await, HandlerOutcome::Ack);
    assert_eq!(h.traveler_notifier.handle(&cancelled).await, HandlerOutcome::Ack);

    let final_state = h.traveler_bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(final_state.status, BookingStatus::Cancelled);
    assert_eq!(h.traveler_sink.delivered().await.len(), 2);
}

#[tokio::test]
async fn update_arriving_before_projection_retries_until_create_lands() {
    let h = Harness::new().await;

    let (booking, request_payload) = h
        .create_booking(date(2030, 6, 1), date(2030, 6, 4), 2)
        .await
        .unwrap();

    // Cross-topic race: the owner-side update consumer sees a status
    // event for a booking the request consumer has not projected yet.
    let mut phantom = booking.clone();
    phantom.transition(BookingStatus::Cancelled, Actor::Traveler, None).unwrap();
    let update_payload =
        serde_json::to_vec(&BookingEvent::status_updated(&phantom, None)).unwrap();

    assert_eq!(
        h.owner_notifier.handle(&update_payload).await,
        HandlerOutcome::Retry
    );

    // Once the causal predecessor arrives, the redelivery applies.
    h.owner_projector.handle(&request_payload).await;
    assert_eq!(
        h.owner_notifier.handle(&update_payload).await,
        HandlerOutcome::Ack
    );
    let projected = h.owner_bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(projected.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn own_update_echoed_back_is_a_noop() {
    let h = Harness::new().await;

    let (booking, request_payload) = h
        .create_booking(date(2030, 6, 1), date(2030, 6, 4), 2)
        .await
        .unwrap();
    h.owner_projector.handle(&request_payload).await;

    let update_payload = h
        .owner_transition(booking.id, BookingStatus::Accepted, None)
        .await;

    // Both groups receive the update; the owner's own consumer finds the
    // projection already ACCEPTED and acks without another notification.
    let sink_before = h.owner_sink.delivered().await.len();
    assert_eq!(
        h.owner_notifier.handle(&update_payload).await,
        HandlerOutcome::Ack
    );
    assert_eq!(h.owner_sink.delivered().await.len(), sink_before);

    assert_eq!(
        h.traveler_notifier.handle(&update_payload).await,
        HandlerOutcome::Ack
    );
    let converged = h.traveler_bookings.find(booking.id).await.unwrap().unwrap();
    assert_eq!(converged.status, BookingStatus::Accepted);
}
