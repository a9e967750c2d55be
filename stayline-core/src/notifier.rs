use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::booking::{Actor, BookingStatus, TransitionError};
use crate::events::{BookingEvent, EventHandler, HandlerOutcome};
use crate::notification::{Notification, NotificationSink};
use crate::repository::BookingStore;

/// Applies remotely observed status updates to the local booking
/// projection and emits one notification per effective change.
///
/// Idempotency key is `(booking_id, status)`: a projection already at the
/// target status acks the redelivery without re-notifying. A missing
/// projection is a causal gap (the create may still be in flight on the
/// other topic) and is retried, not dropped.
pub struct StatusNotifier {
    bookings: Arc<dyn BookingStore>,
    sink: Arc<dyn NotificationSink>,
}

impl StatusNotifier {
    pub fn new(bookings: Arc<dyn BookingStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { bookings, sink }
    }

    pub async fn on_status_update(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> HandlerOutcome {
        let mut booking = match self.bookings.find(booking_id).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                warn!(%booking_id, "status update for unknown booking, retrying");
                return HandlerOutcome::Retry;
            }
            Err(e) => {
                error!(%booking_id, error = %e, "failed to load booking projection");
                return HandlerOutcome::Retry;
            }
        };

        match booking.transition(status, Actor::Remote, reason.clone()) {
            Ok(()) => {}
            Err(TransitionError::AlreadyApplied(_)) => {
                debug!(%booking_id, status = %status, "duplicate status update, already applied");
                return HandlerOutcome::Ack;
            }
            Err(TransitionError::InvalidTransition { from, to }) => {
                // Retrying cannot make a forbidden transition valid.
                warn!(%booking_id, %from, %to, "dropping invalid remote transition");
                return HandlerOutcome::Drop;
            }
        }

        if let Err(e) = self.bookings.update(&booking).await {
            error!(%booking_id, error = %e, "failed to persist status update");
            return HandlerOutcome::Retry;
        }

        // Best-effort: the projection is already durable, so a sink
        // failure is logged rather than forcing a redelivery that the
        // idempotency check would skip anyway.
        if let Err(e) = self
            .sink
            .deliver(Notification::StatusChanged { booking_id, status, reason })
            .await
        {
            error!(%booking_id, error = %e, "notification delivery failed");
        }

        HandlerOutcome::Ack
    }
}

#[async_trait]
impl EventHandler for StatusNotifier {
    async fn handle(&self, payload: &[u8]) -> HandlerOutcome {
        match serde_json::from_slice::<BookingEvent>(payload) {
            Ok(BookingEvent::StatusUpdated { booking_id, status, reason, .. }) => {
                self.on_status_update(booking_id, status, reason).await
            }
            Ok(other) => {
                warn!(key = %other.key(), "unexpected event on updates topic, dropping");
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
    use crate::booking::Booking;
    use crate::memory::{InMemoryBookings, RecordingSink};
    use chrono::NaiveDate;

    fn pending_booking() -> Booking {
        Booking::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 6, 4).unwrap(),
            2,
            45_000,
        )
    }

    fn notifier() -> (StatusNotifier, Arc<InMemoryBookings>, Arc<RecordingSink>) {
        let bookings = Arc::new(InMemoryBookings::default());
        let sink = Arc::new(RecordingSink::default());
        let notifier = StatusNotifier::new(bookings.clone(), sink.clone());
        (notifier, bookings, sink)
    }

    #[tokio::test]
    async fn applies_update_and_notifies_once() {
        let (notifier, bookings, sink) = notifier();
        let booking = pending_booking();
        bookings.insert(&booking).await.unwrap();

        let outcome = notifier
            .on_status_update(booking.id, BookingStatus::Accepted, None)
            .await;
        assert_eq!(outcome, HandlerOutcome::Ack);

        let stored = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_a_single_notification() {
        let (notifier, bookings, sink) = notifier();
        let booking = pending_booking();
        bookings.insert(&booking).await.unwrap();

        for _ in 0..2 {
            let outcome = notifier
                .on_status_update(booking.id, BookingStatus::Accepted, None)
                .await;
            assert_eq!(outcome, HandlerOutcome::Ack);
        }

        let stored = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_booking_requests_retry() {
        let (notifier, _, sink) = notifier();
        let outcome = notifier
            .on_status_update(Uuid::new_v4(), BookingStatus::Accepted, None)
            .await;
        assert_eq!(outcome, HandlerOutcome::Retry);
        assert!(sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_remote_transition_is_dropped() {
        let (notifier, bookings, _) = notifier();
        let mut booking = pending_booking();
        booking
            .transition(BookingStatus::Rejected, Actor::Owner, None)
            .unwrap();
        bookings.insert(&booking).await.unwrap();

        let outcome = notifier
            .on_status_update(booking.id, BookingStatus::Accepted, None)
            .await;
        assert_eq!(outcome, HandlerOutcome::Drop);
        let stored = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Rejected);
    }

    #[tokio::test]
    async fn ordered_updates_end_in_last_status() {
        let (notifier, bookings, sink) = notifier();
        let booking = pending_booking();
        bookings.insert(&booking).await.unwrap();

        notifier
            .on_status_update(booking.id, BookingStatus::Accepted, None)
            .await;
        notifier
            .on_status_update(booking.id, BookingStatus::Cancelled, Some("owner emergency".into()))
            .await;

        let stored = bookings.find(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(sink.delivered().await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        let (notifier, _, _) = notifier();
        assert_eq!(notifier.handle(b"not-json").await, HandlerOutcome::Drop);
        assert_eq!(
            notifier.handle(br#"{"type":"mystery-event"}"#).await,
            HandlerOutcome::Drop
        );
    }
}
