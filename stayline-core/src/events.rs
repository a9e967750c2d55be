use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::property::Property;

/// Events exchanged between the traveler and owner services. Discriminated
/// by the `type` field; field names are camelCase on the wire. Both
/// variants partition by booking id so status changes for one booking stay
/// ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BookingEvent {
    #[serde(rename = "booking-requested", rename_all = "camelCase")]
    Requested {
        booking_id: Uuid,
        property_id: Uuid,
        property_name: String,
        traveler_id: Uuid,
        owner_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
        total_price: i64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "booking-status-updated", rename_all = "camelCase")]
    StatusUpdated {
        booking_id: Uuid,
        status: BookingStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl BookingEvent {
    pub fn requested(booking: &Booking, property: &Property) -> Self {
        BookingEvent::Requested {
            booking_id: booking.id,
            property_id: booking.property_id,
            property_name: property.name.clone(),
            traveler_id: booking.traveler_id,
            owner_id: booking.owner_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            guests: booking.guests,
            total_price: booking.total_price,
            timestamp: Utc::now(),
        }
    }

    /// `reason` travels on the wire even for transitions that do not
    /// persist one locally (e.g. a rejection).
    pub fn status_updated(booking: &Booking, reason: Option<String>) -> Self {
        BookingEvent::StatusUpdated {
            booking_id: booking.id,
            status: booking.status,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Broker partition key.
    pub fn key(&self) -> String {
        match self {
            BookingEvent::Requested { booking_id, .. }
            | BookingEvent::StatusUpdated { booking_id, .. } => booking_id.to_string(),
        }
    }
}

/// What a consumer handler decided about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Processed; commit the read position.
    Ack,
    /// Transient failure; redeliver (bounded, then dead-letter).
    Retry,
    /// Unprocessable payload; advance without side effects.
    Drop,
}

/// Invoked by the consumer loop for every delivered message. Must be
/// idempotent: the broker is at-least-once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> HandlerOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_event_wire_shape() {
        let property = Property {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Seaside Cottage".to_string(),
            max_guests: 4,
            available: true,
        };
        let booking = Booking::create(
            property.id,
            Uuid::new_v4(),
            property.owner_id,
            NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 6, 4).unwrap(),
            2,
            45_000,
        );

        let event = BookingEvent::requested(&booking, &property);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(json["type"], "booking-requested");
        assert_eq!(json["bookingId"], booking.id.to_string());
        assert_eq!(json["propertyName"], "Seaside Cottage");
        assert_eq!(json["checkIn"], "2030-06-01");
        assert_eq!(json["totalPrice"], 45_000);
        assert_eq!(event.key(), booking.id.to_string());
    }

    #[test]
    fn status_updated_round_trip() {
        let event = BookingEvent::StatusUpdated {
            booking_id: Uuid::new_v4(),
            status: BookingStatus::Accepted,
            reason: None,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"booking-status-updated\""));
        assert!(json.contains("\"ACCEPTED\""));
        // reason is omitted entirely when absent
        assert!(!json.contains("reason"));

        let back: BookingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_type_fails_to_decode() {
        let raw = r#"{"type":"booking-archived","bookingId":"3fa85f64-5717-4562-b3fc-2c963f66afa6"}"#;
        assert!(serde_json::from_str::<BookingEvent>(raw).is_err());
    }
}
