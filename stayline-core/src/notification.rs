use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking::BookingStatus;

/// User-facing consequence of an event, handed to a pluggable sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Owner side: a new request landed for one of their properties.
    RequestReceived {
        booking_id: Uuid,
        owner_id: Uuid,
        property_name: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
    },
    /// Traveler or owner side: a booking's status changed remotely.
    StatusChanged {
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivery channel for notifications. Production deployments plug in
/// email/push; the default sink writes structured logs.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Sink that records notifications in the service log.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::RequestReceived {
                booking_id,
                owner_id,
                property_name,
                check_in,
                check_out,
                guests,
            } => {
                tracing::info!(
                    %booking_id,
                    %owner_id,
                    property = %property_name,
                    %check_in,
                    %check_out,
                    guests,
                    "new booking request received"
                );
            }
            Notification::StatusChanged { booking_id, status, reason } => {
                tracing::info!(
                    %booking_id,
                    status = %status,
                    reason = reason.as_deref().unwrap_or(""),
                    "booking status updated"
                );
            }
        }
        Ok(())
    }
}
