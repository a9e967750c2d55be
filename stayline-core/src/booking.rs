use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle status. Wire and database representation is the
/// SCREAMING_SNAKE_CASE string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "ACCEPTED" => Ok(BookingStatus::Accepted),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Traveler,
    Owner,
    /// Scheduled jobs, e.g. the completion sweeper.
    System,
    /// A status observed from the wire; the remote side already enforced
    /// actorship, so it may perform any transition the table permits.
    Remote,
}

/// Recorded on the booking when it is cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancelActor {
    Traveler,
    Owner,
}

impl CancelActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelActor::Traveler => "traveler",
            CancelActor::Owner => "owner",
        }
    }
}

impl std::str::FromStr for CancelActor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traveler" => Ok(CancelActor::Traveler),
            "owner" => Ok(CancelActor::Owner),
            other => Err(format!("unknown cancel actor: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    /// The booking is already at the target status. Consumers treat this
    /// as a redelivery no-op rather than a failure.
    #[error("booking is already {0}")]
    AlreadyApplied(BookingStatus),
}

/// A reservation. The traveler side owns the record by convention; the
/// owner side holds a projection keyed by the same id, converging through
/// the event protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub property_id: Uuid,
    pub traveler_id: Uuid,
    pub owner_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    /// Minor currency units, computed by the requester before submission.
    pub total_price: i64,
    pub status: BookingStatus,
    pub cancelled_by: Option<CancelActor>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a fresh PENDING booking. Assumes admission has already
    /// validated dates, capacity and availability.
    pub fn create(
        property_id: Uuid,
        traveler_id: Uuid,
        owner_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
        total_price: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
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
        }
    }

    /// Apply a status transition if the table permits it for `actor`.
    /// On failure the booking is left untouched.
    pub fn transition(
        &mut self,
        target: BookingStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        if self.status == target {
            return Err(TransitionError::AlreadyApplied(target));
        }
        if !permitted(self.status, target, actor) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        if target == BookingStatus::Cancelled {
            self.cancelled_by = match actor {
                Actor::Traveler => Some(CancelActor::Traveler),
                Actor::Owner => Some(CancelActor::Owner),
                // A remote cancel carries no actor on the wire; the side
                // that performed it recorded the attribution.
                Actor::System | Actor::Remote => None,
            };
            self.cancelled_at = Some(Utc::now());
            self.cancellation_reason = reason;
        }

        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn permitted(from: BookingStatus, to: BookingStatus, actor: Actor) -> bool {
    use BookingStatus::*;

    let remote = actor == Actor::Remote;
    match (from, to) {
        (Pending, Accepted) => remote || actor == Actor::Owner,
        (Pending, Rejected) => remote || actor == Actor::Owner,
        (Pending, Cancelled) => remote || actor == Actor::Traveler,
        (Accepted, Cancelled) => {
            remote || actor == Actor::Traveler || actor == Actor::Owner
        }
        (Accepted, Completed) => remote || actor == Actor::System,
        _ => false,
    }
}
