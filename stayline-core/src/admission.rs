use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::property::Property;
use crate::repository::{BookingStore, PropertyStore, StoreError};

/// A booking request as seen by the admission gate.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AdmissionError {
    #[error("check-in must not be in the past and check-out must be after check-in")]
    InvalidRange,

    #[error("guest count must be positive")]
    InvalidGuests,

    #[error("property not found")]
    PropertyNotFound,

    #[error("property can accommodate at most {max} guests")]
    CapacityExceeded { max: i32 },

    #[error("property is not available for booking")]
    Unavailable,

    #[error("property is already booked for the selected dates")]
    DateConflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`. Back-to-back stays (checkout equals another
/// check-in) do not overlap.
pub fn overlaps(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Pre-commit gate for new booking requests. Read-only: a concurrent
/// request can pass this check for the same dates, so the store's
/// exclusion constraint remains the authoritative guard and callers must
/// still handle a conflict at persistence time.
pub struct AdmissionController {
    properties: Arc<dyn PropertyStore>,
    bookings: Arc<dyn BookingStore>,
}

impl AdmissionController {
    pub fn new(properties: Arc<dyn PropertyStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { properties, bookings }
    }

    /// Validate a request against dates, capacity, availability and
    /// existing active bookings. Returns the property so the caller can
    /// denormalize from it without a second lookup.
    pub async fn admit(
        &self,
        request: &BookingRequest,
        today: NaiveDate,
    ) -> Result<Property, AdmissionError> {
        if request.check_out <= request.check_in || request.check_in < today {
            return Err(AdmissionError::InvalidRange);
        }
        if request.guests <= 0 {
            return Err(AdmissionError::InvalidGuests);
        }

        let property = self
            .properties
            .find_property(request.property_id)
            .await?
            .ok_or(AdmissionError::PropertyNotFound)?;

        if !property.available {
            return Err(AdmissionError::Unavailable);
        }
        if request.guests > property.max_guests {
            return Err(AdmissionError::CapacityExceeded { max: property.max_guests });
        }

        let conflicting = self
            .bookings
            .find_active_overlapping(request.property_id, request.check_in, request.check_out)
            .await?;
        if !conflicting.is_empty() {
            return Err(AdmissionError::DateConflict);
        }

        Ok(property)
    }
}
