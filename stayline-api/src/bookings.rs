use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use stayline_core::admission::BookingRequest;
use stayline_core::booking::{Actor, Booking, BookingStatus};
use stayline_core::events::BookingEvent;
use stayline_core::repository::BookingStore;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", put(cancel_booking))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub total_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub(crate) fn parse_status_filter(raw: Option<String>) -> Result<Option<BookingStatus>, AppError> {
    raw.map(|s| {
        s.to_uppercase()
            .parse::<BookingStatus>()
            .map_err(AppError::Validation)
    })
    .transpose()
}

async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;

    if body.total_price < 0 {
        return Err(AppError::Validation("total price must not be negative".to_string()));
    }

    let request = BookingRequest {
        property_id: body.property_id,
        check_in: body.check_in,
        check_out: body.check_out,
        guests: body.guests,
    };
    let property = state
        .admission
        .admit(&request, Utc::now().date_naive())
        .await?;

    let booking = Booking::create(
        body.property_id,
        user.id,
        property.owner_id,
        body.check_in,
        body.check_out,
        body.guests,
        body.total_price,
    );

    // The booking row and its booking-requested event commit together;
    // the dispatcher takes it to the broker from there.
    let event = BookingEvent::requested(&booking, &property);
    state
        .bookings
        .create_with_event(&booking, &state.topics.requests, &event)
        .await?;

    info!(booking_id = %booking.id, property_id = %booking.property_id, "booking created");
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let status = parse_status_filter(params.status)?;
    let bookings = state.bookings.list_for_traveler(user.id, status).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let booking = state
        .bookings
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.traveler_id != user.id && booking.owner_id != user.id {
        return Err(AppError::Authorization("booking does not belong to you".to_string()));
    }
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Booking>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let mut booking = state
        .bookings
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.traveler_id != user.id {
        return Err(AppError::Authorization("booking does not belong to you".to_string()));
    }

    booking.transition(BookingStatus::Cancelled, Actor::Traveler, body.reason.clone())?;

    let event = BookingEvent::status_updated(&booking, body.reason);
    state
        .bookings
        .update_with_event(&booking, &state.topics.updates, &event)
        .await?;

    info!(booking_id = %booking.id, "booking cancelled by traveler");
    Ok(Json(booking))
}
