use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use stayline_core::booking::{Actor, Booking, BookingStatus};
use stayline_core::events::BookingEvent;
use stayline_core::repository::BookingStore;

use crate::auth::authenticate;
use crate::bookings::{parse_status_filter, CancelBody};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/owner/bookings", get(list_bookings))
        .route("/v1/owner/bookings/{id}/approve", put(approve_booking))
        .route("/v1/owner/bookings/{id}/reject", put(reject_booking))
        .route("/v1/owner/bookings/{id}/cancel", put(cancel_booking))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let status = parse_status_filter(params.status)?;
    let bookings = state.bookings.list_for_owner(user.id, status).await?;
    Ok(Json(bookings))
}

/// Shared owner-side transition: load, check ownership, run the state
/// machine, persist together with the status event.
async fn transition_owned(
    state: &AppState,
    owner_id: Uuid,
    booking_id: Uuid,
    target: BookingStatus,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let mut booking = state
        .bookings
        .find(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.owner_id != owner_id {
        return Err(AppError::Authorization("booking does not belong to your properties".to_string()));
    }

    booking.transition(target, Actor::Owner, reason.clone())?;

    let event = BookingEvent::status_updated(&booking, reason);
    state
        .bookings
        .update_with_event(&booking, &state.topics.updates, &event)
        .await?;

    info!(%booking_id, status = %booking.status, "owner updated booking");
    Ok(booking)
}

async fn approve_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let booking =
        transition_owned(&state, user.id, id, BookingStatus::Accepted, None).await?;
    Ok(Json(booking))
}

async fn reject_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Booking>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let booking =
        transition_owned(&state, user.id, id, BookingStatus::Rejected, body.reason).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Booking>, AppError> {
    let user = authenticate(&state.auth.secret, bearer.token())?;
    let booking =
        transition_owned(&state, user.id, id, BookingStatus::Cancelled, body.reason).await?;
    Ok(Json(booking))
}
