use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use riptide_booking::ReservationRequest;
use riptide_core::payment::PaymentIntent;
use riptide_shared::{Booking, Contact};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, middleware::MaybeClaims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub participants: i32,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub special_requests: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/payment-intent", post(create_payment_intent))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let special_requests = req.special_requests.filter(|s| !s.trim().is_empty());

    let booking = state
        .coordinator
        .reserve(ReservationRequest {
            tour_id: req.tour_id,
            date: req.date,
            time: req.time,
            participants: req.participants,
            contact: Contact::new(req.customer_email, req.customer_name, req.customer_phone),
            customer_id: claims.as_ref().and_then(|c| c.customer_id()),
            special_requests,
        })
        .await?;

    info!(booking_id = %booking.id, "reservation accepted");
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings
/// Bookings made with the caller's customer token
async fn my_bookings(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
) -> Result<Json<Vec<Booking>>, AppError> {
    let customer_id = claims
        .and_then(|c| c.customer_id())
        .ok_or_else(|| AppError::Unauthorized("A customer token is required".to_string()))?;
    Ok(Json(state.ledger().list_for_customer(customer_id).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.ledger().get(id).await?;
    authorize(&booking, claims.as_ref())?;
    Ok(Json(booking))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.ledger().get(id).await?;
    authorize(&booking, claims.as_ref())?;
    Ok(Json(state.coordinator.cancel(id).await?))
}

/// POST /v1/bookings/{id}/payment-intent
async fn create_payment_intent(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentIntent>, AppError> {
    let booking = state.ledger().get(id).await?;
    authorize(&booking, claims.as_ref())?;
    Ok(Json(state.payments.initialize_payment(id).await?))
}

/// Bookings tied to a customer are only visible to that customer and staff.
/// Guest bookings are reachable by anyone holding the booking id.
fn authorize(booking: &Booking, claims: Option<&crate::middleware::Claims>) -> Result<(), AppError> {
    let Some(owner) = booking.customer_id else {
        return Ok(());
    };
    match claims {
        Some(c) if c.role.can_manage() || c.customer_id() == Some(owner) => Ok(()),
        Some(_) => Err(AppError::Forbidden("Booking belongs to another customer".to_string())),
        None => Err(AppError::Unauthorized("Sign in to access this booking".to_string())),
    }
}
