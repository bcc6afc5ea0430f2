use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use riptide_core::SlotKey;
use riptide_shared::models::availability::normalize_time_label;
use riptide_shared::{AvailabilitySlot, Booking, Tour, TourDraft, TourPatch};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{staff_auth_middleware, Claims},
    state::AppState,
};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub time_slots: Vec<String>,
    pub max_bookings_per_slot: i32,
    #[serde(default)]
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustSlotRequest {
    #[serde(default)]
    pub max_bookings_per_slot: Option<i32>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddTimeRequest {
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotBookingsQuery {
    pub date: NaiveDate,
    pub time: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/tours", post(create_tour).get(list_all_tours))
        .route("/v1/admin/tours/{id}", put(update_tour))
        .route("/v1/admin/tours/{id}/deactivate", post(deactivate_tour))
        .route(
            "/v1/admin/tours/{id}/availability/{date}",
            put(schedule_date).patch(adjust_date),
        )
        .route("/v1/admin/tours/{id}/availability/{date}/times", post(add_time))
        .route("/v1/admin/tours/{id}/availability/{date}/times/{time}", delete(remove_time))
        .route("/v1/admin/tours/{id}/bookings", get(slot_bookings))
        .route("/v1/admin/bookings/{id}/complete", post(complete_booking))
        .route_layer(middleware::from_fn_with_state(state, staff_auth_middleware))
}

// ============================================================================
// Tour Management Handlers
// ============================================================================

/// POST /v1/admin/tours
async fn create_tour(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(draft): Json<TourDraft>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    let tour = state.catalog.publish(draft).await?;
    info!(tour_id = %tour.id, by = %claims.sub, "tour created via admin api");
    Ok((StatusCode::CREATED, Json(tour)))
}

/// GET /v1/admin/tours
/// Every tour, including deactivated ones
async fn list_all_tours(State(state): State<AppState>) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.catalog.list_all_tours().await?))
}

/// PUT /v1/admin/tours/{id}
async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TourPatch>,
) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.catalog.edit(id, patch).await?))
}

/// POST /v1/admin/tours/{id}/deactivate
async fn deactivate_tour(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.catalog.deactivate(id).await?))
}

// ============================================================================
// Availability Handlers
// ============================================================================

/// PUT /v1/admin/tours/{id}/availability/{date}
/// Create or replace the departures of one date
async fn schedule_date(
    State(state): State<AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<AvailabilitySlot>, AppError> {
    let mut slot = state
        .availability
        .schedule(id, date, req.time_slots, req.max_bookings_per_slot)
        .await?;
    if let Some(is_available) = req.is_available {
        if is_available != slot.is_available {
            slot = state.availability.set_available(id, date, is_available).await?;
        }
    }
    state.coordinator.announce_schedule(id, date).await;
    Ok(Json(slot))
}

/// PATCH /v1/admin/tours/{id}/availability/{date}
async fn adjust_date(
    State(state): State<AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
    Json(req): Json<AdjustSlotRequest>,
) -> Result<Json<AvailabilitySlot>, AppError> {
    let mut slot = state.availability.get_slot(id, date).await?;
    if let Some(max) = req.max_bookings_per_slot {
        slot = state.availability.set_capacity(id, date, max).await?;
    }
    if let Some(is_available) = req.is_available {
        slot = state.availability.set_available(id, date, is_available).await?;
    }
    state.coordinator.announce_schedule(id, date).await;
    Ok(Json(slot))
}

/// POST /v1/admin/tours/{id}/availability/{date}/times
async fn add_time(
    State(state): State<AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
    Json(req): Json<AddTimeRequest>,
) -> Result<Json<AvailabilitySlot>, AppError> {
    let slot = state.availability.add_time(id, date, &req.time).await?;
    state.coordinator.announce_schedule(id, date).await;
    Ok(Json(slot))
}

/// DELETE /v1/admin/tours/{id}/availability/{date}/times/{time}
async fn remove_time(
    State(state): State<AppState>,
    Path((id, date, time)): Path<(Uuid, NaiveDate, String)>,
) -> Result<Json<AvailabilitySlot>, AppError> {
    let slot = state.availability.remove_time(id, date, &time).await?;
    state.coordinator.announce_schedule(id, date).await;
    Ok(Json(slot))
}

// ============================================================================
// Booking Handlers
// ============================================================================

/// GET /v1/admin/tours/{id}/bookings?date=&time=
/// Manifest for one departure, cancelled bookings included
async fn slot_bookings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let time = normalize_time_label(&query.time)
        .ok_or_else(|| AppError::Validation(format!("'{}' is not an HH:MM time", query.time)))?;
    let key = SlotKey::new(id, query.date, time);
    Ok(Json(state.ledger().list_for_slot(&key).await?))
}

/// POST /v1/admin/bookings/{id}/complete
async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.coordinator.complete(id).await?))
}
