use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use futures_util::stream::{Stream, StreamExt};
use riptide_catalog::CatalogError;
use riptide_shared::{AvailabilitySlot, TimeCapacity, Tour};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

const DEFAULT_WINDOW_DAYS: i64 = 30;
const MAX_WINDOW_DAYS: i64 = 366;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tours", get(list_tours))
        .route("/v1/tours/{id}", get(get_tour))
        .route("/v1/tours/{id}/availability", get(list_availability))
        .route("/v1/tours/{id}/availability/stream", get(stream_availability))
        .route("/v1/tours/{id}/availability/{date}", get(day_availability))
}

/// GET /v1/tours
async fn list_tours(State(state): State<AppState>) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.catalog.list_active_tours().await?))
}

/// GET /v1/tours/{id}
async fn get_tour(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Tour>, AppError> {
    Ok(Json(public_tour(&state, id).await?))
}

/// Active tour lookup for the public routes; a deactivated tour is not found.
async fn public_tour(state: &AppState, id: Uuid) -> Result<Tour, AppError> {
    state.catalog.get_active_tour(id).await.map_err(|e| match e {
        CatalogError::Inactive(id) => CatalogError::NotFound(id).into(),
        other => other.into(),
    })
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// GET /v1/tours/{id}/availability?from=&to=
/// Scheduled dates in a window, defaulting to the next 30 days
async fn list_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<AvailabilitySlot>>, AppError> {
    public_tour(&state, id).await?;

    let from = range.from.unwrap_or_else(|| Utc::now().date_naive());
    let to = match range.to {
        Some(to) => to,
        None => from
            .checked_add_signed(Duration::days(DEFAULT_WINDOW_DAYS))
            .ok_or_else(|| AppError::Validation(format!("Range start {} is out of range", from)))?,
    };
    if (to - from).num_days() > MAX_WINDOW_DAYS {
        return Err(AppError::Validation(format!("Range may span at most {} days", MAX_WINDOW_DAYS)));
    }

    Ok(Json(state.availability.list_slots(id, from, to).await?))
}

#[derive(Debug, Serialize)]
struct DayAvailability {
    tour_id: Uuid,
    date: NaiveDate,
    is_available: bool,
    times: Vec<TimeCapacity>,
}

/// GET /v1/tours/{id}/availability/{date}
/// Remaining capacity for every departure on one date
async fn day_availability(
    State(state): State<AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<DayAvailability>, AppError> {
    public_tour(&state, id).await?;
    let slot = state.availability.get_slot(id, date).await?;
    let times = state.availability.slot_overview(id, date).await?;

    Ok(Json(DayAvailability {
        tour_id: id,
        date,
        is_available: slot.is_available,
        times,
    }))
}

/// GET /v1/tours/{id}/availability/stream
/// Server-sent `capacity` events whenever a departure of this tour changes
async fn stream_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    public_tour(&state, id).await?;
    let rx = state.coordinator.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.tour_id == id => Some(Event::default().event("capacity").json_data(event)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(tour_id = %id, "availability stream lagged: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
