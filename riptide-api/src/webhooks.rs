use axum::{extract::State, routing::post, Json, Router};
use riptide_booking::ReservationError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
}

const SETTLING_EVENTS: [&str; 3] = [
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
];

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
///
/// The payload only names the intent; its outcome is read back from the
/// provider before anything changes.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Value>, AppError> {
    let intent_id = &payload.data.object.id;
    tracing::info!("Received webhook {}: {} for intent {}", payload.id, payload.type_, intent_id);

    if !SETTLING_EVENTS.contains(&payload.type_.as_str()) {
        return Ok(Json(json!({ "received": true, "applied": false })));
    }

    let Some(callback) = state.payments.verify_intent(intent_id).await? else {
        tracing::info!(intent_id = %intent_id, "intent not settled yet, ignoring");
        return Ok(Json(json!({ "received": true, "applied": false })));
    };

    match state.coordinator.handle_payment(callback).await {
        Ok(booking) => Ok(Json(json!({
            "received": true,
            "applied": true,
            "booking_id": booking.id,
            "status": booking.status,
        }))),
        // A late success for a booking that was already cancelled must not be
        // retried by the provider; it needs a refund instead.
        Err(ReservationError::InvalidTransition { from, to }) => {
            tracing::error!(intent_id = %intent_id, %from, %to, "payment callback does not fit booking state");
            Ok(Json(json!({ "received": true, "applied": false })))
        }
        Err(e) => Err(e.into()),
    }
}
