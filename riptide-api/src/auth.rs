use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use riptide_shared::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Claims, state::AppState};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    customer_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

pub fn issue_token(state: &AppState, sub: String, role: Role, email: Option<String>) -> Result<String, AppError> {
    let claims = Claims {
        sub,
        email,
        role,
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(state.auth.secret.as_bytes()))
        .map_err(|e| AppError::Anyhow(anyhow::anyhow!("Token encoding failed: {}", e)))
}

/// POST /v1/auth/guest
/// A customer identity for booking without an account
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let customer_id = Uuid::new_v4();
    let token = issue_token(&state, customer_id.to_string(), Role::Customer, None)?;
    tracing::info!(%customer_id, "guest token issued");
    Ok(Json(AuthResponse { token, customer_id }))
}
