use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use riptide_shared::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    /// Customer identity recorded on bookings made with this token
    pub fn customer_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;
    Ok(Some(token))
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

// ============================================================================
// Optional caller identity
// ============================================================================

/// Claims of the caller when a bearer token is present.
///
/// Guests may book without a token; a token that is present but invalid is
/// still rejected.
pub struct MaybeClaims(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(MaybeClaims(Some(claims.clone())));
        }
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeClaims(Some(decode_claims(token, &state.auth.secret)?))),
            None => Ok(MaybeClaims(None)),
        }
    }
}

// ============================================================================
// Staff Authentication Middleware
// ============================================================================

pub async fn staff_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let token = bearer_token(&parts)?
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    let claims = decode_claims(token, &state.auth.secret)?;

    if !claims.role.can_manage() {
        return Err(AppError::Forbidden("Staff or admin role required".to_string()));
    }

    parts.extensions.insert(claims);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
