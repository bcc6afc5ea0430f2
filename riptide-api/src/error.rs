use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use riptide_booking::{BookingError, ReservationError};
use riptide_catalog::{AvailabilityError, CatalogError};
use riptide_core::payment::PaymentError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),
    #[error(transparent)]
    Reservation(ReservationError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::PaymentProvider(_) => (StatusCode::BAD_GATEWAY, "payment_provider"),
            AppError::Reservation(e) => {
                let status = match e {
                    ReservationError::TourNotFound(_) | ReservationError::NotFound(_) => StatusCode::NOT_FOUND,
                    ReservationError::TourInactive(_) => StatusCode::GONE,
                    ReservationError::InvalidParticipantCount { .. }
                    | ReservationError::InvalidTimeSlot(_)
                    | ReservationError::InvalidContact(_)
                    | ReservationError::Pricing(_) => StatusCode::BAD_REQUEST,
                    ReservationError::NoAvailability { .. }
                    | ReservationError::CapacityExceeded { .. }
                    | ReservationError::InvalidTransition { .. }
                    | ReservationError::Conflict(_) => StatusCode::CONFLICT,
                    ReservationError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
                    ReservationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            AppError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        AppError::Reservation(err)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Reservation(err.into())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => AppError::Reservation(ReservationError::TourNotFound(id)),
            CatalogError::Inactive(id) => AppError::Reservation(ReservationError::TourInactive(id)),
            CatalogError::Invalid(msg) => AppError::Validation(msg),
            CatalogError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::NotFound { .. } => AppError::NotFound(err.to_string()),
            AvailabilityError::Unavailable { .. } | AvailabilityError::TimeInUse(_) => {
                AppError::Conflict(err.to_string())
            }
            AvailabilityError::InvalidTime(_) | AvailabilityError::Invalid(_) => AppError::Validation(err.to_string()),
            AvailabilityError::Catalog(e) => e.into(),
            AvailabilityError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::IntentNotFound(_) => AppError::NotFound(err.to_string()),
            PaymentError::Provider(msg) => AppError::PaymentProvider(msg),
        }
    }
}
