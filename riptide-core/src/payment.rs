use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an intent at the payment provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome reported by the provider's asynchronous callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed { reason: String },
}

/// A verified payment callback for one booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub booking_id: Uuid,
    pub payment_reference: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    #[error("Payment provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Retrieve the provider's current view of an intent
    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}
