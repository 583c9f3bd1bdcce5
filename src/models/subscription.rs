// src/models/subscription.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'subscriptions' table. At most one row per user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan: String,
    pub payment_method: String,
    /// Gateway transaction id, redeemed code, or manual claim reference.
    pub reference_number: String,
    pub status: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'season_pass_codes' table.
/// A code is mutated exactly once (redemption) and is immutable thereafter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeasonPassCode {
    pub id: i64,
    pub code: String,
    pub is_redeemed: bool,
    pub redeemed_by: Option<i64>,
    pub redeemed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub batch_id: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub notes: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'payment_verifications' table: a manual payment claim
/// waiting for an admin decision. Decided exactly once.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub id: i64,
    pub user_id: i64,
    /// Centavos.
    pub amount: i64,
    pub payment_method: String,
    pub reference_number: String,
    pub proof_image_url: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub decided_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for redeeming a season pass code.
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: String,
}

/// DTO for submitting a manual payment claim.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationRequest {
    /// Centavos.
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(min = 1, max = 30))]
    pub payment_method: String,
    #[validate(length(min = 1, max = 100))]
    pub reference_number: String,
    #[validate(length(max = 500))]
    pub proof_image_url: Option<String>,
}

/// Current entitlement as shown to the user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub is_premium: bool,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}
