// src/premium.rs
//
// Premium entitlement is granted from three origins: a gateway webhook, a
// redeemed season pass code, or an approved manual payment claim. All three
// funnel into `activate_premium`, which must run inside one transaction so
// the subscription row and the user's premium flag land together or not at
// all. A paid-but-locked-out customer is the one failure mode this module
// exists to prevent.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Postgres, Transaction};

use crate::error::AppError;

pub const PLAN_SEASON_PASS: &str = "season_pass";

/// One premium grant, regardless of origin.
#[derive(Debug, Clone)]
pub struct Activation<'a> {
    pub user_id: i64,
    pub plan: &'a str,
    pub payment_method: &'a str,
    /// Gateway transaction id, redeemed code, or claim reference.
    pub reference_number: &'a str,
    /// None means the entitlement never lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Creates-or-updates the caller's subscription row and flips the premium
/// flag. Both writes share the caller's transaction; committing or rolling
/// back is the caller's responsibility.
pub async fn activate_premium(
    tx: &mut Transaction<'_, Postgres>,
    activation: &Activation<'_>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO subscriptions (user_id, plan, payment_method, reference_number, status, expires_at)
         VALUES ($1, $2, $3, $4, 'active', $5)
         ON CONFLICT (user_id) DO UPDATE SET
             plan = EXCLUDED.plan,
             payment_method = EXCLUDED.payment_method,
             reference_number = EXCLUDED.reference_number,
             status = 'active',
             expires_at = EXCLUDED.expires_at,
             updated_at = NOW()",
    )
    .bind(activation.user_id)
    .bind(activation.plan)
    .bind(activation.payment_method)
    .bind(activation.reference_number)
    .bind(activation.expires_at)
    .execute(&mut **tx)
    .await?;

    let updated = sqlx::query("UPDATE users SET is_premium = TRUE, premium_expiry = $1 WHERE id = $2")
        .bind(activation.expires_at)
        .bind(activation.user_id)
        .execute(&mut **tx)
        .await?;

    if updated.rows_affected() == 0 {
        // Aborts the whole transaction, including the subscription upsert.
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(())
}

/// Whether the user already holds an unexpired active subscription.
/// Redemption refuses in that case so a code is not wasted.
pub async fn has_active_subscription<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM subscriptions
         WHERE user_id = $1 AND status = 'active'
           AND (expires_at IS NULL OR expires_at > $2)",
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(executor)
    .await?;

    Ok(existing.is_some())
}

/// Webhook idempotency probe: has this gateway reference already produced a
/// subscription?
pub async fn reference_already_processed<'e>(
    executor: impl PgExecutor<'e>,
    reference_number: &str,
) -> Result<bool, AppError> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM subscriptions WHERE reference_number = $1")
            .bind(reference_number)
            .fetch_optional(executor)
            .await?;

    Ok(existing.is_some())
}
