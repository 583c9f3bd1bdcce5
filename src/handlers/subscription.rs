// src/handlers/subscription.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::subscription::{
        RedeemRequest, SeasonPassCode, SubmitVerificationRequest, Subscription,
        SubscriptionStatusResponse,
    },
    models::user::User,
    policy,
    premium::{self, Activation},
    utils::{jwt::Claims, season_code},
};

/// Redeems a season pass code.
///
/// The redeemed flag, the subscription row and the premium flag are all
/// written inside one transaction; a code can never be burned without the
/// entitlement landing.
pub async fn redeem_code(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RedeemRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let code = season_code::normalize(&payload.code);
    if !season_code::is_valid_format(&code) {
        return Err(AppError::BadRequest(
            "Invalid code format. Codes look like PASS-XXXX-XXXX.".to_string(),
        ));
    }

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let pass_code = sqlx::query_as::<_, SeasonPassCode>(
        "SELECT id, code, is_redeemed, redeemed_by, redeemed_at, batch_id,
                expires_at, notes, created_at
         FROM season_pass_codes WHERE code = $1",
    )
    .bind(&code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Code not found".to_string()))?;

    if pass_code.is_redeemed {
        return Err(AppError::Conflict(
            "This code has already been redeemed".to_string(),
        ));
    }

    if let Some(expires_at) = pass_code.expires_at {
        if expires_at <= now {
            return Err(AppError::BadRequest("This code has expired".to_string()));
        }
    }

    if premium::has_active_subscription(&mut *tx, user_id, now).await? {
        return Err(AppError::Conflict(
            "You already have an active Season Pass; the code was not redeemed".to_string(),
        ));
    }

    // The conditional update is the serialization point for concurrent
    // redemptions of the same code.
    let claimed = sqlx::query(
        "UPDATE season_pass_codes
         SET is_redeemed = TRUE, redeemed_by = $1, redeemed_at = $2
         WHERE id = $3 AND is_redeemed = FALSE",
    )
    .bind(user_id)
    .bind(now)
    .bind(pass_code.id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "This code has already been redeemed".to_string(),
        ));
    }

    premium::activate_premium(
        &mut tx,
        &Activation {
            user_id,
            plan: premium::PLAN_SEASON_PASS,
            payment_method: "season_pass_code",
            reference_number: &code,
            expires_at: None,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!("Season pass code {} redeemed by user {}", code, user_id);

    Ok(Json(serde_json::json!({
        "isPremium": true,
        "plan": premium::PLAN_SEASON_PASS,
        "message": "Season Pass activated. Enjoy unlimited access!"
    })))
}

/// Current entitlement for the caller.
pub async fn subscription_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;

    let subscription = sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, plan, payment_method, reference_number, status,
                expires_at, created_at, updated_at
         FROM subscriptions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    Ok(Json(SubscriptionStatusResponse {
        is_premium: policy::is_effective_premium(user.is_premium, user.premium_expiry, Utc::now()),
        plan: subscription.as_ref().map(|s| s.plan.clone()),
        status: subscription.as_ref().map(|s| s.status.clone()),
        payment_method: subscription.as_ref().map(|s| s.payment_method.clone()),
        expires_at: subscription.as_ref().and_then(|s| s.expires_at),
    }))
}

/// Submits a manual payment claim for admin review.
/// The claim is recorded as pending; no entitlement is granted yet.
pub async fn submit_verification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO payment_verifications
             (user_id, amount, payment_method, reference_number, proof_image_url)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(user_id)
    .bind(payload.amount)
    .bind(&payload.payment_method)
    .bind(&payload.reference_number)
    .bind(&payload.proof_image_url)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record payment verification: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": id,
            "status": "pending",
            "message": "Payment submitted for verification. You will be upgraded once approved."
        })),
    ))
}
