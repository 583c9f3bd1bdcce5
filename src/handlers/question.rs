// src/handlers/question.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{question::Question, usage::DailyLimitsResponse, user::User},
    policy,
    quota::{self, DailyCounter},
    utils::jwt::Claims,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationResponse {
    pub question_id: i64,
    pub explanation: String,
    pub used_today: i64,
    pub remaining_today: i64,
}

/// Returns the explanation for a question, gated by the daily explanation
/// quota. The curated explanation wins; the generated one is the fallback.
pub async fn get_explanation(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, Utc::now());

    let used = quota::today_count(&pool, user_id, DailyCounter::ExplanationViews).await?;
    if policy::limit_reached(limits.explanation_daily, used) {
        return Err(AppError::Forbidden(format!(
            "Daily explanation limit of {} reached. Upgrade to the Season Pass for unlimited explanations.",
            limits.explanation_daily
        )));
    }

    let question = sqlx::query_as::<_, Question>(
        "SELECT id, category, difficulty, content, options, correct_option,
                explanation, ai_explanation, created_at
         FROM questions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let explanation = question
        .explanation
        .or(question.ai_explanation)
        .ok_or(AppError::NotFound(
            "No explanation available for this question".to_string(),
        ))?;

    let used_now = quota::increment_today(&pool, user_id, DailyCounter::ExplanationViews).await?;

    Ok(Json(ExplanationResponse {
        question_id: question.id,
        explanation,
        used_today: used_now,
        remaining_today: policy::remaining(limits.explanation_daily, used_now),
    }))
}

/// Current explanation quota standing for the caller.
pub async fn explanation_limits(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let now = Utc::now();
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, now);
    let used = quota::today_count(&pool, user_id, DailyCounter::ExplanationViews).await?;

    Ok(Json(DailyLimitsResponse {
        is_premium: policy::is_effective_premium(user.is_premium, user.premium_expiry, now),
        daily_limit: limits.explanation_daily,
        used_today: used,
        remaining_today: policy::remaining(limits.explanation_daily, used),
    }))
}
