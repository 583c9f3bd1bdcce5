// src/handlers/practice.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{question::Question, usage::DailyLimitsResponse, usage::UserStreak, user::User},
    policy,
    quota::{self, DailyCounter},
    utils::{clock, jwt::Claims},
};

/// DTO for one practice submission.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSubmitRequest {
    pub question_id: i64,
    #[validate(length(min = 1, max = 10))]
    pub selected_option_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSubmitResponse {
    pub question_id: i64,
    pub correct: bool,
    pub correct_option_id: String,
    pub used_today: i64,
    pub remaining_today: i64,
    pub current_streak: i32,
}

/// Computes the streak after practicing on `today`.
/// Same day is a no-op, the day after extends, any gap resets to 1.
fn advance_streak(
    current: i32,
    longest: i32,
    last_activity: Option<NaiveDate>,
    today: NaiveDate,
) -> (i32, i32) {
    let next = match last_activity {
        Some(last) if last == today => current.max(1),
        Some(last) if last + Duration::days(1) == today => current + 1,
        _ => 1,
    };
    (next, longest.max(next))
}

/// Submits one practice answer.
///
/// * Gated by the daily practice quota (checked before grading).
/// * Updates the user's streak.
/// * Increments the daily counter only after the submission succeeded.
pub async fn submit_practice(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PracticeSubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, Utc::now());

    let used = quota::today_count(&pool, user_id, DailyCounter::Practice).await?;
    if policy::limit_reached(limits.practice_daily, used) {
        return Err(AppError::Forbidden(format!(
            "Daily practice limit of {} questions reached. Upgrade to the Season Pass for unlimited practice.",
            limits.practice_daily
        )));
    }

    let question = sqlx::query_as::<_, Question>(
        "SELECT id, category, difficulty, content, options, correct_option,
                explanation, ai_explanation, created_at
         FROM questions WHERE id = $1",
    )
    .bind(payload.question_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let correct = question.correct_option == payload.selected_option_id;

    // Streak upkeep. Read-then-upsert is last-write-wins, which is fine for
    // a per-user analytics row.
    let today = clock::today();
    let streak = sqlx::query_as::<_, UserStreak>(
        "SELECT user_id, current_streak, longest_streak, last_activity_date, last_repaired_at
         FROM user_streaks WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    let (current, longest) = advance_streak(
        streak.as_ref().map_or(0, |s| s.current_streak),
        streak.as_ref().map_or(0, |s| s.longest_streak),
        streak.as_ref().and_then(|s| s.last_activity_date),
        today,
    );

    sqlx::query(
        "INSERT INTO user_streaks (user_id, current_streak, longest_streak, last_activity_date)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id) DO UPDATE SET
             current_streak = EXCLUDED.current_streak,
             longest_streak = EXCLUDED.longest_streak,
             last_activity_date = EXCLUDED.last_activity_date",
    )
    .bind(user_id)
    .bind(current)
    .bind(longest)
    .bind(today)
    .execute(&pool)
    .await?;

    let used_now = quota::increment_today(&pool, user_id, DailyCounter::Practice).await?;

    Ok(Json(PracticeSubmitResponse {
        question_id: question.id,
        correct,
        correct_option_id: question.correct_option,
        used_today: used_now,
        remaining_today: policy::remaining(limits.practice_daily, used_now),
        current_streak: current,
    }))
}

/// Current practice quota standing for the caller.
pub async fn practice_limits(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, Utc::now());
    let used = quota::today_count(&pool, user_id, DailyCounter::Practice).await?;

    Ok(Json(DailyLimitsResponse {
        is_premium: policy::is_effective_premium(user.is_premium, user.premium_expiry, Utc::now()),
        daily_limit: limits.practice_daily,
        used_today: used,
        remaining_today: policy::remaining(limits.practice_daily, used),
    }))
}

/// Repairs a streak broken by exactly one missed day. Season Pass perk,
/// usable once per canonical month.
pub async fn repair_streak(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let now = Utc::now();

    if !policy::is_effective_premium(user.is_premium, user.premium_expiry, now) {
        return Err(AppError::Forbidden(
            "Streak repair is a Season Pass perk. Upgrade to restore a broken streak.".to_string(),
        ));
    }

    let streak = sqlx::query_as::<_, UserStreak>(
        "SELECT user_id, current_streak, longest_streak, last_activity_date, last_repaired_at
         FROM user_streaks WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("No streak to repair".to_string()))?;

    let today = clock::today();
    let last = streak
        .last_activity_date
        .ok_or(AppError::BadRequest("No streak to repair".to_string()))?;

    // Only a single missed day (last activity the day before yesterday) can
    // be bridged.
    if last + Duration::days(2) != today {
        return Err(AppError::BadRequest(
            "Streak can only be repaired after exactly one missed day".to_string(),
        ));
    }

    if let Some(repaired_at) = streak.last_repaired_at {
        if repaired_at >= clock::month_start(now) {
            return Err(AppError::Conflict(
                "Streak already repaired this month".to_string(),
            ));
        }
    }

    let yesterday = today - Duration::days(1);
    sqlx::query(
        "UPDATE user_streaks
         SET last_activity_date = $1, last_repaired_at = $2
         WHERE user_id = $3",
    )
    .bind(yesterday)
    .bind(now)
    .bind(user_id)
    .execute(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "repaired": true,
        "currentStreak": streak.current_streak,
        "lastActivityDate": yesterday,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_activity_starts_at_one() {
        assert_eq!(advance_streak(0, 0, None, date(2026, 6, 1)), (1, 1));
    }

    #[test]
    fn same_day_does_not_extend() {
        let today = date(2026, 6, 1);
        assert_eq!(advance_streak(4, 7, Some(today), today), (4, 7));
    }

    #[test]
    fn consecutive_day_extends() {
        assert_eq!(
            advance_streak(4, 4, Some(date(2026, 6, 1)), date(2026, 6, 2)),
            (5, 5)
        );
    }

    #[test]
    fn gap_resets_to_one() {
        assert_eq!(
            advance_streak(9, 12, Some(date(2026, 6, 1)), date(2026, 6, 4)),
            (1, 12)
        );
    }

    #[test]
    fn longest_never_shrinks() {
        assert_eq!(
            advance_streak(2, 30, Some(date(2026, 6, 1)), date(2026, 6, 2)),
            (3, 30)
        );
    }
}
