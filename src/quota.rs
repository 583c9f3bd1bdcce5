// src/quota.rs

use chrono::Utc;
use sqlx::PgPool;

use crate::{error::AppError, utils::clock};

/// The two daily counters kept per (user, canonical day).
#[derive(Debug, Clone, Copy)]
pub enum DailyCounter {
    Practice,
    ExplanationViews,
}

/// How many units the user consumed today. No row yet means zero.
pub async fn today_count(
    pool: &PgPool,
    user_id: i64,
    counter: DailyCounter,
) -> Result<i64, AppError> {
    let sql = match counter {
        DailyCounter::Practice => {
            "SELECT count::BIGINT FROM daily_practice_usage WHERE user_id = $1 AND usage_date = $2"
        }
        DailyCounter::ExplanationViews => {
            "SELECT count::BIGINT FROM daily_explanation_views WHERE user_id = $1 AND usage_date = $2"
        }
    };

    let count: Option<i64> = sqlx::query_scalar(sql)
        .bind(user_id)
        .bind(clock::today())
        .fetch_optional(pool)
        .await?;

    Ok(count.unwrap_or(0))
}

/// Creates-or-increments today's row in one statement and returns the new
/// count. The upsert keeps concurrent submissions from losing updates; there
/// is exactly one counter row per (user, day).
pub async fn increment_today(
    pool: &PgPool,
    user_id: i64,
    counter: DailyCounter,
) -> Result<i64, AppError> {
    let sql = match counter {
        DailyCounter::Practice => {
            "INSERT INTO daily_practice_usage (user_id, usage_date, count)
             VALUES ($1, $2, 1)
             ON CONFLICT (user_id, usage_date)
             DO UPDATE SET count = daily_practice_usage.count + 1
             RETURNING count::BIGINT"
        }
        DailyCounter::ExplanationViews => {
            "INSERT INTO daily_explanation_views (user_id, usage_date, count)
             VALUES ($1, $2, 1)
             ON CONFLICT (user_id, usage_date)
             DO UPDATE SET count = daily_explanation_views.count + 1
             RETURNING count::BIGINT"
        }
    };

    let count: i64 = sqlx::query_scalar(sql)
        .bind(user_id)
        .bind(clock::today())
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Mock exams completed since the canonical month began. Abandoned sessions
/// are not counted; only completion consumes the monthly allowance.
pub async fn month_completed_exams(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mock_exam_sessions
         WHERE user_id = $1 AND status = 'COMPLETED' AND completed_at >= $2",
    )
    .bind(user_id)
    .bind(clock::month_start(Utc::now()))
    .fetch_one(pool)
    .await?;

    Ok(count)
}
