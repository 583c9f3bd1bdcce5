// src/models/usage.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per (user, canonical day) in 'daily_practice_usage' and
/// 'daily_explanation_views'. Created lazily, incremented atomically,
/// never decremented.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DailyUsage {
    pub id: i64,
    pub user_id: i64,
    pub usage_date: chrono::NaiveDate,
    pub count: i32,
}

/// Represents the 'user_streaks' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserStreak {
    pub user_id: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<chrono::NaiveDate>,
    pub last_repaired_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Limits payload shared by the practice and explanation areas.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLimitsResponse {
    pub is_premium: bool,
    pub daily_limit: i64,
    pub used_today: i64,
    pub remaining_today: i64,
}
