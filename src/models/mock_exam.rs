// src/models/mock_exam.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::question::PublicQuestion;

pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_ABANDONED: &str = "ABANDONED";

/// Represents the 'mock_exam_sessions' table.
///
/// The question list is fixed at creation; answers and flags may only
/// reference ids within it. Once the status is terminal the row no longer
/// changes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MockExamSession {
    pub id: i64,
    pub user_id: i64,
    pub total_questions: i32,
    pub time_limit_minutes: i32,
    pub passing_score: i32,

    /// None means a mixed exam over all categories.
    pub categories: Option<Json<Vec<String>>>,
    pub difficulty: Option<String>,

    pub status: String,

    pub question_ids: Json<Vec<i64>>,

    /// questionId -> selected option id. Resubmitting overwrites.
    pub answers: Json<HashMap<i64, String>>,

    pub flagged: Json<Vec<i64>>,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Integer percentage, set only on completion.
    pub score: Option<i32>,
}

/// DTO for starting a mock exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(range(min = 1, max = 170))]
    pub total_questions: i32,
    #[validate(range(min = 1, max = 480))]
    pub time_limit_minutes: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    /// Omitted or empty means mixed.
    pub categories: Option<Vec<String>>,
    pub difficulty: Option<String>,
}

/// Session-create response: the paper as handed to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamCreatedResponse {
    pub exam_id: i64,
    pub total_questions: i32,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub status: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for recording one answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: i64,
    pub selected_option_id: String,
}

/// DTO for flagging/unflagging a question for review.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRequest {
    pub question_id: i64,
    pub flagged: bool,
}

/// Per-question line of the results payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: i64,
    pub selected_option_id: Option<String>,
    pub correct_option_id: Option<String>,
    pub correct: bool,
    pub explanation: Option<String>,
}

/// Results payload returned by submit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultResponse {
    pub exam_id: i64,
    pub score: i32,
    pub passing_score: i32,
    pub passed: bool,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub unanswered_questions: i32,
    pub elapsed_seconds: i64,
    pub breakdown: Vec<QuestionResult>,
}

/// Snapshot for resuming an in-progress exam or reviewing a finished one.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStateResponse {
    pub exam_id: i64,
    pub status: String,
    pub total_questions: i32,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub score: Option<i32>,
    pub answered_count: i32,
    pub flagged_count: i32,
    pub unanswered_count: i32,
    pub questions: Vec<PublicQuestion>,
    pub answers: HashMap<i64, String>,
    pub flagged_question_ids: Vec<i64>,
}

/// Limits payload for the exam area.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamLimitsResponse {
    pub is_premium: bool,
    pub max_questions_per_exam: i64,
    pub exams_used_this_month: i64,
    pub remaining_exams_this_month: i64,
}
