// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// The five sections of the review question pool.
pub const CATEGORIES: [&str; 5] = [
    "VERBAL",
    "NUMERICAL",
    "ANALYTICAL",
    "GENERAL_INFORMATION",
    "CLERICAL",
];

pub const DIFFICULTIES: [&str; 3] = ["EASY", "MEDIUM", "HARD"];

/// One selectable option of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Short stable id, e.g. "A".
    pub id: String,
    pub text: String,
}

/// Represents the 'questions' table in the database.
/// Immutable after creation except for explanation backfill.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub category: String,

    /// 'EASY', 'MEDIUM' or 'HARD'.
    pub difficulty: String,

    /// The text content of the question.
    pub content: String,

    /// Ordered list of options, stored as a JSON array.
    pub options: Json<Vec<QuestionOption>>,

    /// The id of the correct option.
    pub correct_option: String,

    /// Curated explanation of the correct answer.
    pub explanation: Option<String>,

    /// Generated explanation, backfilled later for questions without a
    /// curated one.
    pub ai_explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to the client (excludes the answer key and
/// explanations).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub category: String,
    pub difficulty: String,
    pub content: String,
    pub options: Json<Vec<QuestionOption>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            category: q.category,
            difficulty: q.difficulty,
            content: q.content,
            options: q.options,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(custom(function = validate_category))]
    pub category: String,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
    #[validate(length(min = 1, max = 10))]
    pub correct_option: String,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
}

/// DTO for explanation backfill. No other field of a question may change
/// after creation.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExplanationRequest {
    #[validate(length(min = 1, max = 4000))]
    pub explanation: Option<String>,
    #[validate(length(min = 1, max = 4000))]
    pub ai_explanation: Option<String>,
}

fn validate_category(category: &str) -> Result<(), validator::ValidationError> {
    if !CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("unknown_category"));
    }
    Ok(())
}

fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    if !DIFFICULTIES.contains(&difficulty) {
        return Err(validator::ValidationError::new("unknown_difficulty"));
    }
    Ok(())
}

fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 6 {
        return Err(validator::ValidationError::new("option_count_out_of_range"));
    }
    for (i, opt) in options.iter().enumerate() {
        if opt.id.is_empty() || opt.id.len() > 10 {
            return Err(validator::ValidationError::new("bad_option_id"));
        }
        if opt.text.is_empty() || opt.text.len() > 500 {
            return Err(validator::ValidationError::new("bad_option_text"));
        }
        if options[..i].iter().any(|prev| prev.id == opt.id) {
            return Err(validator::ValidationError::new("duplicate_option_id"));
        }
    }
    Ok(())
}
