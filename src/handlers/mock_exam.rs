// src/handlers/mock_exam.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::seq::{SliceRandom, index};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        mock_exam::{
            AnswerRequest, CreateExamRequest, ExamCreatedResponse, ExamLimitsResponse,
            ExamResultResponse, ExamStateResponse, FlagRequest, MockExamSession, QuestionResult,
            STATUS_ABANDONED, STATUS_IN_PROGRESS,
        },
        question::{CATEGORIES, DIFFICULTIES, PublicQuestion, Question},
        user::User,
    },
    policy, quota,
    utils::jwt::Claims,
};

/// Validated pool filter for exam creation.
struct PoolFilter {
    categories: Option<Vec<String>>,
    difficulty: Option<String>,
}

impl PoolFilter {
    fn from_request(payload: &CreateExamRequest) -> Result<Self, AppError> {
        let categories = match &payload.categories {
            Some(cats) if !cats.is_empty() => {
                for cat in cats {
                    if !CATEGORIES.contains(&cat.as_str()) {
                        return Err(AppError::BadRequest(format!("Unknown category '{}'", cat)));
                    }
                }
                Some(cats.clone())
            }
            _ => None,
        };

        let difficulty = match &payload.difficulty {
            Some(diff) => {
                if !DIFFICULTIES.contains(&diff.as_str()) {
                    return Err(AppError::BadRequest(format!(
                        "Unknown difficulty '{}'",
                        diff
                    )));
                }
                Some(diff.clone())
            }
            None => None,
        };

        Ok(PoolFilter {
            categories,
            difficulty,
        })
    }

    /// Appends WHERE clauses for this filter to a builder.
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let mut has_where = false;

        if let Some(cats) = &self.categories {
            builder.push(" WHERE category = ANY(");
            builder.push_bind(cats.clone());
            builder.push(")");
            has_where = true;
        }

        if let Some(diff) = &self.difficulty {
            builder.push(if has_where { " AND " } else { " WHERE " });
            builder.push("difficulty = ");
            builder.push_bind(diff.clone());
        }
    }
}

/// Summary of one graded session.
#[derive(Debug, PartialEq, Eq)]
struct GradeOutcome {
    correct: i32,
    incorrect: i32,
    unanswered: i32,
    /// Integer percentage over all session questions.
    score: i32,
}

/// Grades a session. A question with no recorded answer counts against the
/// denominator as incorrect, never as excluded.
fn grade_session(
    question_ids: &[i64],
    answers: &HashMap<i64, String>,
    key: &HashMap<i64, String>,
) -> GradeOutcome {
    let mut correct = 0;
    let mut incorrect = 0;
    let mut unanswered = 0;

    for question_id in question_ids {
        match answers.get(question_id) {
            Some(selected) if key.get(question_id) == Some(selected) => correct += 1,
            Some(_) => incorrect += 1,
            None => unanswered += 1,
        }
    }

    let total = question_ids.len() as i32;
    let score = if total == 0 { 0 } else { correct * 100 / total };

    GradeOutcome {
        correct,
        incorrect,
        unanswered,
        score,
    }
}

async fn fetch_session(
    pool: &PgPool,
    session_id: i64,
    user_id: i64,
) -> Result<MockExamSession, AppError> {
    sqlx::query_as::<_, MockExamSession>(
        "SELECT id, user_id, total_questions, time_limit_minutes, passing_score,
                categories, difficulty, status, question_ids, answers, flagged,
                started_at, completed_at, score
         FROM mock_exam_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Exam session not found".to_string()))
}

async fn fetch_questions_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, category, difficulty, content, options, correct_option,
                explanation, ai_explanation, created_at
         FROM questions WHERE id = ANY($1)",
    )
    .bind(ids.to_vec())
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

/// Reorders fetched questions to the session's fixed order and strips the
/// answer key.
fn public_questions_in_order(ids: &[i64], questions: Vec<Question>) -> Vec<PublicQuestion> {
    let mut by_id: HashMap<i64, Question> = questions.into_iter().map(|q| (q.id, q)).collect();
    ids.iter()
        .filter_map(|id| by_id.remove(id))
        .map(PublicQuestion::from)
        .collect()
}

/// Starts a mock exam.
///
/// * Enforces the caller's question cap and monthly exam allowance.
/// * Draws distinct random questions via count-then-sparse-fetch: count the
///   filtered pool, sample row ranks, fetch only the sampled rows. The pool
///   is never shuffled or loaded whole.
/// * Fails explicitly when the filtered pool is smaller than the request.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let filter = PoolFilter::from_request(&payload)?;

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, Utc::now());

    if i64::from(payload.total_questions) > limits.max_questions_per_exam {
        return Err(AppError::Forbidden(format!(
            "Free accounts are limited to {} questions per mock exam. Upgrade to the Season Pass for full-length exams.",
            limits.max_questions_per_exam
        )));
    }

    if limits.exams_monthly != policy::UNLIMITED {
        let used = quota::month_completed_exams(&pool, user_id).await?;
        if policy::limit_reached(limits.exams_monthly, used) {
            return Err(AppError::Forbidden(format!(
                "Monthly limit of {} mock exams reached. Upgrade to the Season Pass for unlimited exams.",
                limits.exams_monthly
            )));
        }
    }

    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions");
    filter.push_where(&mut count_query);
    let pool_size: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let requested = i64::from(payload.total_questions);
    if pool_size < requested {
        return Err(AppError::BadRequest(format!(
            "Only {} questions match the selected filters (requested {})",
            pool_size, requested
        )));
    }

    // Sample 1-based row ranks over the filtered pool. The rng must not be
    // held across an await point.
    let ranks: Vec<i64> = {
        let mut rng = rand::rng();
        index::sample(&mut rng, pool_size as usize, requested as usize)
            .into_iter()
            .map(|i| i as i64 + 1)
            .collect()
    };

    let mut pick_query = QueryBuilder::<Postgres>::new(
        "SELECT id FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM questions",
    );
    filter.push_where(&mut pick_query);
    pick_query.push(") ranked WHERE rn = ANY(");
    pick_query.push_bind(ranks);
    pick_query.push(")");

    let mut question_ids: Vec<i64> = pick_query.build_query_scalar().fetch_all(&pool).await?;
    {
        let mut rng = rand::rng();
        question_ids.shuffle(&mut rng);
    }

    let session = sqlx::query_as::<_, MockExamSession>(
        "INSERT INTO mock_exam_sessions
             (user_id, total_questions, time_limit_minutes, passing_score,
              categories, difficulty, question_ids)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, user_id, total_questions, time_limit_minutes, passing_score,
                   categories, difficulty, status, question_ids, answers, flagged,
                   started_at, completed_at, score",
    )
    .bind(user_id)
    .bind(payload.total_questions)
    .bind(payload.time_limit_minutes)
    .bind(payload.passing_score)
    .bind(filter.categories.as_ref().map(|c| SqlJson(c.clone())))
    .bind(filter.difficulty.as_deref())
    .bind(SqlJson(question_ids.clone()))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam session: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let questions = fetch_questions_by_ids(&pool, &question_ids).await?;

    Ok((
        StatusCode::CREATED,
        Json(ExamCreatedResponse {
            exam_id: session.id,
            total_questions: session.total_questions,
            time_limit_minutes: session.time_limit_minutes,
            passing_score: session.passing_score,
            status: session.status,
            started_at: session.started_at,
            questions: public_questions_in_order(&question_ids, questions),
        }),
    ))
}

/// Current mock-exam allowance standing for the caller.
pub async fn exam_limits(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let user = User::fetch(&pool, user_id).await?;
    let now = Utc::now();
    let limits = policy::limits_for(user.is_premium, user.premium_expiry, now);
    let used = quota::month_completed_exams(&pool, user_id).await?;

    Ok(Json(ExamLimitsResponse {
        is_premium: policy::is_effective_premium(user.is_premium, user.premium_expiry, now),
        max_questions_per_exam: limits.max_questions_per_exam,
        exams_used_this_month: used,
        remaining_exams_this_month: policy::remaining(limits.exams_monthly, used),
    }))
}

/// Records or overwrites one answer of an in-progress session.
pub async fn record_answer(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let mut session = fetch_session(&pool, session_id, user_id).await?;

    if session.status != STATUS_IN_PROGRESS {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    if !session.question_ids.contains(&payload.question_id) {
        return Err(AppError::BadRequest(
            "Question is not part of this exam session".to_string(),
        ));
    }

    session
        .answers
        .insert(payload.question_id, payload.selected_option_id);

    // Re-checking the status here closes the race against a concurrent
    // submit/abandon.
    let updated = sqlx::query(
        "UPDATE mock_exam_sessions SET answers = $1 WHERE id = $2 AND status = 'IN_PROGRESS'",
    )
    .bind(SqlJson(session.answers.0.clone()))
    .bind(session_id)
    .execute(&pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    let answered = session.answers.len() as i32;
    Ok(Json(serde_json::json!({
        "examId": session_id,
        "answeredCount": answered,
        "unansweredCount": session.total_questions - answered,
    })))
}

/// Flags or unflags a question of an in-progress session for review.
pub async fn toggle_flag(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
    Json(payload): Json<FlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let mut session = fetch_session(&pool, session_id, user_id).await?;

    if session.status != STATUS_IN_PROGRESS {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    if !session.question_ids.contains(&payload.question_id) {
        return Err(AppError::BadRequest(
            "Question is not part of this exam session".to_string(),
        ));
    }

    if payload.flagged {
        if !session.flagged.contains(&payload.question_id) {
            session.flagged.push(payload.question_id);
        }
    } else {
        session.flagged.retain(|id| *id != payload.question_id);
    }

    let updated = sqlx::query(
        "UPDATE mock_exam_sessions SET flagged = $1 WHERE id = $2 AND status = 'IN_PROGRESS'",
    )
    .bind(SqlJson(session.flagged.0.clone()))
    .bind(session_id)
    .execute(&pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "examId": session_id,
        "flaggedCount": session.flagged.len(),
    })))
}

/// Completes a session: grades it, stores the score and returns the results
/// payload. Completion is what consumes the monthly exam allowance.
pub async fn submit_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let session = fetch_session(&pool, session_id, user_id).await?;

    if session.status != STATUS_IN_PROGRESS {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    let questions = fetch_questions_by_ids(&pool, &session.question_ids).await?;
    let key: HashMap<i64, String> = questions
        .iter()
        .map(|q| (q.id, q.correct_option.clone()))
        .collect();
    let explanations: HashMap<i64, Option<String>> = questions
        .iter()
        .map(|q| {
            (
                q.id,
                q.explanation.clone().or_else(|| q.ai_explanation.clone()),
            )
        })
        .collect();

    let outcome = grade_session(&session.question_ids, &session.answers, &key);
    let now = Utc::now();

    let updated = sqlx::query(
        "UPDATE mock_exam_sessions
         SET status = 'COMPLETED', completed_at = $1, score = $2
         WHERE id = $3 AND status = 'IN_PROGRESS'",
    )
    .bind(now)
    .bind(outcome.score)
    .bind(session_id)
    .execute(&pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Exam session was already submitted or abandoned".to_string(),
        ));
    }

    let breakdown: Vec<QuestionResult> = session
        .question_ids
        .iter()
        .map(|question_id| {
            let selected = session.answers.get(question_id).cloned();
            let correct_option = key.get(question_id).cloned();
            QuestionResult {
                question_id: *question_id,
                correct: selected.is_some() && selected == correct_option,
                selected_option_id: selected,
                correct_option_id: correct_option,
                explanation: explanations.get(question_id).cloned().flatten(),
            }
        })
        .collect();

    Ok(Json(ExamResultResponse {
        exam_id: session_id,
        score: outcome.score,
        passing_score: session.passing_score,
        passed: outcome.score >= session.passing_score,
        correct_answers: outcome.correct,
        incorrect_answers: outcome.incorrect,
        unanswered_questions: outcome.unanswered,
        elapsed_seconds: (now - session.started_at).num_seconds(),
        breakdown,
    }))
}

/// Abandons an in-progress session. No score is computed and the monthly
/// allowance is not consumed; abandoned exams are free retries.
pub async fn abandon_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let session = fetch_session(&pool, session_id, user_id).await?;

    if session.status != STATUS_IN_PROGRESS {
        return Err(AppError::Conflict(
            "Exam session is no longer in progress".to_string(),
        ));
    }

    let updated = sqlx::query(
        "UPDATE mock_exam_sessions SET status = 'ABANDONED'
         WHERE id = $1 AND status = 'IN_PROGRESS'",
    )
    .bind(session_id)
    .execute(&pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Exam session was already submitted or abandoned".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "examId": session_id,
        "status": STATUS_ABANDONED,
    })))
}

/// Session snapshot for resuming an in-progress exam or reviewing a
/// finished one.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);
    let session = fetch_session(&pool, session_id, user_id).await?;

    let questions = fetch_questions_by_ids(&pool, &session.question_ids).await?;
    let answered = session.answers.len() as i32;

    Ok(Json(ExamStateResponse {
        exam_id: session.id,
        status: session.status.clone(),
        total_questions: session.total_questions,
        time_limit_minutes: session.time_limit_minutes,
        passing_score: session.passing_score,
        started_at: session.started_at,
        completed_at: session.completed_at,
        score: session.score,
        answered_count: answered,
        flagged_count: session.flagged.len() as i32,
        unanswered_count: session.total_questions - answered,
        questions: public_questions_in_order(&session.question_ids, questions),
        answers: session.answers.0.clone(),
        flagged_question_ids: session.flagged.0.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_all(ids: &[i64], answer: &str) -> HashMap<i64, String> {
        ids.iter().map(|id| (*id, answer.to_string())).collect()
    }

    #[test]
    fn grades_mixed_session() {
        // 5 questions, 3 correct, 1 wrong, 1 unanswered => 60%.
        let ids = vec![1, 2, 3, 4, 5];
        let key = key_all(&ids, "A");
        let mut answers = HashMap::new();
        answers.insert(1, "A".to_string());
        answers.insert(2, "A".to_string());
        answers.insert(3, "A".to_string());
        answers.insert(4, "B".to_string());

        let outcome = grade_session(&ids, &answers, &key);
        assert_eq!(
            outcome,
            GradeOutcome {
                correct: 3,
                incorrect: 1,
                unanswered: 1,
                score: 60,
            }
        );
    }

    #[test]
    fn unanswered_counts_in_denominator() {
        let ids = vec![1, 2];
        let key = key_all(&ids, "A");
        let mut answers = HashMap::new();
        answers.insert(1, "A".to_string());

        let outcome = grade_session(&ids, &answers, &key);
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.unanswered, 1);
    }

    #[test]
    fn perfect_session_scores_one_hundred() {
        let ids = vec![1, 2, 3];
        let key = key_all(&ids, "C");
        let answers = key_all(&ids, "C");

        let outcome = grade_session(&ids, &answers, &key);
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.correct, 3);
    }

    #[test]
    fn empty_answer_map_scores_zero() {
        let ids = vec![1, 2, 3];
        let key = key_all(&ids, "A");

        let outcome = grade_session(&ids, &HashMap::new(), &key);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.unanswered, 3);
    }

    #[test]
    fn answer_for_missing_question_row_counts_incorrect() {
        // Question 3 was deleted from the pool after session creation.
        let ids = vec![1, 2, 3];
        let key = key_all(&[1, 2], "A");
        let answers = key_all(&ids, "A");

        let outcome = grade_session(&ids, &answers, &key);
        assert_eq!(outcome.correct, 2);
        assert_eq!(outcome.incorrect, 1);
    }

    #[test]
    fn passing_is_inclusive_of_the_threshold() {
        // 4 of 5 correct => 80; with passing_score 80 this must pass.
        let ids = vec![1, 2, 3, 4, 5];
        let key = key_all(&ids, "A");
        let mut answers = key_all(&ids, "A");
        answers.insert(5, "B".to_string());

        let outcome = grade_session(&ids, &answers, &key);
        assert_eq!(outcome.score, 80);
        assert!(outcome.score >= 80);
    }
}
