// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, UpdateExplanationRequest},
        subscription::PaymentVerification,
        user::User,
    },
    premium::{self, Activation},
    utils::{jwt::Claims, season_code},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, is_premium, premium_expiry, created_at
         FROM users
         ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Deletes a user by ID. Owned rows (sessions, counters, subscription)
/// go with it via FK cascade.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current_user_id = claims.sub.parse::<i64>().unwrap_or(0);
    if id == current_user_id {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Creates a new quiz question.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !payload
        .options
        .iter()
        .any(|opt| opt.id == payload.correct_option)
    {
        return Err(AppError::BadRequest(
            "correctOption must match one of the option ids".to_string(),
        ));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (category, difficulty, content, options, correct_option, explanation)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(&payload.category)
    .bind(&payload.difficulty)
    .bind(&payload.content)
    .bind(SqlJson(&payload.options))
    .bind(&payload.correct_option)
    .bind(&payload.explanation)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Backfills a question's explanations. Questions are otherwise immutable
/// after creation, so only these two columns can change.
/// Admin only.
pub async fn update_question_explanations(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExplanationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.explanation.is_none() && payload.ai_explanation.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(explanation) = payload.explanation {
        separated.push("explanation = ");
        separated.push_bind_unseparated(explanation);
    }

    if let Some(ai_explanation) = payload.ai_explanation {
        separated.push("ai_explanation = ");
        separated.push_bind_unseparated(ai_explanation);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question explanations: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a quiz question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// DTO for generating a batch of season pass codes.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodesRequest {
    #[validate(range(min = 1, max = 500))]
    pub quantity: i32,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Generates a batch of one-time season pass codes.
/// Admin only.
pub async fn generate_codes(
    State(pool): State<PgPool>,
    Json(payload): Json<GenerateCodesRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch_id = uuid::Uuid::new_v4().to_string();
    let mut codes = Vec::with_capacity(payload.quantity as usize);

    for _ in 0..payload.quantity {
        loop {
            let code = {
                let mut rng = rand::rng();
                season_code::generate(&mut rng)
            };

            // The unique index arbitrates collisions; just draw again.
            let inserted = sqlx::query(
                "INSERT INTO season_pass_codes (code, batch_id, expires_at, notes)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(&code)
            .bind(&batch_id)
            .bind(payload.expires_at)
            .bind(&payload.notes)
            .execute(&pool)
            .await?;

            if inserted.rows_affected() == 1 {
                codes.push(code);
                break;
            }
        }
    }

    tracing::info!("Generated {} season pass codes in batch {}", codes.len(), batch_id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "batchId": batch_id,
            "quantity": codes.len(),
            "expiresAt": payload.expires_at,
            "codes": codes,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerificationListParams {
    pub status: Option<String>,
}

/// Lists manual payment claims, optionally filtered by status.
/// Admin only.
pub async fn list_verifications(
    State(pool): State<PgPool>,
    Query(params): Query<VerificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, user_id, amount, payment_method, reference_number, proof_image_url,
                status, rejection_reason, decided_at, created_at
         FROM payment_verifications",
    );

    if let Some(status) = &params.status {
        builder.push(" WHERE status = ");
        builder.push_bind(status.clone());
    }

    builder.push(" ORDER BY created_at DESC");

    let verifications: Vec<PaymentVerification> =
        builder.build_query_as().fetch_all(&pool).await?;

    Ok(Json(verifications))
}

/// Approves a pending manual payment claim and grants premium atomically.
/// A claim can only be decided once.
/// Admin only.
pub async fn approve_verification(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let verification = sqlx::query_as::<_, PaymentVerification>(
        "SELECT id, user_id, amount, payment_method, reference_number, proof_image_url,
                status, rejection_reason, decided_at, created_at
         FROM payment_verifications WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Verification not found".to_string()))?;

    // One-shot decision; the conditional update loses against a concurrent
    // approve/reject.
    let decided = sqlx::query(
        "UPDATE payment_verifications
         SET status = 'approved', decided_at = $1
         WHERE id = $2 AND status = 'pending'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if decided.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Verification has already been decided".to_string(),
        ));
    }

    premium::activate_premium(
        &mut tx,
        &Activation {
            user_id: verification.user_id,
            plan: premium::PLAN_SEASON_PASS,
            payment_method: &verification.payment_method,
            reference_number: &verification.reference_number,
            expires_at: None,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Payment verification {} approved; premium granted to user {}",
        id,
        verification.user_id
    );

    Ok(Json(serde_json::json!({
        "id": id,
        "status": "approved",
        "userId": verification.user_id,
    })))
}

/// DTO for rejecting a claim.
#[derive(Debug, Deserialize, Validate)]
pub struct RejectVerificationRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Rejects a pending manual payment claim. No entitlement is granted.
/// A claim can only be decided once.
/// Admin only.
pub async fn reject_verification(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<RejectVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM payment_verifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Verification not found".to_string()));
    }

    let decided = sqlx::query(
        "UPDATE payment_verifications
         SET status = 'rejected', rejection_reason = $1, decided_at = $2
         WHERE id = $3 AND status = 'pending'",
    )
    .bind(&payload.reason)
    .bind(Utc::now())
    .bind(id)
    .execute(&pool)
    .await?;

    if decided.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Verification has already been decided".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "id": id,
        "status": "rejected",
    })))
}
