// tests/api_tests.rs

use reviewpal_api::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and a pool for
/// seeding fixtures.
async fn spawn_app() -> (String, PgPool) {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        payment_webhook_secret: "whsec_integration_tests".to_string(),
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers and logs in a fresh user; returns (token, user_id).
async fn register_and_login(client: &reqwest::Client, address: &str) -> (String, i64) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let register_resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Register failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse register json");

    let user_id = register_resp["id"].as_i64().expect("id not in response");

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    let token = login_resp["token"].as_str().expect("Token not found");
    (token.to_string(), user_id)
}

/// Inserts one question and returns its id. Correct answer is always "A".
async fn seed_question(pool: &PgPool, category: &str, difficulty: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO questions (category, difficulty, content, options, correct_option, explanation)
         VALUES ($1, $2, $3, $4, 'A', 'Because A is right.')
         RETURNING id",
    )
    .bind(category)
    .bind(difficulty)
    .bind(format!("Question {}", uuid::Uuid::new_v4()))
    .bind(serde_json::json!([
        {"id": "A", "text": "Alpha"},
        {"id": "B", "text": "Bravo"},
        {"id": "C", "text": "Charlie"},
        {"id": "D", "text": "Delta"}
    ]))
    .fetch_one(pool)
    .await
    .expect("Failed to seed question")
}

async fn make_premium(pool: &PgPool, user_id: i64) {
    sqlx::query("UPDATE users SET is_premium = TRUE, premium_expiry = NULL WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to set premium flag");
}

#[tokio::test]
async fn health_check_404() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn practice_requires_auth() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/practice/submit", address))
        .json(&serde_json::json!({"questionId": 1, "selectedOptionId": "A"}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn practice_submission_grades_and_counts() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "VERBAL", "EASY").await;

    // Correct answer
    let resp: serde_json::Value = client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "A"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["correct"], true);
    assert_eq!(resp["correctOptionId"], "A");
    assert_eq!(resp["usedToday"], 1);
    assert_eq!(resp["remainingToday"], 14);
    assert_eq!(resp["currentStreak"], 1);

    // Wrong answer still consumes quota
    let resp: serde_json::Value = client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "B"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["correct"], false);
    assert_eq!(resp["usedToday"], 2);
}

#[tokio::test]
async fn free_tier_practice_limit_is_fifteen() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "NUMERICAL", "EASY").await;

    // The 15th submission of the day succeeds.
    for i in 1..=15 {
        let resp = client
            .post(format!("{}/api/practice/submit", address))
            .bearer_auth(&token)
            .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "A"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "submission {} failed", i);
    }

    // The 16th is rejected by policy.
    let resp = client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "A"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "forbidden");
    // The message must be actionable.
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("15"));
    assert!(message.contains("Season Pass"));
}

#[tokio::test]
async fn premium_practice_is_unlimited() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, user_id) = register_and_login(&client, &address).await;
    make_premium(&pool, user_id).await;
    let question_id = seed_question(&pool, "ANALYTICAL", "MEDIUM").await;

    // Push well past the free-tier cap; no quota error may occur.
    for _ in 0..18 {
        let resp = client
            .post(format!("{}/api/practice/submit", address))
            .bearer_auth(&token)
            .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "A"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let limits: serde_json::Value = client
        .get(format!("{}/api/practice/limits", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(limits["isPremium"], true);
    assert_eq!(limits["dailyLimit"], -1);
    assert_eq!(limits["remainingToday"], -1);
}

#[tokio::test]
async fn practice_limits_endpoint_tracks_usage() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "CLERICAL", "EASY").await;

    let limits: serde_json::Value = client
        .get(format!("{}/api/practice/limits", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(limits["isPremium"], false);
    assert_eq!(limits["dailyLimit"], 15);
    assert_eq!(limits["usedToday"], 0);
    assert_eq!(limits["remainingToday"], 15);

    client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "C"}))
        .send()
        .await
        .unwrap();

    let limits: serde_json::Value = client
        .get(format!("{}/api/practice/limits", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(limits["usedToday"], 1);
    assert_eq!(limits["remainingToday"], 14);
}

#[tokio::test]
async fn explanation_views_are_limited_to_three() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "GENERAL_INFORMATION", "EASY").await;

    for _ in 0..3 {
        let resp = client
            .get(format!(
                "{}/api/questions/{}/explanation",
                address, question_id
            ))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let resp = client
        .get(format!(
            "{}/api/questions/{}/explanation",
            address, question_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn explanation_prefers_curated_text() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "VERBAL", "HARD").await;

    let resp: serde_json::Value = client
        .get(format!(
            "{}/api/questions/{}/explanation",
            address, question_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["explanation"], "Because A is right.");
    assert_eq!(resp["usedToday"], 1);
}

#[tokio::test]
async fn me_reports_streak_and_usage() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;
    let question_id = seed_question(&pool, "NUMERICAL", "MEDIUM").await;

    client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": question_id, "selectedOptionId": "A"}))
        .send()
        .await
        .unwrap();

    let me: serde_json::Value = client
        .get(format!("{}/api/auth/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(me["currentStreak"], 1);
    assert_eq!(me["longestStreak"], 1);
    assert_eq!(me["practiceToday"], 1);
    assert_eq!(me["isPremium"], false);
}

#[tokio::test]
async fn practice_with_unknown_question_is_not_found_and_free() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _user_id) = register_and_login(&client, &address).await;

    let resp = client
        .post(format!("{}/api/practice/submit", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({"questionId": 99999999, "selectedOptionId": "A"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 404);

    // A failed submission must not consume quota.
    let limits: serde_json::Value = client
        .get(format!("{}/api/practice/limits", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(limits["usedToday"], 0);
}
