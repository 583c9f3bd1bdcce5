// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, mock_exam, practice, question, subscription, webhook},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, practice, exams, subscription, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Protected profile route
        .merge(
            Router::new()
                .route("/me", get(auth::get_me))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let practice_routes = Router::new()
        .route("/submit", post(practice::submit_practice))
        .route("/limits", get(practice::practice_limits))
        .route("/streak/repair", post(practice::repair_streak))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let question_routes = Router::new()
        .route("/limits", get(question::explanation_limits))
        .route("/{id}/explanation", get(question::get_explanation))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let exam_routes = Router::new()
        .route("/", post(mock_exam::create_exam))
        .route("/limits", get(mock_exam::exam_limits))
        .route("/{id}", get(mock_exam::get_exam))
        .route("/{id}/answers", post(mock_exam::record_answer))
        .route("/{id}/flags", post(mock_exam::toggle_flag))
        .route("/{id}/submit", post(mock_exam::submit_exam))
        .route("/{id}/abandon", post(mock_exam::abandon_exam))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let subscription_routes = Router::new()
        .route("/redeem", post(subscription::redeem_code))
        .route("/status", get(subscription::subscription_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let payment_routes = Router::new()
        .route("/verify", post(subscription::submit_verification))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The gateway authenticates with a body signature, not a bearer token.
    let webhook_routes = Router::new().route("/payment", post(webhook::payment_webhook));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/questions", post(admin::create_question))
        .route(
            "/questions/{id}",
            delete(admin::delete_question).put(admin::update_question_explanations),
        )
        .route("/codes", post(admin::generate_codes))
        .route("/verifications", get(admin::list_verifications))
        .route(
            "/verifications/{id}/approve",
            put(admin::approve_verification),
        )
        .route(
            "/verifications/{id}/reject",
            put(admin::reject_verification),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/practice", practice_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/subscription", subscription_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/webhooks", webhook_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
