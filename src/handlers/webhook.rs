// src/handlers/webhook.rs

use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    premium::{self, Activation},
    utils::signature,
};

pub const SIGNATURE_HEADER: &str = "x-payment-signature";

const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";

/// Event payload delivered by the payment gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub event_type: String,
    pub reference_number: String,
    pub user_id: i64,
    /// Centavos.
    pub amount: i64,
    pub payment_method: String,
}

/// Webhook acknowledgement. Always delivered with HTTP 200 so the gateway
/// stops retrying; `processed` tells the two cases apart.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
}

fn ack(processed: bool) -> Json<WebhookAck> {
    Json(WebhookAck {
        received: true,
        processed,
    })
}

/// Handles payment gateway webhooks.
///
/// The signature is verified over the raw body before the payload is
/// trusted. Verification failures are acknowledged with 200 anyway; the
/// request is unfixable and a 4xx would only trigger the gateway's retry
/// storm. Duplicate deliveries are detected by reference number and
/// acknowledged without side effects.
pub async fn payment_webhook(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(provided) = provided else {
        tracing::warn!("Payment webhook rejected: missing signature header");
        return Ok(ack(false));
    };

    if !signature::verify_signature(&config.payment_webhook_secret, &body, provided) {
        tracing::warn!("Payment webhook rejected: invalid signature");
        return Ok(ack(false));
    }

    let event: PaymentEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Payment webhook rejected: malformed payload: {}", e);
            return Ok(ack(false));
        }
    };

    if event.event_type != EVENT_PAYMENT_SUCCEEDED {
        tracing::debug!("Ignoring payment webhook event type '{}'", event.event_type);
        return Ok(ack(false));
    }

    if premium::reference_already_processed(&pool, &event.reference_number).await? {
        tracing::info!(
            "Payment webhook for reference {} already processed",
            event.reference_number
        );
        return Ok(ack(true));
    }

    let mut tx = pool.begin().await?;
    let activation = Activation {
        user_id: event.user_id,
        plan: premium::PLAN_SEASON_PASS,
        payment_method: &event.payment_method,
        reference_number: &event.reference_number,
        expires_at: None,
    };

    match premium::activate_premium(&mut tx, &activation).await {
        Ok(()) => {
            tx.commit().await?;
            tracing::info!(
                "Premium activated for user {} via webhook reference {} ({} centavos)",
                event.user_id,
                event.reference_number,
                event.amount
            );
            Ok(ack(true))
        }
        Err(AppError::NotFound(_)) => {
            // Unknown user in a correctly signed event: unfixable upstream,
            // acknowledge so it is not redelivered forever.
            tracing::warn!(
                "Payment webhook for unknown user {} (reference {})",
                event.user_id,
                event.reference_number
            );
            Ok(ack(false))
        }
        Err(e) => Err(e),
    }
}
