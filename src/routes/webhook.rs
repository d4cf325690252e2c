// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Stripe payment events.

use crate::error::AppError;
use crate::services::payments::{complete_payment, fail_payment};
use crate::services::stripe::{verify_webhook_signature, StripeEvent};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stripe-webhook", post(handle_event))
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Handle a gateway event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    match state.stripe.webhook_secret() {
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    tracing::warn!("Webhook rejected: missing signature");
                    AppError::BadRequest("Missing Stripe-Signature header".to_string())
                })?;

            let now = chrono::Utc::now().timestamp();
            if !verify_webhook_signature(&body, signature, secret, now) {
                tracing::warn!("Security Alert: Webhook signature mismatch");
                return Err(AppError::BadRequest(
                    "Webhook signature verification failed".to_string(),
                ));
            }
        }
        None => {
            tracing::warn!("Webhook secret not configured, accepting unsigned event");
        }
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Received webhook event"
    );

    let intent_id = event
        .data
        .object
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            if complete_payment(&state.db, intent_id, chrono::Utc::now())?.is_none() {
                tracing::warn!(payment_intent = intent_id, "Succeeded event for unknown payment");
            }
        }
        "payment_intent.payment_failed" => {
            if fail_payment(&state.db, intent_id).is_none() {
                tracing::warn!(payment_intent = intent_id, "Failed event for unknown payment");
            }
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring webhook event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}
