// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe client: payment intents and webhook verification.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::pricing::Currency;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Payment methods offered at checkout.
const PAYMENT_METHOD_TYPES: [&str; 2] = ["card", "mobilepay"];

/// Payment intent as returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Stripe REST client. Runs unconfigured when no secret key is set.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
}

impl StripeClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Endpoint secret for webhook signatures, if configured.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    /// Create a payment intent for `amount_minor` in `currency`.
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: Currency,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent> {
        let secret_key = self.secret_key.as_deref().ok_or_else(|| {
            AppError::ServiceUnavailable("Payment gateway not configured".to_string())
        })?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.code().to_lowercase()),
        ];
        for method in PAYMENT_METHOD_TYPES {
            form.push(("payment_method_types[]".to_string(), method.to_string()));
        }
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let url = format!("{}/payment_intents", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        let intent: PaymentIntent = self.check_response_json(response).await?;
        tracing::info!(
            payment_intent = %intent.id,
            amount_minor,
            currency = %currency,
            "Payment intent created"
        );
        Ok(intent)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentGateway(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Failed to parse response: {}", e)))
    }
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed payload is `"{t}.{body}"`. Timestamps more than
/// [`WEBHOOK_TOLERANCE_SECS`] away from `now` are rejected.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> bool {
    let mut timestamp = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => signatures.push(value),
                _ => {}
            }
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if signatures.is_empty() {
        return false;
    }
    let within_tolerance = now
        .checked_sub(ts)
        .is_some_and(|skew| skew.unsigned_abs() <= WEBHOOK_TOLERANCE_SECS.unsigned_abs());
    if !within_tolerance {
        tracing::warn!(timestamp = ts, now, "Webhook timestamp outside tolerance");
        return false;
    }

    let expected = sign_payload(payload, timestamp, secret);
    signatures
        .iter()
        .any(|sig| bool::from(sig.as_bytes().ct_eq(expected.as_bytes())))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn sign_payload(payload: &[u8], timestamp: &str, secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
