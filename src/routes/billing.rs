// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pricing, checkout and discount code routes.

use crate::error::{AppError, Result};
use crate::middleware::Session;
use crate::models::{DiscountCode, Payment, PaymentStatus, Tier};
use crate::services::payments::complete_payment;
use crate::services::pricing::{
    apply_discount, pricing_table, tier_price, to_minor_units, DiscountedPrice, TierPrices,
};
use crate::services::Currency;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/pricing/{currency}", get(get_pricing))
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/validate-discount", post(validate_discount))
}

// ─── Pricing ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PricingResponse {
    pub currency: String,
    pub pricing: TierPrices,
}

/// Tier prices in one currency.
async fn get_pricing(Path(currency): Path<String>) -> Result<Json<PricingResponse>> {
    let currency: Currency = currency.parse()?;
    Ok(Json(PricingResponse {
        currency: currency.code().to_string(),
        pricing: pricing_table(currency),
    }))
}

// ─── Checkout ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub analysis_type: Tier,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub analysis_id: Option<u64>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub discount_code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    /// `None` when a discount covers the whole price and nothing is charged
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount: f64,
    pub original_amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountedPrice>,
}

/// Create a gateway payment intent for a tier, priced on the server.
async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>> {
    request.validate()?;

    if !request.analysis_type.is_paid() {
        return Err(AppError::BadRequest(
            "Free analyses require no payment".to_string(),
        ));
    }

    let currency: Currency = request.currency.as_deref().unwrap_or("DKK").parse()?;

    if let Some(analysis_id) = request.analysis_id {
        let analysis = state
            .db
            .get_analysis(analysis_id)
            .ok_or_else(|| AppError::NotFound(format!("Analysis {} not found", analysis_id)))?;
        let owned = match analysis.user_id {
            Some(owner) => session.user_id == Some(owner),
            None => analysis.session_id == session.id,
        };
        if !owned {
            return Err(AppError::Forbidden(
                "Analysis belongs to another session".to_string(),
            ));
        }
        if analysis.analysis_type != request.analysis_type {
            return Err(AppError::BadRequest(format!(
                "Payment tier {} does not match {} analysis",
                request.analysis_type, analysis.analysis_type
            )));
        }
    }

    let original_amount = tier_price(request.analysis_type, currency);
    let (discount_code, discount) = match request.discount_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let discount_code = find_active_code(&state, code)?;
            let price = apply_discount(original_amount, discount_code.discount_percentage)?;
            (Some(discount_code), Some(price))
        }
        _ => (None, None),
    };
    let amount = discount.map_or(original_amount, |d| d.final_amount);
    let amount_minor = to_minor_units(amount);

    let mut payment = Payment {
        id: 0,
        user_id: session.user_id,
        stripe_payment_intent_id: String::new(),
        amount,
        original_amount,
        currency: currency.code().to_string(),
        status: PaymentStatus::Pending,
        analysis_id: request.analysis_id,
        analysis_type: request.analysis_type,
        discount_code_id: discount_code.as_ref().map(|c| c.id),
        created_at: Utc::now(),
    };

    // Fully discounted: nothing to charge, complete right away.
    if amount_minor == 0 {
        payment.stripe_payment_intent_id = format!("free_{}", uuid::Uuid::new_v4().simple());
        let payment = state.db.create_payment(payment);
        let payment = complete_payment(&state.db, &payment.stripe_payment_intent_id, Utc::now())?
            .unwrap_or(payment);

        tracing::info!(payment_id = payment.id, "Fully discounted checkout completed");
        return Ok(Json(PaymentIntentResponse {
            client_secret: None,
            payment_intent_id: payment.stripe_payment_intent_id,
            amount: payment.amount,
            original_amount: payment.original_amount,
            currency: payment.currency,
            status: payment.status,
            discount,
        }));
    }

    let mut metadata = vec![
        ("analysisType", request.analysis_type.to_string()),
        (
            "userId",
            session
                .user_id
                .map_or_else(|| "anonymous".to_string(), |id| id.to_string()),
        ),
    ];
    if let Some(analysis_id) = request.analysis_id {
        metadata.push(("analysisId", analysis_id.to_string()));
    }
    if let Some(code) = &discount_code {
        metadata.push(("discountCode", code.code.clone()));
    }

    let intent = state
        .stripe
        .create_payment_intent(amount_minor, currency, &metadata)
        .await?;

    payment.stripe_payment_intent_id = intent.id.clone();
    let payment = state.db.create_payment(payment);

    tracing::info!(
        payment_id = payment.id,
        payment_intent = %intent.id,
        tier = %request.analysis_type,
        amount,
        currency = %currency,
        discounted = discount.is_some(),
        "Checkout started"
    );

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount: payment.amount,
        original_amount: payment.original_amount,
        currency: payment.currency,
        status: payment.status,
        discount,
    }))
}

// ─── Discount Validation ─────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, max = 50, message = "Discount code required"))]
    pub code: String,
    /// Explicit amount to discount
    #[serde(default)]
    pub amount: Option<f64>,
    /// Price this tier instead of taking `amount`
    #[serde(default)]
    pub analysis_type: Option<Tier>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeInfo {
    pub id: u64,
    pub code: String,
    pub discount_percentage: f64,
    pub description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountResponse {
    pub valid: bool,
    pub discount_code: DiscountCodeInfo,
    pub pricing: DiscountedPrice,
}

/// Preview the price after a discount code.
async fn validate_discount(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateDiscountRequest>,
) -> Result<Json<ValidateDiscountResponse>> {
    request.validate()?;

    let original = match (request.analysis_type, request.amount) {
        (Some(tier), _) => {
            let currency: Currency = request.currency.as_deref().unwrap_or("DKK").parse()?;
            tier_price(tier, currency)
        }
        (None, Some(amount)) => amount,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either amount or analysisType is required".to_string(),
            ))
        }
    };

    let code = find_active_code(&state, request.code.trim())?;
    let pricing = apply_discount(original, code.discount_percentage)?;

    Ok(Json(ValidateDiscountResponse {
        valid: true,
        discount_code: DiscountCodeInfo {
            id: code.id,
            code: code.code,
            discount_percentage: code.discount_percentage,
            description: code.description,
        },
        pricing,
    }))
}

/// Look up a code, rejecting unknown (404) and inactive (400) ones.
fn find_active_code(state: &AppState, code: &str) -> Result<DiscountCode> {
    let discount_code = state
        .db
        .get_discount_code_by_code(code)
        .ok_or_else(|| AppError::NotFound("Invalid discount code".to_string()))?;

    if !discount_code.is_active {
        return Err(AppError::BadRequest("Discount code is inactive".to_string()));
    }
    Ok(discount_code)
}
