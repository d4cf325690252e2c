// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin panel routes.

use crate::db::{CleanupStats, DiscountUsageFilter};
use crate::error::{AppError, Result};
use crate::middleware::auth::issue_session;
use crate::middleware::{AuthAdmin, Session};
use crate::models::{
    AdminUser, Customer, DiscountCode, DiscountUsageReport, InsuranceData, InsuranceDataStats,
};
use crate::services::password::{generate_reset_token, hash_password, verify_password};
use crate::services::pricing::validate_percentage;
use crate::time_utils::{parse_date_param, DayBound};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidateEmail};

/// Reset tokens are valid for one hour.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

/// Admin auth routes (no admin session required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/reset-password", post(request_password_reset))
        .route("/api/admin/update-password", post(update_password))
}

/// Admin panel routes. The admin middleware is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/me", get(get_me))
        .route("/api/admin/customers", get(list_customers))
        .route("/api/admin/send-campaign", post(send_campaign))
        .route(
            "/api/admin/discount-codes",
            get(list_discount_codes).post(create_discount_code),
        )
        .route(
            "/api/admin/discount-codes/{id}/status",
            patch(set_discount_code_status),
        )
        .route(
            "/api/admin/discount-codes/{id}",
            axum::routing::delete(delete_discount_code),
        )
        .route("/api/admin/discount-usage", get(discount_usage))
        .route("/api/admin/insurance-data/stats", get(insurance_stats))
        .route(
            "/api/admin/insurance-data/by-postcode/{postcode}",
            get(insurance_by_postcode),
        )
        .route(
            "/api/admin/insurance-data/by-type/{insurance_type}",
            get(insurance_by_type),
        )
        .route("/api/admin/cleanup", post(cleanup))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

// ─── Admin Auth ──────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password required"))]
    pub password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Json(request): Json<AdminLoginRequest>,
) -> Result<(CookieJar, Json<AdminUser>)> {
    request.validate()?;

    let admin = state
        .db
        .get_admin_user_by_email(&request.email)
        .filter(|a| a.is_active && verify_password(&request.password, &a.password_hash))
        .ok_or_else(|| {
            tracing::warn!("Failed admin login attempt");
            AppError::Unauthorized
        })?;

    let now = Utc::now();
    state.db.update_admin_last_login(admin.id, now);

    let session = Session {
        admin_id: Some(admin.id),
        ..session
    };
    let jar = issue_session(jar, &session, &state)?;

    tracing::info!(admin_id = admin.id, "Admin logged in");
    Ok((
        jar,
        Json(AdminUser {
            last_login_at: Some(now),
            ..admin
        }),
    ))
}

/// Drop the admin from the session, keeping any customer login.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    if let Some(admin_id) = session.admin_id {
        tracing::info!(admin_id, "Admin logged out");
    }
    let session = Session {
        admin_id: None,
        ..session
    };
    let jar = issue_session(jar, &session, &state)?;
    Ok((jar, MessageResponse::ok("Logged out")))
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Email a reset link. The reply is the same whether or not the admin exists.
async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;

    let Some(admin) = state
        .db
        .get_admin_user_by_email(&request.email)
        .filter(|a| a.is_active)
    else {
        tracing::info!("Password reset requested for unknown admin");
        return Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE));
    };

    let token = generate_reset_token()?;
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    state
        .db
        .set_admin_reset_token(admin.id, token.clone(), expires_at);

    if state.mailer.send_password_reset(&admin.email, &token).await {
        tracing::info!(admin_id = admin.id, "Password reset email sent");
    } else {
        tracing::warn!(admin_id = admin.id, "Password reset email not sent");
        tracing::debug!(admin_id = admin.id, reset_token = %token, "Reset token issued");
    }

    Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE))
}

#[derive(Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Reset token required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

async fn update_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;

    let admin = state
        .db
        .get_admin_by_reset_token(&request.token, Utc::now())
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    let password_hash = hash_password(&request.password)?;
    state.db.update_admin_password(admin.id, password_hash)?;

    tracing::info!(admin_id = admin.id, "Admin password updated");
    Ok(MessageResponse::ok("Password updated"))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
) -> Result<Json<AdminUser>> {
    state
        .db
        .get_admin_user(admin.admin_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Admin {} not found", admin.admin_id)))
}

// ─── Customers & Campaigns ───────────────────────────────────

async fn list_customers(State(state): State<Arc<AppState>>) -> Json<Vec<Customer>> {
    Json(state.db.customer_summaries())
}

#[derive(Deserialize, Validate)]
pub struct CampaignRequest {
    #[validate(length(min = 1, max = 200, message = "Subject required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Content required"))]
    pub content: String,
    #[validate(length(min = 1, message = "At least one recipient required"))]
    pub recipients: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Send a campaign mail to each recipient individually.
async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<CampaignResponse>> {
    request.validate()?;

    if let Some(bad) = request.recipients.iter().find(|r| !r.validate_email()) {
        return Err(AppError::BadRequest(format!(
            "Invalid recipient address: {}",
            bad
        )));
    }

    let mut sent_count = 0;
    for recipient in &request.recipients {
        if state
            .mailer
            .send_campaign(recipient, &request.subject, &request.content)
            .await
        {
            sent_count += 1;
        }
    }
    let failed_count = request.recipients.len() - sent_count;

    tracing::info!(
        admin_id = admin.admin_id,
        sent_count,
        failed_count,
        "Campaign sent"
    );

    Ok(Json(CampaignResponse {
        message: format!("Campaign sent to {} recipients", sent_count),
        sent_count,
        failed_count,
    }))
}

// ─── Discount Codes ──────────────────────────────────────────

async fn list_discount_codes(State(state): State<Arc<AppState>>) -> Json<Vec<DiscountCode>> {
    Json(state.db.list_discount_codes())
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1-50 characters"))]
    pub code: String,
    pub discount_percentage: f64,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

async fn create_discount_code(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    Json(request): Json<CreateDiscountCodeRequest>,
) -> Result<(StatusCode, Json<DiscountCode>)> {
    request.validate()?;
    validate_percentage(request.discount_percentage)?;

    let code = request.code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::BadRequest(
            "Code may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    let discount = state.db.create_discount_code(
        code,
        request.discount_percentage,
        request.description.filter(|d| !d.trim().is_empty()),
        Some(admin.admin_id),
    )?;

    tracing::info!(
        admin_id = admin.admin_id,
        discount_code_id = discount.id,
        code = %discount.code,
        percentage = discount.discount_percentage,
        "Discount code created"
    );
    Ok((StatusCode::CREATED, Json(discount)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountStatusRequest {
    pub is_active: bool,
}

async fn set_discount_code_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<DiscountStatusRequest>,
) -> Result<Json<DiscountCode>> {
    let discount = state.db.set_discount_code_active(id, request.is_active)?;
    tracing::info!(
        discount_code_id = id,
        is_active = request.is_active,
        "Discount code status changed"
    );
    Ok(Json(discount))
}

async fn delete_discount_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<MessageResponse>> {
    state.db.delete_discount_code(id)?;
    tracing::info!(discount_code_id = id, "Discount code deleted");
    Ok(MessageResponse::ok("Discount code deleted"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountUsageQuery {
    pub code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

async fn discount_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscountUsageQuery>,
) -> Result<Json<Vec<DiscountUsageReport>>> {
    let filter = DiscountUsageFilter {
        code: query.code.filter(|c| !c.trim().is_empty()),
        start: parse_bound(query.start_date.as_deref(), DayBound::Start)?,
        end: parse_bound(query.end_date.as_deref(), DayBound::End)?,
    };
    Ok(Json(state.db.discount_usage_report(&filter)))
}

fn parse_bound(value: Option<&str>, bound: DayBound) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date_param(v, bound)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid date: {}", v))),
        None => Ok(None),
    }
}

// ─── Insurance Data ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceStatsQuery {
    pub postcode: Option<String>,
    pub insurance_type: Option<String>,
}

async fn insurance_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InsuranceStatsQuery>,
) -> Json<InsuranceDataStats> {
    Json(
        state
            .db
            .insurance_data_stats(query.postcode.as_deref(), query.insurance_type.as_deref()),
    )
}

async fn insurance_by_postcode(
    State(state): State<Arc<AppState>>,
    Path(postcode): Path<String>,
) -> Json<Vec<InsuranceData>> {
    Json(state.db.insurance_data_by_postcode(&postcode))
}

async fn insurance_by_type(
    State(state): State<Arc<AppState>>,
    Path(insurance_type): Path<String>,
) -> Json<Vec<InsuranceData>> {
    Json(state.db.insurance_data_by_type(&insurance_type))
}

// ─── Maintenance ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct CleanupResponse {
    pub message: String,
    #[serde(flatten)]
    pub stats: CleanupStats,
}

/// Delete expired documents and analyses now.
async fn cleanup(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
) -> Json<CleanupResponse> {
    let stats = state.db.cleanup_expired(Utc::now());
    tracing::info!(
        admin_id = admin.admin_id,
        documents_deleted = stats.documents_deleted,
        analyses_deleted = stats.analyses_deleted,
        "Manual cleanup completed"
    );
    Json(CleanupResponse {
        message: "Cleanup completed".to_string(),
        stats,
    })
}
