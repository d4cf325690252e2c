// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Customer account routes: register, login, logout and profile.

use axum::{extract::State, routing::get, routing::post, Extension, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::issue_session;
use crate::middleware::{AuthUser, Session};
use crate::models::{Tier, User};
use crate::services::password::{hash_password, verify_password};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
}

/// Routes that need a logged-in user. The auth middleware is applied in
/// routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/user", get(get_user))
}

#[derive(Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Current user response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub email: String,
    pub subscription_tier: Tier,
    pub subscription_expires_at: Option<String>,
    pub has_active_subscription: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            has_active_subscription: user.has_active_subscription(chrono::Utc::now()),
            id: user.id,
            email: user.email,
            subscription_tier: user.subscription_tier,
            subscription_expires_at: user.subscription_expires_at.map(format_utc_rfc3339),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Create an account and log it in on the current session.
async fn register(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    request.validate()?;

    let password_hash = hash_password(&request.password)?;
    let user = state.db.create_user(&request.email, password_hash)?;
    tracing::info!(user_id = user.id, "User registered");

    let jar = log_in(jar, session, user.id, &state)?;
    Ok((jar, Json(user.into())))
}

/// Log in with email and password.
async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    let user = state
        .db
        .get_user_by_email(&request.email)
        .filter(|u| verify_password(&request.password, &u.password_hash))
        .ok_or_else(|| {
            tracing::warn!("Failed user login attempt");
            AppError::Unauthorized
        })?;

    tracing::info!(user_id = user.id, "User logged in");
    let jar = log_in(jar, session, user.id, &state)?;
    Ok((jar, Json(user.into())))
}

/// Attach `user_id` to the session, keeping the session id so anonymous
/// uploads stay reachable.
fn log_in(jar: CookieJar, session: Session, user_id: u64, state: &AppState) -> Result<CookieJar> {
    let session = Session {
        user_id: Some(user_id),
        ..session
    };
    issue_session(jar, &session, state)
}

/// Replace the session with a fresh anonymous one.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>)> {
    if let Some(user_id) = session.user_id {
        tracing::info!(user_id, "User logged out");
    }
    let jar = issue_session(jar, &Session::anonymous(), &state)?;
    Ok((jar, Json(LogoutResponse { success: true })))
}

/// Get current user profile.
async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;
    Ok(Json(profile.into()))
}
