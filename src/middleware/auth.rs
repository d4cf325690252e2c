// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and authentication middleware.
//!
//! Every request carries a [`Session`]: decoded from the signed
//! `assurly_session` cookie (or a Bearer token), or freshly issued as an
//! anonymous session. `require_auth` and `require_admin` gate the protected
//! routers on top of that.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "assurly_session";

/// Session lifetime in hours.
pub const SESSION_TTL_HOURS: i64 = 24;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (session ID)
    pub sub: String,
    /// Logged-in user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Logged-in admin, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aid: Option<u64>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Per-request session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<u64>,
    pub admin_id: Option<u64>,
}

impl Session {
    /// A new session with no user or admin attached.
    pub fn anonymous() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            admin_id: None,
        }
    }
}

/// Authenticated user extracted from the session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
}

/// Authenticated admin extracted from the session.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub admin_id: u64,
}

/// Create a signed token for a session.
pub fn create_session_token(session: &Session, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: session.id.clone(),
        uid: session.user_id,
        aid: session.admin_id,
        iat: now,
        exp: now + (SESSION_TTL_HOURS as usize) * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Decode and validate a session token. Expired or tampered tokens yield `None`.
pub fn decode_session_token(token: &str, signing_key: &[u8]) -> Option<Session> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<Claims>(token, &key, &validation).ok()?;
    Some(Session {
        id: data.claims.sub,
        user_id: data.claims.uid,
        admin_id: data.claims.aid,
    })
}

/// Build the session cookie carrying `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

/// Sign `session` and add its cookie to `jar`.
pub fn issue_session(
    jar: CookieJar,
    session: &Session,
    state: &AppState,
) -> Result<CookieJar, AppError> {
    let token = create_session_token(session, &state.config.session_signing_key)?;
    Ok(jar.add(session_cookie(token, state.config.cookie_secure)))
}

/// Token from the session cookie, falling back to the Authorization header.
fn request_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Attach a [`Session`] to every request.
///
/// Requests without a valid token get a new anonymous session, whose cookie
/// is set on the response unless the handler already set one.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = request_token(&jar, &request)
        .and_then(|token| decode_session_token(&token, &state.config.session_signing_key));

    let (session, fresh) = match existing {
        Some(session) => (session, false),
        None => (Session::anonymous(), true),
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    if !fresh || response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }

    match issue_session(CookieJar::new(), &session, &state) {
        Ok(jar) => (jar, response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue session cookie");
            response
        }
    }
}

/// Middleware that requires a logged-in user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .extensions()
        .get::<Session>()
        .and_then(|s| s.user_id)
        .ok_or(AppError::Unauthorized)?;

    if state.db.get_user(user_id).is_none() {
        return Err(AppError::Unauthorized);
    }

    request.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(request).await)
}

/// Middleware that requires a logged-in, active admin.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let admin_id = request
        .extensions()
        .get::<Session>()
        .and_then(|s| s.admin_id)
        .ok_or(AppError::Unauthorized)?;

    match state.db.get_admin_user(admin_id) {
        Some(admin) if admin.is_active => {}
        _ => return Err(AppError::Unauthorized),
    }

    request.extensions_mut().insert(AuthAdmin { admin_id });
    Ok(next.run(request).await)
}
