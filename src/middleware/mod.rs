// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (sessions, authentication, security headers).

pub mod auth;
pub mod security;

pub use auth::{load_session, require_admin, require_auth, AuthAdmin, AuthUser, Session};
