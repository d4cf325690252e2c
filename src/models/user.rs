//! User and admin models for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Tier;

/// Registered customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    /// Login email (unique, stored lowercased)
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_tier: Tier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the user holds an unexpired annual subscription.
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription_tier == Tier::Annual
            && self.subscription_expires_at.map_or(true, |exp| exp > now)
    }
}

/// Admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    #[default]
    Admin,
    SuperAdmin,
}

/// Back-office account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: u64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: AdminRole,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AdminUser {
    /// Check a presented reset token against the stored one.
    pub fn reset_token_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        use subtle::ConstantTimeEq;

        match (&self.reset_token, self.reset_token_expires_at) {
            (Some(stored), Some(expires_at)) if expires_at > now => {
                stored.as_bytes().ct_eq(token.as_bytes()).into()
            }
            _ => false,
        }
    }
}

/// Customer as seen by the admin panel, grouped by session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub session_id: String,
    /// Account email when known, otherwise a synthetic address
    pub email: String,
    pub analyses_count: usize,
    pub policies_uploaded: usize,
    pub last_analysis: DateTime<Utc>,
}
