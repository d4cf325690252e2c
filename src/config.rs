//! Application configuration loaded from environment variables.
//!
//! Third-party integrations (AI, payments, email) are optional: when a key is
//! absent the corresponding client runs in "not configured" mode.

use std::env;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_SENDGRID_API_BASE: &str = "https://api.sendgrid.com/v3";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS and links in emails
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Mark session cookies `Secure` (enable behind HTTPS)
    pub cookie_secure: bool,
    /// OpenAI-compatible API base URL
    pub openai_base_url: String,
    /// Chat model used for analysis
    pub openai_model: String,
    /// Stripe REST API base URL
    pub stripe_api_base: String,
    /// SendGrid v3 API base URL
    pub sendgrid_api_base: String,
    /// Sender address for analysis reports
    pub report_from_address: String,
    /// Sender address for campaigns and account mail
    pub campaign_from_address: String,
    /// Seconds between expired-record cleanup runs (0 disables)
    pub cleanup_interval_secs: u64,

    // --- Secrets ---
    /// HS256 signing key for session tokens (raw bytes)
    pub session_signing_key: Vec<u8>,
    pub openai_api_key: Option<String>,
    pub stripe_secret_key: Option<String>,
    /// Stripe webhook endpoint secret (`whsec_...`)
    pub stripe_webhook_secret: Option<String>,
    pub sendgrid_api_key: Option<String>,

    // --- Bootstrap admin ---
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            cookie_secure: false,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            sendgrid_api_base: DEFAULT_SENDGRID_API_BASE.to_string(),
            report_from_address: "reports@assurly.io".to_string(),
            campaign_from_address: "noreply@assurly.io".to_string(),
            cleanup_interval_secs: 0,
            session_signing_key: b"test_session_key_32_bytes_min!!".to_vec(),
            openai_api_key: None,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            sendgrid_api_key: None,
            admin_email: None,
            admin_password: None,
            admin_name: "Administrator".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let session_signing_key = env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?
            .into_bytes();
        if session_signing_key.len() < 32 {
            return Err(ConfigError::Invalid(
                "SESSION_SECRET",
                "must be at least 32 bytes".to_string(),
            ));
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw.clone()))?,
            Err(_) => 8080,
        };

        let cleanup_interval_secs = match env::var("CLEANUP_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("CLEANUP_INTERVAL_SECS", raw.clone()))?,
            Err(_) => 3600,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            sendgrid_api_base: env::var("SENDGRID_API_BASE")
                .unwrap_or_else(|_| DEFAULT_SENDGRID_API_BASE.to_string()),
            report_from_address: env::var("REPORT_FROM_ADDRESS")
                .unwrap_or_else(|_| "reports@assurly.io".to_string()),
            campaign_from_address: env::var("CAMPAIGN_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@assurly.io".to_string()),
            cleanup_interval_secs,

            session_signing_key,
            openai_api_key: optional_secret("OPENAI_API_KEY"),
            stripe_secret_key: optional_secret("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional_secret("STRIPE_WEBHOOK_SECRET"),
            sendgrid_api_key: optional_secret("SENDGRID_API_KEY"),

            admin_email: optional_secret("ADMIN_EMAIL"),
            admin_password: optional_secret("ADMIN_PASSWORD"),
            admin_name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
        })
    }
}

/// Read an optional secret, treating empty values as unset.
fn optional_secret(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
