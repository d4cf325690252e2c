// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use assurly::config::Config;
use assurly::db::MemoryDb;
use assurly::routes::create_router;
use assurly::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
#[allow(dead_code)]
pub const ADMIN_EMAIL: &str = "admin@assurly.io";
#[allow(dead_code)]
pub const ADMIN_PASSWORD: &str = "admin-password-1";

/// Requests seen by the fake upstream APIs.
#[derive(Clone, Default)]
pub struct FakeUpstream {
    pub base_url: String,
    pub ai_requests: Arc<AtomicUsize>,
    /// Raw form bodies sent to the payment gateway
    pub payment_requests: Arc<Mutex<Vec<String>>>,
    /// JSON bodies sent to the email API
    pub emails: Arc<Mutex<Vec<Value>>>,
}

#[allow(dead_code)]
impl FakeUpstream {
    pub fn ai_request_count(&self) -> usize {
        self.ai_requests.load(Ordering::SeqCst)
    }

    pub fn payment_requests(&self) -> Vec<String> {
        self.payment_requests.lock().unwrap().clone()
    }

    pub fn emails(&self) -> Vec<Value> {
        self.emails.lock().unwrap().clone()
    }
}

/// Create a test app with no third-party integrations configured.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(test_config())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, MemoryDb::new()));
    state
        .bootstrap_admin()
        .expect("Failed to create bootstrap admin");
    (create_router(state.clone()), state)
}

/// Create a test app wired to a local fake of the AI, payment and email APIs.
#[allow(dead_code)]
pub async fn create_integrated_app() -> (Router, Arc<AppState>, FakeUpstream) {
    let upstream = spawn_fake_upstream().await;

    let config = Config {
        openai_base_url: format!("{}/v1", upstream.base_url),
        openai_api_key: Some("sk-test".to_string()),
        stripe_api_base: format!("{}/stripe/v1", upstream.base_url),
        stripe_secret_key: Some("sk_test_stripe".to_string()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        sendgrid_api_base: format!("{}/sendgrid/v3", upstream.base_url),
        sendgrid_api_key: Some("SG.test".to_string()),
        ..test_config()
    };

    let (app, state) = create_test_app_with(config);
    (app, state, upstream)
}

fn test_config() -> Config {
    Config {
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ..Config::default()
    }
}

// ─── Fake upstream ───────────────────────────────────────────

async fn spawn_fake_upstream() -> FakeUpstream {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().unwrap();

    let upstream = FakeUpstream {
        base_url: format!("http://{}", addr),
        ..Default::default()
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(fake_chat))
        .route("/stripe/v1/payment_intents", post(fake_payment_intent))
        .route("/sendgrid/v3/mail/send", post(fake_mail_send))
        .with_state(upstream.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    upstream
}

/// Chat completions. Replies are driven by markers in the document text:
/// `PCT=<n>` sets the competitor's price difference, `BETTER=<n>` the number
/// of better-coverage items, and `RATE_LIMIT` triggers a 429.
async fn fake_chat(State(upstream): State<FakeUpstream>, Json(body): Json<Value>) -> Response {
    upstream.ai_requests.fetch_add(1, Ordering::SeqCst);

    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .cloned()
        .unwrap_or(Value::Null);

    // PDF extraction sends structured content
    let Some(prompt) = last["content"].as_str() else {
        return completion("Current policy: car insurance, annual premium 5000 DKK");
    };

    if prompt.contains("RATE_LIMIT") {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }

    let reply = if let Some(competitor) = prompt.split("Competitor Quote:").nth(1) {
        let pct = marker(competitor, "PCT=").unwrap_or(0.0);
        let better = marker(competitor, "BETTER=").unwrap_or(0.0) as usize;
        let difference = 5000.0 * pct / 100.0;
        json!({
            "priceComparison": {
                "currentPremium": 5000.0,
                "competitorPremium": 5000.0 + difference,
                "difference": difference,
                "percentageDifference": pct,
            },
            "coverageComparison": {
                "betterCoverage": (0..better).map(|i| format!("Better cover {}", i)).collect::<Vec<_>>(),
                "worseCoverage": [],
                "similarCoverage": ["Liability"],
            },
            "termComparison": {"betterTerms": [], "worseTerms": [], "similarTerms": []},
            "recommendation": "Competitor differs on price",
        })
    } else if prompt.contains("Ekstrahér") {
        json!({
            "insuranceType": "hus",
            "insuranceCompany": "Tryg",
            "productName": "Husforsikring Plus",
            "annualPremium": 4200.0,
            "coverageLevel": "medium",
            "extractedData": {"deductible": "2500"},
        })
    } else {
        json!({
            "coverageGaps": ["No roadside assistance"],
            "overInsurance": ["Duplicate glass cover"],
            "improvements": ["Review deductible"],
            "premiumOptimization": ["Premium above market average"],
            "riskAssessment": "Moderate risk profile",
            "summary": "Comprehensive car policy <with> gaps",
            "impactScore": 72,
            "issueCount": 3,
            "severity": "medium",
        })
    };

    completion(&reply.to_string())
}

fn marker(text: &str, key: &str) -> Option<f64> {
    let rest = &text[text.find(key)? + key.len()..];
    let value: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    value.parse().ok()
}

fn completion(content: &str) -> Response {
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

async fn fake_payment_intent(State(upstream): State<FakeUpstream>, body: String) -> Response {
    let n = {
        let mut requests = upstream.payment_requests.lock().unwrap();
        requests.push(body.clone());
        requests.len()
    };

    let amount: i64 = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("amount="))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    Json(json!({
        "id": format!("pi_fake_{}", n),
        "client_secret": format!("pi_fake_{}_secret", n),
        "amount": amount,
        "currency": "dkk",
        "metadata": {},
    }))
    .into_response()
}

async fn fake_mail_send(State(upstream): State<FakeUpstream>, Json(body): Json<Value>) -> StatusCode {
    upstream.emails.lock().unwrap().push(body);
    StatusCode::ACCEPTED
}

// ─── Request helpers ─────────────────────────────────────────

/// Send one request through the router.
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

/// Build a JSON request, optionally with a session cookie.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a bodyless request, optionally with a session cookie.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// The `assurly_session=<token>` pair from a response, if one was set.
#[allow(dead_code)]
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("assurly_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// A file part for [`multipart_request`].
#[allow(dead_code)]
pub struct FilePart<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

#[allow(dead_code)]
pub fn text_file<'a>(filename: &'a str, text: &'a str) -> FilePart<'a> {
    FilePart {
        filename,
        content_type: "text/plain",
        data: text.as_bytes(),
    }
}

const BOUNDARY: &str = "assurly-test-boundary";

/// Build a multipart upload to `/api/upload`.
#[allow(dead_code)]
pub fn multipart_request(
    files: &[FilePart<'_>],
    fields: &[(&str, &str)],
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"documents\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.filename, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Upload files anonymously. Returns the session cookie and the response JSON.
#[allow(dead_code)]
pub async fn upload(
    app: &Router,
    files: &[FilePart<'_>],
    fields: &[(&str, &str)],
    cookie: Option<&str>,
) -> (Option<String>, StatusCode, Value) {
    let response = send(app, multipart_request(files, fields, cookie)).await;
    let status = response.status();
    let cookie = session_cookie(&response).or_else(|| cookie.map(str::to_string));
    (cookie, status, json_body(response).await)
}

/// Register a user and return their session cookie.
#[allow(dead_code)]
pub async fn register(app: &Router, email: &str, cookie: Option<&str>) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/register",
            cookie,
            json!({"email": email, "password": "correct-horse"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("register should set a session cookie")
}

/// Log in as the bootstrap admin and return the session cookie.
#[allow(dead_code)]
pub async fn admin_login(app: &Router) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/admin/login",
            None,
            json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("admin login should set a session cookie")
}
