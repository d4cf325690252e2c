// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Analysis routes: run, fetch and list.

use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, Session};
use crate::models::{
    Analysis, AnalysisStatus, ComparisonReport, CoverageAnalysis, EmailReportStatus, Tier,
};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/analyze/{id}", post(run_analysis))
        .route("/api/analysis/{id}", get(get_analysis))
}

/// Routes that need a logged-in user. The auth middleware is applied in
/// routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/analyses", get(list_analyses))
}

/// Optional body for `POST /api/analyze/{id}`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AnalyzeRequest {
    /// Also send the report to this address
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub id: u64,
    pub analysis_type: Tier,
    pub status: AnalysisStatus,
    pub analysis_data: Option<CoverageAnalysis>,
    pub comparison_data: Option<ComparisonReport>,
    pub created_at: String,
    pub expires_at: Option<String>,
    /// Whether a requested report email went out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
}

impl From<Analysis> for AnalysisResponse {
    fn from(analysis: Analysis) -> Self {
        Self {
            id: analysis.id,
            analysis_type: analysis.analysis_type,
            status: analysis.status,
            analysis_data: analysis.analysis_data,
            comparison_data: analysis.comparison_data,
            created_at: format_utc_rfc3339(analysis.created_at),
            expires_at: analysis.expires_at.map(format_utc_rfc3339),
            email_sent: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: u64,
    pub analysis_type: Tier,
    pub status: AnalysisStatus,
    pub document_count: usize,
    pub created_at: String,
}

/// Run an analysis and return its results.
async fn run_analysis(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Result<Json<AnalysisResponse>> {
    // The body is optional; an empty one means no report email.
    let request: AnalyzeRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyzeRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };
    request.validate()?;

    let analysis = load_owned(&state, &session, id)?;
    ensure_paid_access(&state, &session, &analysis)?;

    let analysis = state.analysis_processor().run(id).await?.into_analysis();

    let email_sent = match &request.email {
        Some(email) => Some(send_report(&state, &analysis, email).await),
        None => None,
    };

    let mut response = AnalysisResponse::from(analysis);
    response.email_sent = email_sent;
    Ok(Json(response))
}

/// Fetch a stored analysis.
async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<u64>,
) -> Result<Json<AnalysisResponse>> {
    let analysis = load_owned(&state, &session, id)?;
    Ok(Json(analysis.into()))
}

/// List the current user's analyses, newest first.
async fn list_analyses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AnalysisSummary>>> {
    let summaries = state
        .db
        .get_analyses_by_user(user.user_id)
        .into_iter()
        .map(|a| AnalysisSummary {
            id: a.id,
            analysis_type: a.analysis_type,
            status: a.status,
            document_count: a.document_ids.len(),
            created_at: format_utc_rfc3339(a.created_at),
        })
        .collect();
    Ok(Json(summaries))
}

/// Load an analysis the session is allowed to see.
///
/// Analyses with a user belong to that user; anonymous ones to the session
/// that uploaded them.
fn load_owned(state: &AppState, session: &Session, id: u64) -> Result<Analysis> {
    let analysis = state
        .db
        .get_analysis(id)
        .ok_or_else(|| AppError::NotFound(format!("Analysis {} not found", id)))?;

    let owned = match analysis.user_id {
        Some(owner) => session.user_id == Some(owner),
        None => analysis.session_id == session.id,
    };

    if !owned {
        tracing::warn!(analysis_id = id, "Analysis access denied");
        return Err(AppError::Forbidden(
            "Analysis belongs to another session".to_string(),
        ));
    }
    Ok(analysis)
}

/// Paid analyses need a logged-in user with an annual subscription or a
/// succeeded payment at this analysis's tier.
fn ensure_paid_access(state: &AppState, session: &Session, analysis: &Analysis) -> Result<()> {
    if !analysis.analysis_type.is_paid() {
        return Ok(());
    }

    let user = session
        .user_id
        .and_then(|id| state.db.get_user(id))
        .ok_or(AppError::Unauthorized)?;

    if user.has_active_subscription(chrono::Utc::now())
        || state
            .db
            .has_succeeded_payment_for_analysis(analysis.id, analysis.analysis_type)
    {
        return Ok(());
    }

    Err(AppError::PaymentRequired(format!(
        "{} analysis requires payment",
        analysis.analysis_type
    )))
}

/// Email the report and track the delivery.
async fn send_report(state: &AppState, analysis: &Analysis, email: &str) -> bool {
    let report = state.db.create_email_report(analysis.id, email);

    let sent = state
        .mailer
        .send_analysis_report(
            email,
            analysis.analysis_data.as_ref(),
            analysis.comparison_data.as_ref(),
        )
        .await;

    let status = if sent {
        EmailReportStatus::Sent
    } else {
        EmailReportStatus::Failed
    };
    state.db.update_email_report_status(report.id, status);

    tracing::info!(
        analysis_id = analysis.id,
        email_report_id = report.id,
        sent,
        "Analysis report email processed"
    );
    sent
}
