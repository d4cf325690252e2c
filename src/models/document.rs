// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Uploaded document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AnalysisStatus;

/// Heuristic role of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// The customer's existing policy.
    CurrentPolicy,
    /// An offer from another insurer.
    CompetitorQuote,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::CurrentPolicy => "current_policy",
            DocumentType::CompetitorQuote => "competitor_quote",
        }
    }
}

/// Stored document record.
///
/// The raw upload is not kept; only the text extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: u64,
    pub user_id: Option<u64>,
    /// Session that uploaded the document
    pub session_id: String,
    /// Storage name: `<unix-millis>-<original name>`
    pub filename: String,
    pub original_name: String,
    /// Size in bytes
    pub file_size: u64,
    pub mime_type: String,
    pub document_type: DocumentType,
    /// Text used for analysis prompts
    #[serde(skip_serializing, default)]
    pub extracted_text: String,
    pub uploaded_at: DateTime<Utc>,
    /// When the document is eligible for cleanup
    pub expires_at: Option<DateTime<Utc>>,
    pub analysis_status: AnalysisStatus,
}
