// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload validation, text extraction and document classification.

use crate::error::{AppError, Result};
use crate::models::{DocumentType, Tier};
use crate::services::AnalystClient;
use chrono::{DateTime, Duration, Utc};

/// Largest accepted file (10 MiB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Most files accepted in one upload request.
pub const MAX_FILES_PER_UPLOAD: usize = 5;

/// Days a paid one-off analysis is kept.
const PAID_RETENTION_DAYS: i64 = 30;

pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

const QUOTE_KEYWORDS: [&str; 5] = ["quote", "quotation", "estimate", "proposal", "offer"];
const POLICY_KEYWORDS: [&str; 4] = ["policy", "certificate", "coverage", "current"];

/// Check size and MIME type of one uploaded file.
pub fn validate_upload(filename: &str, size: usize, mime_type: &str) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(AppError::PayloadTooLarge(format!(
            "{} exceeds the 10MB limit",
            filename
        )));
    }

    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(AppError::BadRequest(format!(
            "{}: file type {} not supported. Please upload PDF, DOC, DOCX, or TXT files.",
            filename, mime_type
        )));
    }

    Ok(())
}

/// Check the number of files against the global and per-tier limits.
pub fn validate_file_count(count: usize, tier: Tier) -> Result<()> {
    if count == 0 {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }
    if count > MAX_FILES_PER_UPLOAD {
        return Err(AppError::BadRequest(format!(
            "Maximum {} documents per upload",
            MAX_FILES_PER_UPLOAD
        )));
    }
    if count > tier.max_upload_files() {
        return Err(AppError::BadRequest(format!(
            "Maximum {} documents allowed for {} comparison (1 current + {} competitors)",
            tier.max_upload_files(),
            tier,
            tier.max_upload_files() - 1
        )));
    }
    Ok(())
}

/// Tag a document as current policy or competitor quote.
///
/// Filename keywords win over content; quote keywords win over policy
/// keywords. Anything unmatched is treated as a current policy.
pub fn classify(filename: &str, text: &str) -> DocumentType {
    let filename = filename.to_lowercase();
    let has_any = |haystack: &str, keywords: &[&str]| keywords.iter().any(|k| haystack.contains(k));

    if has_any(&filename, &QUOTE_KEYWORDS) {
        return DocumentType::CompetitorQuote;
    }
    if has_any(&filename, &POLICY_KEYWORDS) {
        return DocumentType::CurrentPolicy;
    }
    if has_any(&text.to_lowercase(), &QUOTE_KEYWORDS) {
        return DocumentType::CompetitorQuote;
    }
    DocumentType::CurrentPolicy
}

/// When records for `tier` expire, or `None` to keep them.
pub fn retention_date(tier: Tier, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match tier {
        Tier::Single | Tier::Multiple => Some(now + Duration::days(PAID_RETENTION_DAYS)),
        Tier::Free | Tier::Annual => None,
    }
}

/// Get the analyzable text out of an uploaded file.
///
/// PDFs go through the AI service; text and Word files are decoded as UTF-8.
pub async fn extract_text(analyst: &AnalystClient, bytes: &[u8], mime_type: &str) -> Result<String> {
    if mime_type == "application/pdf" {
        return analyst.extract_text_from_pdf(bytes).await;
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
