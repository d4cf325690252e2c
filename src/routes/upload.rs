// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multipart document upload.

use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::Session;
use crate::models::{Analysis, AnalysisStatus, Document, DocumentType, InsuranceData, Tier};
use crate::services::documents::{
    classify, extract_text, retention_date, validate_file_count, validate_upload, MAX_FILE_SIZE,
    MAX_FILES_PER_UPLOAD,
};
use crate::AppState;

/// Request body limit for uploads: every file at full size plus form overhead.
const UPLOAD_BODY_LIMIT: usize = MAX_FILES_PER_UPLOAD * MAX_FILE_SIZE + 1024 * 1024;

const MAX_POSTCODE_LEN: usize = 10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/upload",
        post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: u64,
    pub filename: String,
    pub document_type: DocumentType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub analysis_id: u64,
    pub documents: Vec<UploadedDocument>,
}

/// One file as received, before validation.
struct UploadedFile {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

/// Parsed multipart form.
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    analysis_type: Tier,
    postcode: Option<String>,
}

/// Accept policy documents and create a pending analysis for them.
async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let form = read_form(multipart).await?;

    validate_file_count(form.files.len(), form.analysis_type)?;
    for file in &form.files {
        validate_upload(&file.name, file.bytes.len(), &file.mime_type)?;
    }

    let now = Utc::now();
    let expires_at = retention_date(form.analysis_type, now);

    let mut documents = Vec::with_capacity(form.files.len());
    for file in form.files {
        let extracted_text = extract_text(&state.analyst, &file.bytes, &file.mime_type).await?;
        let document_type = classify(&file.name, &extracted_text);

        let document = state.db.create_document(Document {
            id: 0,
            user_id: session.user_id,
            session_id: session.id.clone(),
            filename: format!("{}-{}", now.timestamp_millis(), file.name),
            original_name: file.name,
            file_size: file.bytes.len() as u64,
            mime_type: file.mime_type,
            document_type,
            extracted_text,
            uploaded_at: now,
            expires_at,
            analysis_status: AnalysisStatus::Pending,
        });

        tracing::debug!(
            document_id = document.id,
            document_type = document.document_type.as_str(),
            size = document.file_size,
            "Document stored"
        );
        documents.push(document);
    }

    if let Some(postcode) = &form.postcode {
        collect_insurance_data(&state, postcode, &documents).await;
    }

    let analysis = state.db.create_analysis(Analysis {
        id: 0,
        user_id: session.user_id,
        session_id: session.id.clone(),
        document_ids: documents.iter().map(|d| d.id).collect(),
        analysis_type: form.analysis_type,
        analysis_data: None,
        comparison_data: None,
        status: AnalysisStatus::Pending,
        created_at: now,
        expires_at,
    });

    tracing::info!(
        analysis_id = analysis.id,
        tier = %analysis.analysis_type,
        documents = documents.len(),
        "Upload complete"
    );

    Ok(Json(UploadResponse {
        analysis_id: analysis.id,
        documents: documents
            .into_iter()
            .map(|d| UploadedDocument {
                id: d.id,
                filename: d.original_name,
                document_type: d.document_type,
            })
            .collect(),
    }))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "documents" => {
                if form.files.len() >= MAX_FILES_PER_UPLOAD {
                    return Err(AppError::BadRequest(format!(
                        "Maximum {} documents per upload",
                        MAX_FILES_PER_UPLOAD
                    )));
                }
                form.files.push(read_file(field).await?);
            }
            "analysisType" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.analysis_type = value.parse().map_err(AppError::BadRequest)?;
            }
            "postcode" => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                if value.chars().count() > MAX_POSTCODE_LEN {
                    return Err(AppError::BadRequest("Invalid postcode".to_string()));
                }
                if !value.is_empty() {
                    form.postcode = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile> {
    let name = field.file_name().unwrap_or("document").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(UploadedFile {
        name,
        mime_type,
        bytes,
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Store anonymous market data for each current policy. Never fails the upload.
async fn collect_insurance_data(state: &AppState, postcode: &str, documents: &[Document]) {
    for document in documents
        .iter()
        .filter(|d| d.document_type == DocumentType::CurrentPolicy)
    {
        let extracted = state
            .analyst
            .extract_insurance_data(&document.extracted_text)
            .await;

        let data = state.db.create_insurance_data(InsuranceData {
            id: 0,
            postcode: postcode.to_string(),
            insurance_type: extracted.insurance_type().to_string(),
            coverage_level: extracted.coverage_level,
            annual_premium: extracted.annual_premium,
            insurance_company: extracted.insurance_company,
            product_name: extracted.product_name,
            extracted_data: extracted.extracted_data,
            collected_at: Utc::now(),
            data_source: "upload".to_string(),
        });
        tracing::debug!(
            insurance_data_id = data.id,
            insurance_type = %data.insurance_type,
            "Anonymous insurance data collected"
        );
    }
}
