// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI analyst client (OpenAI-compatible chat completions).
//!
//! Handles:
//! - Coverage analysis of a single policy
//! - Comparison of a policy against a competitor quote
//! - PDF text extraction with personal data removed
//! - Anonymous market data extraction (never fails; falls back to defaults)

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CompetitorComparison, CoverageAnalysis};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Per-request timeout for AI calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const ANALYSIS_TEMPERATURE: f64 = 0.3;

/// Insurance types collected for market statistics.
pub const INSURANCE_TYPES: [&str; 5] = ["bil", "hus", "indbo", "rejse", "sundhed"];

/// Fallback type when extraction fails or returns something unknown.
pub const DEFAULT_INSURANCE_TYPE: &str = "bil";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a professional insurance analyst providing \
factual document analysis only. Do not provide advice or recommendations.";

const COMPARISON_SYSTEM_PROMPT: &str = "You are a professional insurance analyst providing \
objective policy comparison. Do not provide advice on which policy to select.";

const EXTRACTION_SYSTEM_PROMPT: &str = "Du er en ekspert i forsikringsdata extraction. \
Ekstrahér kun anonyme, strukturerede data. Inkludér ALDRIG personlige identifikatorer.";

const PDF_EXTRACTION_PROMPT: &str = "Extract all text content from this insurance document. \
Remove any GDPR-sensitive personal information like names, addresses, phone numbers, and \
personal identification numbers. Return only the policy terms, coverage details, and premium \
information.";

/// Anonymous fields pulled from a policy for market statistics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedInsuranceData {
    pub insurance_type: Option<String>,
    pub insurance_company: Option<String>,
    pub product_name: Option<String>,
    pub annual_premium: Option<f64>,
    pub coverage_level: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
}

impl ExtractedInsuranceData {
    /// Insurance type, or the fallback when missing or unknown.
    pub fn insurance_type(&self) -> &str {
        self.insurance_type
            .as_deref()
            .filter(|t| INSURANCE_TYPES.contains(t))
            .unwrap_or(DEFAULT_INSURANCE_TYPE)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions client. Runs unconfigured when no API key is set.
#[derive(Clone)]
pub struct AnalystClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AnalystClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            api_key: config.openai_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Analyze a single policy document.
    pub async fn analyze_document(&self, document_text: &str) -> Result<CoverageAnalysis> {
        let prompt = format!(
            r#"You are a professional insurance analyst. Analyze the following insurance policy document and provide a comprehensive analysis. Focus on factual, objective analysis only - do not provide recommendations or advice.

Document text: {document_text}

Please analyze and return a JSON response with the following structure:
{{
  "coverageGaps": ["list of potential coverage gaps found"],
  "overInsurance": ["areas where coverage might be excessive"],
  "improvements": ["factual areas that could be reviewed"],
  "premiumOptimization": ["objective premium-related observations"],
  "riskAssessment": "overall risk profile assessment",
  "summary": "concise factual summary of the policy",
  "impactScore": 85,
  "issueCount": 7,
  "severity": "high"
}}

Rate the "impactScore" from 0-100 based on the number of significant issues, their financial impact, the risk exposure and how surprising they would be to the customer.
Set "issueCount" as total number of significant issues found.
Set "severity" as: low (0-2 issues), medium (3-5 issues), high (6-8 issues), critical (9+ issues).
Focus on factual analysis only. Do not provide advice, recommendations, or suggest specific actions."#
        );

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": ANALYSIS_SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": ANALYSIS_TEMPERATURE,
        });

        self.chat_json(&body).await
    }

    /// Compare the current policy against one competitor quote.
    pub async fn compare_policies(
        &self,
        current_policy_text: &str,
        competitor_text: &str,
    ) -> Result<CompetitorComparison> {
        let prompt = format!(
            r#"You are a professional insurance analyst. Compare these two insurance documents and provide an objective comparison. Provide factual analysis only - do not make recommendations.

Current Policy: {current_policy_text}

Competitor Quote: {competitor_text}

Please analyze and return a JSON response with the following structure:
{{
  "priceComparison": {{
    "currentPremium": number,
    "competitorPremium": number,
    "difference": number,
    "percentageDifference": number
  }},
  "coverageComparison": {{
    "betterCoverage": ["areas where competitor has better coverage"],
    "worseCoverage": ["areas where competitor has worse coverage"],
    "similarCoverage": ["areas with similar coverage"]
  }},
  "termComparison": {{
    "betterTerms": ["where competitor has better terms"],
    "worseTerms": ["where competitor has worse terms"],
    "similarTerms": ["where terms are similar"]
  }},
  "recommendation": "objective factual summary of differences - no advice"
}}

Provide factual comparison only. Do not suggest which policy to choose or provide purchasing advice."#
        );

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": COMPARISON_SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": ANALYSIS_TEMPERATURE,
        });

        self.chat_json(&body).await
    }

    /// Extract policy text from a PDF, with personal data stripped.
    pub async fn extract_text_from_pdf(&self, pdf: &[u8]) -> Result<String> {
        let file_data = format!("data:application/pdf;base64,{}", BASE64.encode(pdf));

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": PDF_EXTRACTION_PROMPT},
                    {"type": "file", "file": {"filename": "document.pdf", "file_data": file_data}},
                ],
            }],
            "max_tokens": 4000,
        });

        self.chat(&body).await
    }

    /// Extract anonymous market data from policy text.
    ///
    /// Any failure (including an unconfigured client) yields the fallback
    /// data so uploads never fail on this step.
    pub async fn extract_insurance_data(&self, document_text: &str) -> ExtractedInsuranceData {
        if !self.is_configured() {
            tracing::warn!("AI service not configured, using default insurance data");
            return ExtractedInsuranceData::default();
        }

        let prompt = format!(
            r#"Ekstrahér anonyme forsikringsdata fra denne forsikringsdokument tekst. Returner KUN datastrukturen uden personlige oplysninger.

VIGTIG: Medtag IKKE navn, adresse, telefonnummer, fødselsdato eller andre personlige identifikatorer.

Tekst: {document_text}

Returner JSON i dette format:
{{
  "insuranceType": "bil|hus|indbo|rejse|sundhed",
  "insuranceCompany": "selskabsnavn (hvis synligt)",
  "productName": "produktnavn (hvis synligt)",
  "annualPremium": nummer_eller_null,
  "coverageLevel": "basis|medium|comprehensive|null",
  "extractedData": {{
    "deductible": "selvrisiko beløb",
    "coverageDetails": ["dækningsområder"],
    "policyFeatures": ["specielle features"]
  }}
}}"#
        );

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": EXTRACTION_SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
            "max_tokens": 1000,
        });

        match self.chat_json::<ExtractedInsuranceData>(&body).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Insurance data extraction failed, using defaults");
                ExtractedInsuranceData::default()
            }
        }
    }

    /// Send a chat request and parse the reply content as JSON.
    async fn chat_json<T: DeserializeOwned>(&self, body: &serde_json::Value) -> Result<T> {
        let content = self.chat(body).await?;
        let content = if content.trim().is_empty() {
            "{}"
        } else {
            content.as_str()
        };

        serde_json::from_str(content)
            .map_err(|e| AppError::AiService(format!("Malformed AI response: {}", e)))
    }

    /// Send a chat request and return the first choice's content.
    async fn chat(&self, body: &serde_json::Value) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ServiceUnavailable("AI service not configured".to_string())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let started = std::time::Instant::now();

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::AiService(e.to_string()))?;

        let completion: ChatCompletion = self.check_response_json(response).await?;
        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "AI completion received"
        );

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("AI service rate limit hit (429)");
                return Err(AppError::AiService(AppError::AI_RATE_LIMIT.to_string()));
            }
            if status.as_u16() == 401 {
                return Err(AppError::AiService(AppError::AI_AUTH_ERROR.to_string()));
            }

            return Err(AppError::AiService(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::AiService(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_is_unavailable() {
        let client = AnalystClient::new(&Config::default());
        assert!(!client.is_configured());

        let err = client.analyze_document("policy").await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_extraction_falls_back() {
        let client = AnalystClient::new(&Config::default());
        let data = client.extract_insurance_data("policy").await;
        assert_eq!(data, ExtractedInsuranceData::default());
        assert_eq!(data.insurance_type(), "bil");
    }

    #[test]
    fn test_insurance_type_fallback() {
        let mut data = ExtractedInsuranceData {
            insurance_type: Some("hus".to_string()),
            ..Default::default()
        };
        assert_eq!(data.insurance_type(), "hus");

        data.insurance_type = Some("boat".to_string());
        assert_eq!(data.insurance_type(), "bil");
    }

    #[test]
    fn test_extracted_data_parses_nulls() {
        let json = r#"{"insuranceType": "indbo", "annualPremium": null, "coverageLevel": "basis"}"#;
        let data: ExtractedInsuranceData = serde_json::from_str(json).unwrap();
        assert_eq!(data.insurance_type(), "indbo");
        assert_eq!(data.annual_premium, None);
        assert_eq!(data.coverage_level.as_deref(), Some("basis"));
    }
}
