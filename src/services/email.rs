// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email via the SendGrid v3 API.
//!
//! Sending never fails a request: delivery problems are logged and reported
//! as `false` to the caller.

use crate::config::Config;
use crate::models::{ComparisonReport, CoverageAnalysis, PolicyComparison};
use serde_json::json;
use std::fmt::Write;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub const REPORT_SUBJECT: &str = "Your Insurance Policy Analysis Report - Assurly.io";
const RESET_SUBJECT: &str = "Reset your Assurly.io admin password";

const DISCLAIMER: &str = "This report provides analytical information only. We do not rank, \
sell, recommend, or facilitate insurance purchases. All insurance decisions remain entirely \
with you. Consult licensed insurance professionals for advice.";

/// A rendered message ready to send.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// SendGrid client. Runs unconfigured when no API key is set.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    report_from: String,
    campaign_from: String,
    frontend_url: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.sendgrid_api_base.trim_end_matches('/').to_string(),
            api_key: config.sendgrid_api_key.clone(),
            report_from: config.report_from_address.clone(),
            campaign_from: config.campaign_from_address.clone(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the analysis report for one analysis.
    pub async fn send_analysis_report(
        &self,
        to: &str,
        analysis: Option<&CoverageAnalysis>,
        report: Option<&ComparisonReport>,
    ) -> bool {
        let message = EmailMessage {
            to: to.to_string(),
            from: self.report_from.clone(),
            subject: REPORT_SUBJECT.to_string(),
            text: render_report_text(analysis, report),
            html: render_report_html(analysis, report),
        };
        self.send(&message).await
    }

    /// Send one campaign mail. `content` is plain text; newlines become `<br>`.
    pub async fn send_campaign(&self, to: &str, subject: &str, content: &str) -> bool {
        let message = EmailMessage {
            to: to.to_string(),
            from: self.campaign_from.clone(),
            subject: subject.to_string(),
            text: content.to_string(),
            html: escape_html(content).replace('\n', "<br>"),
        };
        self.send(&message).await
    }

    /// Send an admin password reset link.
    pub async fn send_password_reset(&self, to: &str, token: &str) -> bool {
        let link = format!("{}/admin/reset/{}", self.frontend_url, token);
        let message = EmailMessage {
            to: to.to_string(),
            from: self.campaign_from.clone(),
            subject: RESET_SUBJECT.to_string(),
            text: format!(
                "A password reset was requested for your admin account.\n\n\
                 Reset link (valid for 1 hour): {}\n\n\
                 If you did not request this, ignore this email.",
                link
            ),
            html: format!(
                "<p>A password reset was requested for your admin account.</p>\
                 <p><a href=\"{0}\">{0}</a></p>\
                 <p>The link is valid for 1 hour. If you did not request this, ignore this email.</p>",
                escape_html(&link)
            ),
        };
        self.send(&message).await
    }

    /// Deliver a message. Returns whether the provider accepted it.
    pub async fn send(&self, message: &EmailMessage) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(subject = %message.subject, "Email not configured, message not sent");
            return false;
        };

        let body = json!({
            "personalizations": [{"to": [{"email": message.to}]}],
            "from": {"email": message.from},
            "subject": message.subject,
            "content": [
                {"type": "text/plain", "value": message.text},
                {"type": "text/html", "value": message.html},
            ],
        });

        let url = format!("{}/mail/send", self.base_url);
        let result = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(subject = %message.subject, "Email sent");
                true
            }
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                tracing::error!(%status, detail = %detail, "Email provider rejected message");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Email request failed");
                false
            }
        }
    }
}

/// Escape text for interpolation into HTML.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Comparisons the reader is allowed to see.
fn visible_comparisons(report: Option<&ComparisonReport>) -> Vec<&PolicyComparison> {
    match report {
        Some(report) => report
            .free_preview
            .iter()
            .chain(report.comparisons.iter())
            .collect(),
        None => Vec::new(),
    }
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

pub fn render_report_html(
    analysis: Option<&CoverageAnalysis>,
    report: Option<&ComparisonReport>,
) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>Insurance Analysis Report</title>\
         <style>body{font-family:Arial,sans-serif;line-height:1.6;color:#333}\
         .container{max-width:600px;margin:0 auto;padding:20px}\
         .header{background:#1e40af;color:white;padding:20px;text-align:center}\
         .disclaimer{background:#fef3c7;border:1px solid #f59e0b;padding:15px;margin:20px 0;border-radius:5px}\
         .section{margin:20px 0;padding:15px;border-left:4px solid #1e40af}\
         .footer{font-size:12px;color:#666;margin-top:30px;padding-top:20px;border-top:1px solid #eee}\
         </style></head><body><div class=\"container\">\
         <div class=\"header\"><h1>Insurance Policy Analysis Report</h1>\
         <p>Professional Document Analysis &bull; Information Only</p></div>",
    );
    let _ = write!(
        html,
        "<div class=\"disclaimer\"><strong>Important Legal Notice:</strong> {}</div>",
        DISCLAIMER
    );

    let risk = analysis.map(|a| a.risk_assessment.as_str()).unwrap_or("");
    let summary = analysis
        .map(|a| a.summary.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Analysis not available");
    let _ = write!(
        html,
        "<div class=\"section\"><h2>Coverage Analysis Summary</h2>\
         <p><strong>Risk Assessment:</strong> {}</p><p>{}</p></div>",
        escape_html(or_na(risk)),
        escape_html(summary)
    );

    if let Some(analysis) = analysis {
        push_html_list(&mut html, "Potential Coverage Gaps", &analysis.coverage_gaps);
        push_html_list(&mut html, "Potential Over-Insurance Areas", &analysis.over_insurance);
    }

    let comparisons = visible_comparisons(report);
    if !comparisons.is_empty() {
        html.push_str("<div class=\"section\"><h2>Competitor Comparison</h2>");
        for comparison in comparisons {
            let _ = write!(
                html,
                "<h3>{}</h3><p><strong>Premium Difference:</strong> {} ({}%)</p>\
                 <p><strong>Analysis:</strong> {}</p>",
                escape_html(&comparison.policy_name),
                comparison.price_difference.amount,
                comparison.price_difference.percentage,
                escape_html(or_na(&comparison.analysis_result))
            );
        }
        html.push_str("</div>");
    }

    html.push_str(
        "<div class=\"footer\"><p><strong>Assurly.io</strong> - Professional Insurance Document Analysis</p>\
         <p>This is an automated analysis tool. Results are for informational purposes only.</p>\
         <p>We do not provide insurance advice or facilitate insurance sales.</p></div>\
         </div></body></html>",
    );
    html
}

fn push_html_list(html: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(html, "<div class=\"section\"><h3>{}</h3><ul>", title);
    for item in items {
        let _ = write!(html, "<li>{}</li>", escape_html(item));
    }
    html.push_str("</ul></div>");
}

pub fn render_report_text(
    analysis: Option<&CoverageAnalysis>,
    report: Option<&ComparisonReport>,
) -> String {
    let mut text = String::from(
        "INSURANCE POLICY ANALYSIS REPORT\n\
         ================================\n\n\
         IMPORTANT: This report provides analytical information only. We do not provide insurance advice.\n\n",
    );

    let summary = analysis
        .map(|a| a.summary.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Analysis not available");
    let risk = analysis.map(|a| a.risk_assessment.as_str()).unwrap_or("");
    let _ = write!(
        text,
        "Coverage Analysis Summary:\n{}\n\nRisk Assessment: {}\n\n",
        summary,
        or_na(risk)
    );

    if let Some(analysis) = analysis {
        push_text_list(&mut text, "Potential Coverage Gaps", &analysis.coverage_gaps);
        push_text_list(&mut text, "Potential Over-Insurance Areas", &analysis.over_insurance);
    }

    for comparison in visible_comparisons(report) {
        let _ = write!(
            text,
            "Competitor Comparison: {}\nPremium Difference: {} ({}%)\nAnalysis: {}\n\n",
            comparison.policy_name,
            comparison.price_difference.amount,
            comparison.price_difference.percentage,
            or_na(&comparison.analysis_result)
        );
    }

    text.push_str(
        "---\nAssurly.io - Professional Insurance Document Analysis\n\
         This is an automated analysis tool. Results are for informational purposes only.\n",
    );
    text
}

fn push_text_list(text: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(text, "{}:", title);
    for item in items {
        let _ = writeln!(text, "- {}", item);
    }
    text.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ranking::score_comparison;

    fn sample_analysis() -> CoverageAnalysis {
        CoverageAnalysis {
            coverage_gaps: vec!["No glass <cover>".to_string()],
            over_insurance: vec!["Double liability".to_string()],
            risk_assessment: "Moderate".to_string(),
            summary: "Car policy & extras".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_report_html_escapes_and_includes_sections() {
        let analysis = sample_analysis();
        let html = render_report_html(Some(&analysis), None);

        assert!(html.contains("Important Legal Notice"));
        assert!(html.contains("No glass &lt;cover&gt;"));
        assert!(html.contains("Car policy &amp; extras"));
        assert!(html.contains("Potential Over-Insurance Areas"));
        assert!(!html.contains("Competitor Comparison"));
    }

    #[test]
    fn test_report_includes_visible_comparisons() {
        let mut comparison = crate::models::CompetitorComparison::default();
        comparison.price_comparison.difference = -450.0;
        comparison.price_comparison.percentage_difference = -9.0;
        comparison.recommendation = "Cheaper".to_string();
        let report = ComparisonReport {
            free_preview: Some(score_comparison(2, "topdanmark.pdf", comparison)),
            hidden_count: 2,
            ..Default::default()
        };

        let html = render_report_html(None, Some(&report));
        assert!(html.contains("topdanmark.pdf"));
        assert!(html.contains("-450 (-9%)"));
        assert!(html.contains("Analysis not available"));

        let text = render_report_text(None, Some(&report));
        assert!(text.contains("Competitor Comparison: topdanmark.pdf"));
        assert!(text.contains("Analysis: Cheaper"));
    }

    #[test]
    fn test_report_text_lists() {
        let analysis = sample_analysis();
        let text = render_report_text(Some(&analysis), None);
        assert!(text.contains("Risk Assessment: Moderate"));
        assert!(text.contains("- No glass <cover>"));
        assert!(text.contains("- Double liability"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_does_not_send() {
        let mailer = Mailer::new(&Config::default());
        assert!(!mailer.is_configured());
        assert!(!mailer.send_campaign("a@example.com", "Hi", "Hello\nthere").await);
    }
}
