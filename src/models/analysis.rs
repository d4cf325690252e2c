// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Analysis records and the AI result shapes stored inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Tier;

/// Lifecycle of an analysis (and of the documents in it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

/// Stored analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: u64,
    pub user_id: Option<u64>,
    /// Session that created the analysis (ownership for anonymous users)
    pub session_id: String,
    pub document_ids: Vec<u64>,
    pub analysis_type: Tier,
    pub analysis_data: Option<CoverageAnalysis>,
    pub comparison_data: Option<ComparisonReport>,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Overall severity reported by the AI for a single policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Coverage analysis of one policy document, as returned by the AI.
///
/// Every field defaults so a partially filled model reply still parses.
/// Explicit `null`s count as missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageAnalysis {
    #[serde(deserialize_with = "lenient::or_default")]
    pub coverage_gaps: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub over_insurance: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub improvements: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub premium_optimization: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub risk_assessment: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub summary: String,
    /// Model's own 0-100 estimate of how surprising the findings are
    #[serde(deserialize_with = "lenient::count")]
    pub impact_score: Option<u32>,
    #[serde(deserialize_with = "lenient::count")]
    pub issue_count: Option<u32>,
    #[serde(deserialize_with = "lenient::severity")]
    pub severity: Option<Severity>,
}

/// Side-by-side comparison of the current policy and one competitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompetitorComparison {
    #[serde(deserialize_with = "lenient::or_default")]
    pub price_comparison: PriceComparison,
    #[serde(deserialize_with = "lenient::or_default")]
    pub coverage_comparison: CoverageComparison,
    #[serde(deserialize_with = "lenient::or_default")]
    pub term_comparison: TermComparison,
    /// Factual summary of the differences
    #[serde(deserialize_with = "lenient::or_default")]
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceComparison {
    #[serde(deserialize_with = "lenient::or_default")]
    pub current_premium: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub competitor_premium: f64,
    /// Competitor minus current (negative means the competitor is cheaper)
    #[serde(deserialize_with = "lenient::or_default")]
    pub difference: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub percentage_difference: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageComparison {
    #[serde(deserialize_with = "lenient::or_default")]
    pub better_coverage: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub worse_coverage: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub similar_coverage: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TermComparison {
    #[serde(deserialize_with = "lenient::or_default")]
    pub better_terms: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub worse_terms: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub similar_terms: Vec<String>,
}

/// A scored comparison ready for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyComparison {
    /// Document compared against the current policy
    pub document_id: u64,
    pub policy_name: String,
    pub coverage_differences: Vec<String>,
    pub price_difference: PriceDifference,
    pub analysis_result: String,
    pub impact_score: u32,
    pub comparison: CompetitorComparison,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDifference {
    pub amount: f64,
    pub percentage: f64,
    pub description: String,
}

/// Comparison results as exposed to the caller's tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Comparisons shown in full (empty on the free tier)
    pub comparisons: Vec<PolicyComparison>,
    /// The single highest-impact comparison revealed on the free tier
    pub free_preview: Option<PolicyComparison>,
    /// Comparisons withheld from the caller
    pub hidden_count: usize,
    pub conversion_message: Option<String>,
    /// Documents that took part in the analysis
    pub total_policies_uploaded: usize,
}

/// Deserializers for model replies, which send `null`, floats or
/// unexpected words where the schema asks for something stricter.
mod lenient {
    use super::Severity;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Non-negative number, rounded. Anything else is treated as absent.
    pub fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round().min(f64::from(u32::MAX)) as u32))
    }

    /// Case-insensitive severity; unknown words are treated as absent.
    pub fn severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let Some(word) = value.as_ref().and_then(Value::as_str) else {
            return Ok(None);
        };
        Ok(match word.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ai_reply_parses() {
        let json = r#"{"summary": "Basic car policy", "coverageGaps": ["No glass cover"]}"#;
        let analysis: CoverageAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.summary, "Basic car policy");
        assert_eq!(analysis.coverage_gaps, vec!["No glass cover"]);
        assert!(analysis.over_insurance.is_empty());
        assert_eq!(analysis.impact_score, None);
    }

    #[test]
    fn test_comparison_reply_parses() {
        let json = r#"{
            "priceComparison": {"currentPremium": 5000, "competitorPremium": 4500,
                                "difference": -500, "percentageDifference": -10},
            "coverageComparison": {"betterCoverage": ["Roadside"], "worseCoverage": []},
            "recommendation": "Cheaper with similar cover"
        }"#;
        let comparison: CompetitorComparison = serde_json::from_str(json).unwrap();
        assert_eq!(comparison.price_comparison.percentage_difference, -10.0);
        assert_eq!(comparison.coverage_comparison.better_coverage.len(), 1);
        assert!(comparison.term_comparison.better_terms.is_empty());
    }

    #[test]
    fn test_null_fields_in_comparison_reply() {
        let json = r#"{
            "priceComparison": {"currentPremium": 5000, "competitorPremium": null,
                                "difference": null, "percentageDifference": null},
            "coverageComparison": {"betterCoverage": null, "worseCoverage": ["Glass"]},
            "termComparison": null,
            "recommendation": null
        }"#;
        let comparison: CompetitorComparison = serde_json::from_str(json).unwrap();
        assert_eq!(comparison.price_comparison.current_premium, 5000.0);
        assert_eq!(comparison.price_comparison.competitor_premium, 0.0);
        assert_eq!(comparison.price_comparison.percentage_difference, 0.0);
        assert!(comparison.coverage_comparison.better_coverage.is_empty());
        assert_eq!(comparison.coverage_comparison.worse_coverage, vec!["Glass"]);
        assert!(comparison.term_comparison.similar_terms.is_empty());
        assert_eq!(comparison.recommendation, "");
    }

    #[test]
    fn test_loose_scores_and_severity_in_analysis_reply() {
        let json = r#"{"summary": null, "impactScore": 72.5, "issueCount": "three",
                       "severity": "Moderate", "coverageGaps": null}"#;
        let analysis: CoverageAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.summary, "");
        assert_eq!(analysis.impact_score, Some(73));
        assert_eq!(analysis.issue_count, None);
        assert_eq!(analysis.severity, None);
        assert!(analysis.coverage_gaps.is_empty());

        let analysis: CoverageAnalysis =
            serde_json::from_str(r#"{"severity": "HIGH", "issueCount": -2}"#).unwrap();
        assert_eq!(analysis.severity, Some(Severity::High));
        assert_eq!(analysis.issue_count, None);
    }
}
