// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Anonymous insurance market data.
//!
//! Only non-identifying fields are kept: postcode, product type and price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anonymous data point extracted from an uploaded policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceData {
    pub id: u64,
    pub postcode: String,
    /// bil, hus, indbo, rejse or sundhed
    pub insurance_type: String,
    /// basis, medium or comprehensive
    pub coverage_level: Option<String>,
    pub annual_premium: Option<f64>,
    pub insurance_company: Option<String>,
    pub product_name: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
    /// "upload" or "competitor_quote"
    pub data_source: String,
}

/// Aggregate premium statistics for a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceDataStats {
    pub average_premium: f64,
    pub sample_size: usize,
    pub price_range: PriceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl InsuranceDataStats {
    /// Stats over the positive premiums in `premiums`; zeros when none qualify.
    pub fn from_premiums(premiums: impl IntoIterator<Item = f64>) -> Self {
        let valid: Vec<f64> = premiums
            .into_iter()
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();

        if valid.is_empty() {
            return Self {
                average_premium: 0.0,
                sample_size: 0,
                price_range: PriceRange { min: 0.0, max: 0.0 },
            };
        }

        let sum: f64 = valid.iter().sum();
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            average_premium: (sum / valid.len() as f64).round(),
            sample_size: valid.len(),
            price_range: PriceRange { min, max },
        }
    }
}
