// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Impact scoring and the free-tier reveal.
//!
//! Every competitor comparison gets a 0-100 score from its price delta and
//! the number of coverage differences. Comparisons are ranked by score and
//! then cut down to what the caller's tier may see:
//! - free: only the top comparison, as a preview, plus a conversion message
//! - paid: the top `Tier::max_comparisons()` comparisons in full

use crate::models::analysis::PriceDifference;
use crate::models::{ComparisonReport, CompetitorComparison, PolicyComparison, Tier};

const BASE_SCORE: f64 = 50.0;
const MAX_PRICE_POINTS: f64 = 30.0;
const MAX_COVERAGE_POINTS: f64 = 20.0;

/// Score a comparison from 0 to 100.
///
/// `50 + min(|price% * 2|, 30) + min(5 * coverage differences, 20)`.
/// A non-finite price percentage contributes nothing.
pub fn impact_score(comparison: &CompetitorComparison) -> u32 {
    let pct = comparison.price_comparison.percentage_difference;
    let price_points = if pct.is_finite() {
        (pct * 2.0).abs().min(MAX_PRICE_POINTS)
    } else {
        0.0
    };

    let coverage = &comparison.coverage_comparison;
    let differences = coverage.better_coverage.len() + coverage.worse_coverage.len();
    let coverage_points = (differences as f64 * 5.0).min(MAX_COVERAGE_POINTS);

    (BASE_SCORE + price_points + coverage_points).round().min(100.0) as u32
}

/// Build a scored comparison for one competitor document.
pub fn score_comparison(
    document_id: u64,
    policy_name: &str,
    comparison: CompetitorComparison,
) -> PolicyComparison {
    let price = &comparison.price_comparison;
    let direction = if price.difference > 0.0 {
        "Dyrere"
    } else {
        "Billigere"
    };
    let pct = if price.percentage_difference.is_finite() {
        price.percentage_difference.abs()
    } else {
        0.0
    };

    let coverage_differences = comparison
        .coverage_comparison
        .better_coverage
        .iter()
        .chain(&comparison.coverage_comparison.worse_coverage)
        .cloned()
        .collect();

    PolicyComparison {
        document_id,
        policy_name: policy_name.to_string(),
        coverage_differences,
        price_difference: PriceDifference {
            amount: price.difference,
            percentage: price.percentage_difference,
            description: format!("{} med {}%", direction, pct),
        },
        analysis_result: comparison.recommendation.clone(),
        impact_score: impact_score(&comparison),
        comparison,
    }
}

/// Sort comparisons by descending impact score.
///
/// The sort is stable, so ties keep upload order.
pub fn rank(mut comparisons: Vec<PolicyComparison>) -> Vec<PolicyComparison> {
    comparisons.sort_by(|a, b| b.impact_score.cmp(&a.impact_score));
    comparisons
}

/// Cut ranked comparisons down to what `tier` may see.
pub fn reveal(
    ranked: Vec<PolicyComparison>,
    tier: Tier,
    total_policies_uploaded: usize,
) -> ComparisonReport {
    if tier.is_paid() {
        let shown = ranked.len().min(tier.max_comparisons());
        let hidden_count = ranked.len() - shown;
        let mut comparisons = ranked;
        comparisons.truncate(shown);
        return ComparisonReport {
            comparisons,
            free_preview: None,
            hidden_count,
            conversion_message: None,
            total_policies_uploaded,
        };
    }

    let hidden_count = ranked.len().saturating_sub(1);
    let free_preview = ranked.into_iter().next();
    let conversion_message = free_preview
        .as_ref()
        .map(|top| conversion_message(top, hidden_count));

    ComparisonReport {
        comparisons: Vec::new(),
        free_preview,
        hidden_count,
        conversion_message,
        total_policies_uploaded,
    }
}

/// Danish upsell text naming the top finding and how much is hidden.
pub fn conversion_message(top: &PolicyComparison, hidden_count: usize) -> String {
    let amount = top.price_difference.amount;
    let finding = if amount < 0.0 {
        format!("spare {:.0} DKK årligt", amount.abs())
    } else {
        format!("undgå at betale {:.0} DKK ekstra", amount)
    };

    let mut message = format!(
        "Vi analyserede din {} og fandt du kan {}.",
        top.policy_name, finding
    );
    if hidden_count > 0 {
        message.push_str(&format!(
            " Vi fandt også {} andre vigtige sammenligninger - se alle for at få det komplette overblik.",
            hidden_count
        ));
    }
    message
}
