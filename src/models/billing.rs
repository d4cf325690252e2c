// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Payment, discount and email-report records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Payment attempt tied to a gateway payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: u64,
    pub user_id: Option<u64>,
    pub stripe_payment_intent_id: String,
    /// Amount charged after discount (major units)
    pub amount: f64,
    /// List price before discount (major units)
    pub original_amount: f64,
    /// ISO 4217 code, uppercase
    pub currency: String,
    pub status: PaymentStatus,
    pub analysis_id: Option<u64>,
    pub analysis_type: Tier,
    pub discount_code_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Percentage-off code managed in the admin panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: u64,
    pub code: String,
    /// Percentage in (0, 100]
    pub discount_percentage: f64,
    pub is_active: bool,
    /// Admin note, e.g. partner name
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<u64>,
}

/// One redemption of a discount code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountUsage {
    pub id: u64,
    pub discount_code_id: u64,
    pub payment_id: u64,
    pub user_id: Option<u64>,
    pub original_amount: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailReportStatus {
    Pending,
    Sent,
    Failed,
}

/// Delivery log for an emailed analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReport {
    pub id: u64,
    pub analysis_id: u64,
    pub email: String,
    pub status: EmailReportStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Discount usage joined with the code it redeemed, for the admin report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountUsageReport {
    #[serde(flatten)]
    pub usage: DiscountUsage,
    pub code: String,
    pub description: Option<String>,
}
