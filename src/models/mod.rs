// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod analysis;
pub mod billing;
pub mod document;
pub mod insurance;
pub mod tier;
pub mod user;

pub use analysis::{
    Analysis, AnalysisStatus, ComparisonReport, CompetitorComparison, CoverageAnalysis,
    PolicyComparison,
};
pub use billing::{
    DiscountCode, DiscountUsage, DiscountUsageReport, EmailReport, EmailReportStatus, Payment,
    PaymentStatus,
};
pub use document::{Document, DocumentType};
pub use insurance::{InsuranceData, InsuranceDataStats};
pub use tier::Tier;
pub use user::{AdminRole, AdminUser, Customer, User};
