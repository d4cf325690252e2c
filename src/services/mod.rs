// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analysis;
pub mod analyst;
pub mod documents;
pub mod email;
pub mod password;
pub mod payments;
pub mod pricing;
pub mod ranking;
pub mod stripe;

pub use analysis::{AnalysisProcessor, RunOutcome};
pub use analyst::{AnalystClient, ExtractedInsuranceData};
pub use email::Mailer;
pub use pricing::Currency;
pub use stripe::StripeClient;
