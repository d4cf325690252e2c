// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Product tiers shared by subscriptions, analyses and pricing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Access tier. Doubles as a user's subscription level and an analysis type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Tier {
    /// One revealed comparison, no login.
    #[default]
    Free,
    /// One-off paid analysis.
    Single,
    /// One current policy against up to three competitors.
    Multiple,
    /// Yearly subscription.
    Annual,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Single, Tier::Multiple, Tier::Annual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Single => "single",
            Tier::Multiple => "multiple",
            Tier::Annual => "annual",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    /// Number of ranked comparisons shown in full for this tier.
    ///
    /// The free tier shows none in full; it gets a single preview instead.
    pub fn max_comparisons(&self) -> usize {
        match self {
            Tier::Free => 0,
            Tier::Single => 2,
            Tier::Multiple | Tier::Annual => 5,
        }
    }

    /// Maximum number of files accepted in one upload for this tier.
    pub fn max_upload_files(&self) -> usize {
        match self {
            Tier::Multiple => 4,
            _ => 5,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "single" => Ok(Tier::Single),
            "multiple" => Ok(Tier::Multiple),
            "annual" => Ok(Tier::Annual),
            other => Err(format!("Unknown tier: {}", other)),
        }
    }
}
