// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tier prices, currency conversion and discount math.

use crate::error::AppError;
use crate::models::Tier;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Supported checkout currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Dkk,
    Sek,
    Nok,
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Dkk => "DKK",
            Currency::Sek => "SEK",
            Currency::Nok => "NOK",
            Currency::Eur => "EUR",
        }
    }

    /// Danish kroner per one unit of this currency.
    pub fn dkk_per_unit(&self) -> f64 {
        match self {
            Currency::Dkk => 1.0,
            Currency::Sek => 0.94,
            Currency::Nok => 0.93,
            Currency::Eur => 7.44,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DKK" => Ok(Currency::Dkk),
            "SEK" => Ok(Currency::Sek),
            "NOK" => Ok(Currency::Nok),
            "EUR" => Ok(Currency::Eur),
            _ => Err(AppError::BadRequest(format!("Unsupported currency: {}", s))),
        }
    }
}

/// List price of a tier in DKK.
pub fn tier_price_dkk(tier: Tier) -> f64 {
    match tier {
        Tier::Free => 0.0,
        Tier::Single => 129.0,
        Tier::Multiple => 199.0,
        Tier::Annual => 588.0,
    }
}

/// List price of a tier in `currency`, rounded to whole units.
pub fn tier_price(tier: Tier, currency: Currency) -> f64 {
    (tier_price_dkk(tier) / currency.dkk_per_unit()).round()
}

/// Prices of every tier in one currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TierPrices {
    pub free: f64,
    pub single: f64,
    pub multiple: f64,
    pub annual: f64,
}

pub fn pricing_table(currency: Currency) -> TierPrices {
    TierPrices {
        free: tier_price(Tier::Free, currency),
        single: tier_price(Tier::Single, currency),
        multiple: tier_price(Tier::Multiple, currency),
        annual: tier_price(Tier::Annual, currency),
    }
}

/// Result of applying a percentage discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountedPrice {
    pub original_amount: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub discount_percentage: f64,
}

/// Apply `percentage` off `original`. Amounts are rounded to 2 decimals.
pub fn apply_discount(original: f64, percentage: f64) -> Result<DiscountedPrice, AppError> {
    validate_percentage(percentage)?;
    if !original.is_finite() || original < 0.0 {
        return Err(AppError::BadRequest(format!("Invalid amount: {}", original)));
    }

    let final_amount = round2(original * (1.0 - percentage / 100.0));
    Ok(DiscountedPrice {
        original_amount: round2(original),
        discount_amount: round2(original - final_amount),
        final_amount,
        discount_percentage: percentage,
    })
}

/// Discount percentages must lie in (0, 100].
pub fn validate_percentage(percentage: f64) -> Result<(), AppError> {
    if percentage.is_finite() && percentage > 0.0 && percentage <= 100.0 {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Discount percentage must be in (0, 100], got {}",
            percentage
        )))
    }
}

/// Convert a major-unit amount to the gateway's minor units (øre, cents).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
