// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment completion side effects.

use crate::db::MemoryDb;
use crate::error::Result;
use crate::models::{DiscountUsage, Payment, PaymentStatus, Tier};
use chrono::{DateTime, Duration, Months, Utc};

/// Mark the payment for `intent_id` succeeded and apply its side effects.
///
/// Redelivery is harmless: side effects only run on the transition into
/// `succeeded`. Returns `None` for unknown intents.
pub fn complete_payment(
    db: &MemoryDb,
    intent_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Payment>> {
    let Some((payment, previous)) = db.update_payment_status(intent_id, PaymentStatus::Succeeded)
    else {
        return Ok(None);
    };

    if previous == PaymentStatus::Succeeded {
        tracing::debug!(payment_intent = intent_id, "Payment already succeeded");
        return Ok(Some(payment));
    }

    if let Some(discount_code_id) = payment.discount_code_id {
        db.record_discount_usage(DiscountUsage {
            id: 0,
            discount_code_id,
            payment_id: payment.id,
            user_id: payment.user_id,
            original_amount: payment.original_amount,
            discount_amount: ((payment.original_amount - payment.amount) * 100.0).round() / 100.0,
            final_amount: payment.amount,
            used_at: now,
        });
    }

    if payment.analysis_type == Tier::Annual {
        if let Some(user_id) = payment.user_id {
            let expires_at = subscription_expiry(now);
            db.update_user_subscription(user_id, Tier::Annual, Some(expires_at))?;
            tracing::info!(user_id, %expires_at, "Annual subscription activated");
        }
    }

    tracing::info!(
        payment_id = payment.id,
        payment_intent = intent_id,
        amount = payment.amount,
        currency = %payment.currency,
        "Payment succeeded"
    );
    Ok(Some(payment))
}

/// Mark the payment for `intent_id` failed. A succeeded payment stays succeeded.
pub fn fail_payment(db: &MemoryDb, intent_id: &str) -> Option<Payment> {
    let (payment, changed) = db.mark_payment_failed(intent_id)?;
    if changed {
        tracing::info!(payment_id = payment.id, payment_intent = intent_id, "Payment failed");
    } else {
        tracing::warn!(payment_intent = intent_id, "Ignoring failure for succeeded payment");
    }
    Some(payment)
}

/// One calendar year after `now`.
fn subscription_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(12))
        .unwrap_or(now + Duration::days(365))
}
