//! Recency weighting for corpus items.
//!
//! More-recently-added corpus items should influence scoring more than
//! entries that have sat in the library for years. Weights follow a
//! logarithmic decay of elapsed time and are normalized to sum to 1.

use chrono::{DateTime, Utc};

/// Normalized recency weight per corpus item.
///
/// `weight_i ∝ 1 / (1 + ln(1 + days_elapsed_i))`; dates in the future are
/// clamped to zero elapsed time. Returned weights sum to 1 for non-empty
/// input.
pub fn recency_weights(dates: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<f64> {
    if dates.is_empty() {
        return vec![];
    }

    let raw: Vec<f64> = dates
        .iter()
        .map(|date| {
            let minutes = (now - *date).num_minutes().max(0) as f64;
            let days = minutes / (60.0 * 24.0);
            1.0 / (1.0 + (1.0 + days).ln())
        })
        .collect();

    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        // all-zero raw weights cannot happen with the formula above, but
        // keep the division safe
        return vec![1.0 / dates.len() as f64; dates.len()];
    }
    raw.into_iter().map(|w| w / sum).collect()
}
