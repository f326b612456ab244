//! Ownership and dividend arithmetic shared by the partner endpoints and
//! the document pipeline.

/// Percentage of the total held by each share count. All zero when the
/// total is zero.
pub fn ownership_percentages(shares: &[i32]) -> Vec<f64> {
    let total: i64 = shares.iter().map(|s| i64::from(*s)).sum();
    if total <= 0 {
        return vec![0.0; shares.len()];
    }
    shares
        .iter()
        .map(|s| f64::from(*s) / total as f64 * 100.0)
        .collect()
}

/// Per-partner dividend allotment: `round(total_dividend * shares / total)`.
/// All zero when total shares is zero. Rounding drift across the whole set
/// is bounded by the partner count.
pub fn dividend_allotments(shares: &[i32], total_dividend: f64) -> Vec<f64> {
    let total: i64 = shares.iter().map(|s| i64::from(*s)).sum();
    if total <= 0 {
        return vec![0.0; shares.len()];
    }
    shares
        .iter()
        .map(|s| (total_dividend * f64::from(*s) / total as f64).round())
        .collect()
}
