//! Trailing simple moving average with a minimum of one observation.
//!
//! SMA(n)[i] = mean(C[max(0, i-n+1)..=i])
//! Warmup: the window narrows near the start of the series instead of
//! leaving the first (n-1) points undefined, so every index has a value.
//! During warmup the average covers fewer than n observations.

/// Each window is summed afresh so equal inputs always give bit-equal means.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![];
    }

    let mut means = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(period);
        let window = &values[start..=i];
        means.push(window.iter().sum::<f64>() / window.len() as f64);
    }
    means
}
