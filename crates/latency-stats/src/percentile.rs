use std::collections::BTreeMap;

/// Number of equal-probability divisions the sample is cut into.
const QUANTILE_DIVISIONS: i64 = 100;

pub type PercentileMap = BTreeMap<u8, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PercentileError {
    #[error("percentiles require a non-empty sample")]
    EmptySample,
    #[error("percentile rank {0} is outside 1..=99")]
    InvalidRank(u8),
}

/// Computes the requested ranks over a 100-quantile partition of `sample`.
///
/// Order statistics are linearly interpolated using the exclusive method
/// (`m = n + 1`). The interpolation weight is held to the surrounding pair
/// of points, so on small samples the extreme ranks settle on `min`/`max`
/// instead of extrapolating past them.
///
/// Values are rounded to two decimals.
pub fn percentiles(sample: &[f64], ranks: &[u8]) -> Result<PercentileMap, PercentileError> {
    if sample.is_empty() {
        return Err(PercentileError::EmptySample);
    }
    if let Some(rank) = ranks.iter().copied().find(|rank| !(1..=99).contains(rank)) {
        return Err(PercentileError::InvalidRank(rank));
    }

    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Ok(ranks
        .iter()
        .map(|&rank| (rank, round2(exclusive_quantile(&sorted, rank))))
        .collect())
}

/// Arithmetic mean rounded to two decimals.
pub fn mean(sample: &[f64]) -> Result<f64, PercentileError> {
    if sample.is_empty() {
        return Err(PercentileError::EmptySample);
    }

    let total: f64 = sample.iter().sum();
    Ok(round2(total / sample.len() as f64))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn exclusive_quantile(sorted: &[f64], rank: u8) -> f64 {
    let count = sorted.len() as i64;
    if count == 1 {
        return sorted[0];
    }

    let scaled = i64::from(rank) * (count + 1);
    let upper = (scaled / QUANTILE_DIVISIONS).clamp(1, count - 1);
    let weight = (scaled - upper * QUANTILE_DIVISIONS).clamp(0, QUANTILE_DIVISIONS);

    let lower_px = sorted[(upper - 1) as usize];
    let upper_px = sorted[upper as usize];
    (lower_px * (QUANTILE_DIVISIONS - weight) as f64 + upper_px * weight as f64)
        / QUANTILE_DIVISIONS as f64
}
