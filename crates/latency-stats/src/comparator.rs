use serde::Serialize;

use crate::matcher::MatchedTrades;
use crate::message::{ArrivalRecord, OriginTimeError};
use crate::percentile::{mean, percentiles, round2, PercentileError, PercentileMap};

const MILLIS_PER_SEC: f64 = 1_000.0;

/// A latency distribution in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStats {
    pub samples_ms: Vec<f64>,
    pub mean_ms: f64,
    pub percentiles_ms: PercentileMap,
}

impl FeedStats {
    fn from_samples(samples_ms: Vec<f64>, ranks: &[u8]) -> Result<Self, PercentileError> {
        Ok(Self {
            mean_ms: mean(&samples_ms)?,
            percentiles_ms: percentiles(&samples_ms, ranks)?,
            samples_ms,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub feed_a: FeedStats,
    pub feed_b: FeedStats,
    /// `A − B` per complete match; negative means A was faster.
    pub diff: FeedStats,
    pub a_wins: usize,
    pub b_wins: usize,
    pub ties: usize,
    /// Complete matches, ties included.
    pub total_matches: usize,
    pub a_win_pct: f64,
    pub b_win_pct: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("no trade id was seen by both feeds")]
    NoCompleteMatches,
    #[error("feed batch is empty")]
    EmptyBatch,
    #[error(transparent)]
    OriginTime(#[from] OriginTimeError),
    #[error(transparent)]
    Percentile(#[from] PercentileError),
}

/// Compares the two feeds over every trade id both of them delivered.
///
/// Entries seen by only one feed are ignored. A trade where both latencies
/// are equal is a tie: it counts toward `total_matches` but toward neither
/// feed's wins, so the two win percentages add up to less than 100.
pub fn compare_feeds(
    matched: &MatchedTrades,
    ranks: &[u8],
) -> Result<ComparisonResult, CompareError> {
    let mut a_ms = Vec::with_capacity(matched.len());
    let mut b_ms = Vec::with_capacity(matched.len());
    let mut diff_ms = Vec::with_capacity(matched.len());
    let (mut a_wins, mut b_wins, mut ties) = (0usize, 0usize, 0usize);

    for (a, b) in matched.iter().filter_map(|(_, entry)| entry.complete()) {
        a_ms.push(a * MILLIS_PER_SEC);
        b_ms.push(b * MILLIS_PER_SEC);
        diff_ms.push((a - b) * MILLIS_PER_SEC);

        if a < b {
            a_wins += 1;
        } else if b < a {
            b_wins += 1;
        } else {
            ties += 1;
        }
    }

    let total_matches = diff_ms.len();
    if total_matches == 0 {
        return Err(CompareError::NoCompleteMatches);
    }

    let dropped = matched.len() - total_matches;
    if dropped > 0 {
        tracing::warn!(dropped, total_matches, "trade ids seen by only one feed were ignored");
    }

    Ok(ComparisonResult {
        feed_a: FeedStats::from_samples(a_ms, ranks)?,
        feed_b: FeedStats::from_samples(b_ms, ranks)?,
        diff: FeedStats::from_samples(diff_ms, ranks)?,
        a_wins,
        b_wins,
        ties,
        total_matches,
        a_win_pct: win_pct(a_wins, total_matches),
        b_win_pct: win_pct(b_wins, total_matches),
    })
}

/// Receive latency of a single feed, one sample per record.
pub fn feed_latency_profile(
    records: &[ArrivalRecord],
    ranks: &[u8],
) -> Result<FeedStats, CompareError> {
    if records.is_empty() {
        return Err(CompareError::EmptyBatch);
    }

    let samples_ms = records
        .iter()
        .map(|record| record.latency_secs().map(|secs| secs * MILLIS_PER_SEC))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeedStats::from_samples(samples_ms, ranks)?)
}

fn win_pct(wins: usize, total_matches: usize) -> f64 {
    round2(wins as f64 / total_matches as f64 * 100.0)
}
