use std::collections::hash_map::{self, HashMap};

use serde::Serialize;

use crate::message::{ArrivalRecord, OriginTimeError, TradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Feed {
    A,
    B,
}

impl Feed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Latencies (seconds) observed for one trade id, one slot per feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchedEntry {
    pub a: Option<f64>,
    pub b: Option<f64>,
}

impl MatchedEntry {
    /// Both latencies, when both feeds saw the trade.
    pub fn complete(&self) -> Option<(f64, f64)> {
        self.a.zip(self.b)
    }

    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }

    fn slot_mut(&mut self, feed: Feed) -> &mut Option<f64> {
        match feed {
            Feed::A => &mut self.a,
            Feed::B => &mut self.b,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedTrades {
    entries: HashMap<TradeId, MatchedEntry>,
}

impl MatchedTrades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `latency_secs` into `feed`'s slot for `trade_id`; a repeated id
    /// within one feed overwrites the earlier observation.
    pub fn record(&mut self, trade_id: TradeId, feed: Feed, latency_secs: f64) {
        *self.entries.entry(trade_id).or_default().slot_mut(feed) = Some(latency_secs);
    }

    pub fn get(&self, trade_id: &TradeId) -> Option<&MatchedEntry> {
        self.entries.get(trade_id)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, TradeId, MatchedEntry> {
        self.entries.iter()
    }

    pub fn complete_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_complete()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TradeId, MatchedEntry)> for MatchedTrades {
    fn from_iter<I: IntoIterator<Item = (TradeId, MatchedEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("no trade ids found in either feed")]
    EmptyMatchSet,
    #[error("feed {feed:?} trade {trade_id}: {source}")]
    OriginTime {
        feed: Feed,
        trade_id: TradeId,
        #[source]
        source: OriginTimeError,
    },
}

/// Joins both feeds by trade id into per-id latency slots.
///
/// Messages without a usable trade id are skipped. Fails with
/// [`MatchError::EmptyMatchSet`] when neither feed contributed an entry.
pub fn match_by_trade_id(
    feed_a: &[ArrivalRecord],
    feed_b: &[ArrivalRecord],
) -> Result<MatchedTrades, MatchError> {
    let mut matched = MatchedTrades::new();

    record_feed(&mut matched, Feed::A, feed_a)?;
    record_feed(&mut matched, Feed::B, feed_b)?;

    if matched.is_empty() {
        return Err(MatchError::EmptyMatchSet);
    }

    tracing::debug!(
        entries = matched.len(),
        complete = matched.complete_count(),
        "matched feeds by trade id"
    );
    Ok(matched)
}

fn record_feed(
    matched: &mut MatchedTrades,
    feed: Feed,
    records: &[ArrivalRecord],
) -> Result<(), MatchError> {
    let mut skipped = 0usize;

    for record in records {
        let Some(trade_id) = record.message.identity() else {
            skipped += 1;
            continue;
        };

        let latency_secs = record
            .latency_secs()
            .map_err(|source| MatchError::OriginTime {
                feed,
                trade_id: trade_id.clone(),
                source,
            })?;
        matched.record(trade_id.clone(), feed, latency_secs);
    }

    if skipped > 0 {
        tracing::debug!(feed = feed.as_str(), skipped, "skipped messages without trade id");
    }
    Ok(())
}
