use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Feed-assigned trade identifier; Coinbase sends integers, other venues strings.
///
/// Integers decode as `Int` whenever they fit in `i64`; only larger values
/// land in `UInt`, so one id never decodes to two variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TradeId {
    Int(i64),
    UInt(u64),
    Str(String),
}

impl TradeId {
    /// `0` and `""` carry no identity and are treated as a missing identifier.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Int(value) => *value == 0,
            Self::UInt(value) => *value == 0,
            Self::Str(value) => value.is_empty(),
        }
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for TradeId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for TradeId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// One decoded feed message. Only `trade_id` and `time` are read by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub trade_id: Option<TradeId>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RawMessage {
    pub fn new(trade_id: Option<TradeId>, time: Option<String>) -> Self {
        Self {
            trade_id,
            time,
            payload: Map::new(),
        }
    }

    /// The identifier, if present and non-empty.
    pub fn identity(&self) -> Option<&TradeId> {
        self.trade_id.as_ref().filter(|id| !id.is_empty())
    }

    pub fn origin_secs(&self) -> Result<f64, OriginTimeError> {
        let time = self.time.as_deref().ok_or(OriginTimeError::Missing)?;
        iso_to_unix_secs(time)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OriginTimeError {
    #[error("message has no origin time")]
    Missing,
    #[error("origin time {value:?} is not an RFC 3339 timestamp: {source}")]
    Invalid {
        value: String,
        #[source]
        source: time::error::Parse,
    },
}

/// Converts an ISO-8601 UTC timestamp such as `2025-03-19T18:11:35.321933Z`
/// to Unix epoch seconds.
pub fn iso_to_unix_secs(value: &str) -> Result<f64, OriginTimeError> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339).map_err(|source| {
        OriginTimeError::Invalid {
            value: value.to_string(),
            source,
        }
    })?;

    Ok(parsed.unix_timestamp() as f64 + f64::from(parsed.nanosecond()) / 1_000_000_000.0)
}

/// Current wall-clock time as Unix epoch seconds.
pub fn unix_now_secs() -> f64 {
    let now = OffsetDateTime::now_utc();
    now.unix_timestamp() as f64 + f64::from(now.nanosecond()) / 1_000_000_000.0
}

/// A message stamped with the local time it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRecord {
    pub message: RawMessage,
    pub arrival_secs: f64,
}

impl ArrivalRecord {
    pub fn new(message: RawMessage, arrival_secs: f64) -> Self {
        Self {
            message,
            arrival_secs,
        }
    }

    /// `arrival − origin`, in seconds.
    pub fn latency_secs(&self) -> Result<f64, OriginTimeError> {
        Ok(self.arrival_secs - self.message.origin_secs()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{messages} messages paired with {times} arrival times")]
pub struct LengthMismatch {
    pub messages: usize,
    pub times: usize,
}

/// Arrival records collected from one feed, in receive order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    records: Vec<ArrivalRecord>,
}

impl FeedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Pairs messages with arrival times positionally.
    pub fn from_parts(messages: Vec<RawMessage>, times: Vec<f64>) -> Result<Self, LengthMismatch> {
        if messages.len() != times.len() {
            return Err(LengthMismatch {
                messages: messages.len(),
                times: times.len(),
            });
        }

        Ok(Self {
            records: messages
                .into_iter()
                .zip(times)
                .map(|(message, arrival_secs)| ArrivalRecord::new(message, arrival_secs))
                .collect(),
        })
    }

    pub fn push(&mut self, record: ArrivalRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ArrivalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
