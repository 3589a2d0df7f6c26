pub mod collector;
pub mod comparator;
pub mod matcher;
pub mod message;
pub mod percentile;
pub mod report;

pub use collector::{collect_batch, collect_pair, CollectError, FeedSource};
pub use comparator::{compare_feeds, feed_latency_profile, CompareError, ComparisonResult, FeedStats};
pub use matcher::{match_by_trade_id, Feed, MatchError, MatchedEntry, MatchedTrades};
pub use message::{ArrivalRecord, FeedBatch, RawMessage, TradeId};
pub use report::{report_comparison, report_feed_profile, ReportSink};

pub const DEFAULT_BATCH_MESSAGES: usize = 100;
pub const DEFAULT_PERCENTILES: [u8; 4] = [50, 90, 95, 99];
