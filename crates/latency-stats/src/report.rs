use crate::comparator::{ComparisonResult, FeedStats};
use crate::percentile::PercentileMap;

/// Receives human-readable report lines.
pub trait ReportSink {
    fn emit(&mut self, line: &str);
}

/// Emits each line as an `info` event.
#[derive(Debug, Clone)]
pub struct TracingReportSink {
    label: String,
}

impl TracingReportSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ReportSink for TracingReportSink {
    fn emit(&mut self, line: &str) {
        tracing::info!(report = %self.label, "{line}");
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReportSink {
    lines: Vec<String>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ReportSink for InMemoryReportSink {
    fn emit(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

pub fn report_comparison(result: &ComparisonResult, sink: &mut dyn ReportSink) {
    report_feed("Feed A", &result.feed_a, sink);
    report_feed("Feed B", &result.feed_b, sink);

    sink.emit("Latency Difference (A-B):");
    sink.emit(&format!("Mean diff = {}ms", result.diff.mean_ms));
    sink.emit(&format!(
        "Diff Percentiles (ms): {}",
        format_percentiles(&result.diff.percentiles_ms)
    ));

    sink.emit("Result:");
    sink.emit(&format!(
        "Feed A has lower latency in {}% of the cases!",
        result.a_win_pct
    ));
    sink.emit(&format!(
        "Feed B has lower latency in {}% of the cases!",
        result.b_win_pct
    ));
    if result.ties > 0 {
        sink.emit(&format!(
            "{} of {} matched trades were ties",
            result.ties, result.total_matches
        ));
    }
}

pub fn report_feed_profile(label: &str, stats: &FeedStats, sink: &mut dyn ReportSink) {
    report_feed(label, stats, sink);
}

fn report_feed(label: &str, stats: &FeedStats, sink: &mut dyn ReportSink) {
    sink.emit(&format!("{label}:"));
    sink.emit(&format!("Latency: mean={}ms", stats.mean_ms));
    sink.emit(&format!(
        "Latency Percentiles (ms): {}",
        format_percentiles(&stats.percentiles_ms)
    ));
}

/// Renders `{50: 12.5, 99: 30.1}`.
fn format_percentiles(map: &PercentileMap) -> String {
    let entries = map
        .iter()
        .map(|(rank, value)| format!("{rank}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{entries}}}")
}
