use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use latency_stats::{
    compare_feeds, match_by_trade_id, FeedBatch, RawMessage, TradeId, DEFAULT_PERCENTILES,
};

const ORIGIN: &str = "2025-03-19T18:11:35.000000Z";
const ORIGIN_SECS: f64 = 1_742_407_895.0;

fn synthetic_feed(n_messages: u32, skew_micros: u32) -> FeedBatch {
    let messages = (1..=n_messages)
        .map(|id| RawMessage::new(Some(TradeId::Int(i64::from(id))), Some(ORIGIN.to_string())))
        .collect();
    let times = (1..=n_messages)
        .map(|id| ORIGIN_SECS + f64::from((id * 37 + skew_micros) % 20_000) / 1_000_000.0)
        .collect();

    FeedBatch::from_parts(messages, times).expect("messages and times have equal length")
}

fn bench_match_and_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_and_compare");

    for n_messages in [100_u32, 10_000] {
        let feed_a = synthetic_feed(n_messages, 0);
        let feed_b = synthetic_feed(n_messages, 1_500);
        group.throughput(Throughput::Elements(u64::from(n_messages)));

        group.bench_function(BenchmarkId::new("match_by_trade_id", n_messages), |b| {
            b.iter(|| black_box(match_by_trade_id(feed_a.records(), feed_b.records())))
        });

        let matched = match_by_trade_id(feed_a.records(), feed_b.records())
            .expect("synthetic feeds share every trade id");
        group.bench_function(BenchmarkId::new("compare_feeds", n_messages), |b| {
            b.iter(|| black_box(compare_feeds(&matched, &DEFAULT_PERCENTILES)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_and_compare);
criterion_main!(benches);
