mod coinbase;
mod config;

use std::error::Error;
use std::future::Future;
use std::time::Duration;

use coinbase::{Channel, CoinbaseTickerClient};
use config::{Config, RunMode};
use latency_stats::report::TracingReportSink;
use latency_stats::{
    collect_batch, collect_pair, compare_feeds, feed_latency_profile, match_by_trade_id,
    report_comparison, report_feed_profile,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("feeds did not deliver their batches within {0:?}")]
struct CollectTimeout(Duration);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = Config::from_env()?;
    tracing::info!(
        mode = config.mode.as_str(),
        url = %config.ws_url,
        products = ?config.product_ids,
        n_messages = config.n_messages,
        "starting feed harness"
    );

    match config.mode {
        RunMode::Ab => run_ab_comparison(&config).await,
        RunMode::Single => run_single_feed(&config).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_ab_comparison(config: &Config) -> Result<(), Box<dyn Error>> {
    let (mut client_a, mut client_b) = tokio::try_join!(
        CoinbaseTickerClient::connect(&config.ws_url),
        CoinbaseTickerClient::connect(&config.ws_url),
    )?;
    let (channels_a, channels_b) = tokio::try_join!(
        client_a.subscribe(&config.product_ids),
        client_b.subscribe(&config.product_ids),
    )?;
    log_subscription("A", &channels_a);
    log_subscription("B", &channels_b);

    let ((client_a, batch_a), (client_b, batch_b)) = bounded(
        config.collect_timeout,
        collect_pair(client_a, client_b, config.n_messages),
    )
    .await??;

    let closed = tokio::join!(client_a.close(), client_b.close());
    if let (Err(err), _) | (_, Err(err)) = closed {
        tracing::warn!(error = %err, "feed did not close cleanly");
    }

    let matched = match_by_trade_id(batch_a.records(), batch_b.records())?;
    let stats = compare_feeds(&matched, &config.percentiles)?;

    let mut sink = TracingReportSink::new("ab_latency_comparison");
    report_comparison(&stats, &mut sink);
    Ok(())
}

async fn run_single_feed(config: &Config) -> Result<(), Box<dyn Error>> {
    let mut client = CoinbaseTickerClient::connect(&config.ws_url).await?;
    let channels = client.subscribe(&config.product_ids).await?;
    log_subscription("single", &channels);

    let batch = bounded(
        config.collect_timeout,
        collect_batch(&mut client, config.n_messages),
    )
    .await??;
    if let Err(err) = client.close().await {
        tracing::warn!(error = %err, "feed did not close cleanly");
    }

    let stats = feed_latency_profile(batch.records(), &config.percentiles)?;

    let mut sink = TracingReportSink::new("single_feed_receive_latency");
    report_feed_profile("Feed", &stats, &mut sink);
    Ok(())
}

fn log_subscription(feed: &str, channels: &[Channel]) {
    for channel in channels {
        tracing::info!(
            feed,
            channel = %channel.name,
            products = ?channel.product_ids,
            "subscribed"
        );
    }
}

/// Awaits `future`, giving up after `limit` when one is configured.
///
/// On timeout `future` is dropped; for `collect_pair` that aborts both feed
/// tasks.
async fn bounded<F: Future>(limit: Option<Duration>, future: F) -> Result<F::Output, CollectTimeout> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| CollectTimeout(limit)),
        None => Ok(future.await),
    }
}
