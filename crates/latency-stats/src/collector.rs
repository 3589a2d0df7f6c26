use std::future::Future;

use tokio::task::AbortHandle;

use crate::matcher::Feed;
use crate::message::{unix_now_secs, ArrivalRecord, FeedBatch, RawMessage};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A connection that yields decoded messages one at a time.
pub trait FeedSource: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn next_message(&mut self) -> impl Future<Output = Result<RawMessage, Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("feed {feed:?} failed while collecting: {source}")]
    Source {
        feed: Feed,
        #[source]
        source: BoxError,
    },
    #[error("feed {feed:?} collection task did not complete: {source}")]
    TaskFailed {
        feed: Feed,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Awaits `n_messages` from `source`, stamping each with the wall clock as
/// soon as it arrives.
pub async fn collect_batch<S: FeedSource>(
    source: &mut S,
    n_messages: usize,
) -> Result<FeedBatch, S::Error> {
    let mut batch = FeedBatch::with_capacity(n_messages);

    for _ in 0..n_messages {
        let message = source.next_message().await?;
        let arrival_secs = unix_now_secs();
        batch.push(ArrivalRecord::new(message, arrival_secs));
    }

    Ok(batch)
}

/// Collects one batch per feed on two spawned tasks and joins them.
///
/// Each task owns its source and batch; the sources are handed back so the
/// caller can close them. The first feed to fail ends the pair, and both
/// tasks are aborted when the pair fails or this future is dropped.
pub async fn collect_pair<A: FeedSource, B: FeedSource>(
    source_a: A,
    source_b: B,
    n_messages: usize,
) -> Result<((A, FeedBatch), (B, FeedBatch)), CollectError> {
    let task_a = tokio::spawn(collect_owned(source_a, n_messages));
    let task_b = tokio::spawn(collect_owned(source_b, n_messages));
    let _guard = AbortOnDrop([task_a.abort_handle(), task_b.abort_handle()]);

    let (collected_a, collected_b) = tokio::try_join!(
        async { settle(Feed::A, task_a.await) },
        async { settle(Feed::B, task_b.await) },
    )?;

    tracing::debug!(
        feed_a = collected_a.1.len(),
        feed_b = collected_b.1.len(),
        "collected feed batches"
    );
    Ok((collected_a, collected_b))
}

async fn collect_owned<S: FeedSource>(
    mut source: S,
    n_messages: usize,
) -> Result<(S, FeedBatch), S::Error> {
    let batch = collect_batch(&mut source, n_messages).await?;
    Ok((source, batch))
}

struct AbortOnDrop([AbortHandle; 2]);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn settle<S, E>(
    feed: Feed,
    joined: Result<Result<(S, FeedBatch), E>, tokio::task::JoinError>,
) -> Result<(S, FeedBatch), CollectError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    joined
        .map_err(|source| CollectError::TaskFailed { feed, source })?
        .map_err(|source| CollectError::Source {
            feed,
            source: Box::new(source),
        })
}
