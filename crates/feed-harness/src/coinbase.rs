//! Coinbase Exchange ticker channel client.
//!
//! Subscribes to `ticker` for a set of products and yields each decoded
//! frame as a [`RawMessage`].

use futures_util::{SinkExt, StreamExt};
use latency_stats::{FeedSource, RawMessage};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const TICKER_CHANNEL: &str = "ticker";

#[derive(Debug, thiserror::Error)]
pub enum CoinbaseError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subscription rejected: {message} ({reason})")]
    Rejected { message: String, reason: String },
    #[error("connection closed")]
    ConnectionClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    product_ids: &'a [String],
    channels: [&'static str; 1],
}

impl<'a> SubscribeRequest<'a> {
    pub fn ticker(product_ids: &'a [String]) -> Self {
        Self {
            kind: "subscribe",
            product_ids,
            channels: [TICKER_CHANNEL],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SubscribeReply {
    #[serde(rename = "subscriptions")]
    Subscriptions { channels: Vec<Channel> },
    #[serde(rename = "error")]
    Error { message: String, reason: String },
}

pub struct CoinbaseTickerClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl CoinbaseTickerClient {
    pub async fn connect(url: &str) -> Result<Self, CoinbaseError> {
        let (stream, _) = connect_async(url).await?;
        tracing::debug!(url, "connected to ticker feed");
        Ok(Self { stream })
    }

    /// Sends a ticker subscription and waits for the server's reply.
    pub async fn subscribe(&mut self, product_ids: &[String]) -> Result<Vec<Channel>, CoinbaseError> {
        self.send_json(&SubscribeRequest::ticker(product_ids)).await?;

        let reply = self.next_text().await?;
        match serde_json::from_str::<SubscribeReply>(&reply)? {
            SubscribeReply::Subscriptions { channels } => Ok(channels),
            SubscribeReply::Error { message, reason } => {
                Err(CoinbaseError::Rejected { message, reason })
            }
        }
    }

    pub async fn send_json<T: Serialize>(&mut self, payload: &T) -> Result<(), CoinbaseError> {
        let text = serde_json::to_string(payload)?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn receive_message(&mut self) -> Result<RawMessage, CoinbaseError> {
        let text = self.next_text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn close(mut self) -> Result<(), CoinbaseError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Result<String, CoinbaseError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(_))) | None => return Err(CoinbaseError::ConnectionClosed),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }
}

impl FeedSource for CoinbaseTickerClient {
    type Error = CoinbaseError;

    async fn next_message(&mut self) -> Result<RawMessage, Self::Error> {
        self.receive_message().await
    }
}
