//! Pub/sub transport collaborator boundary.
//!
//! The core never speaks a broker protocol itself: it publishes and
//! subscribes through this trait and receives inbound `(topic, payload)`
//! pairs through the controller mailbox (see [`crate::light::LightHandle`]).

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error encoding payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Message-bus operations the light controller relies on.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Ask the transport to deliver messages published on `topic`.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Register the payload the transport announces on `topic` if this
    /// client disappears ungracefully.
    async fn set_last_will(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;
}

/// Bus that only logs outbound traffic. Stands in when the JSON bridge is
/// disabled.
#[derive(Debug, Default)]
pub struct LogBus;

#[async_trait]
impl MessageBus for LogBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        debug!(
            topic = %topic,
            payload = %String::from_utf8_lossy(&payload),
            "publish"
        );
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        debug!(topic = %topic, "subscribe");
        Ok(())
    }

    async fn set_last_will(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        debug!(
            topic = %topic,
            payload = %String::from_utf8_lossy(&payload),
            "last will registered"
        );
        Ok(())
    }
}
