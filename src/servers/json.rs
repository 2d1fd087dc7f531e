//! Line-delimited JSON bridge.
//!
//! Clients exchange `{"topic": …, "payload": …}` objects, one per line:
//! inbound lines are dispatched to the light controller, every bus publish
//! is broadcast to all connected clients. A new client connection raises the
//! reconnection signal so the light re-announces its state.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::{
    light::LightHandle,
    models::ServerConfig,
    transport::{MessageBus, TransportError},
};

#[derive(Debug, Error)]
pub enum JsonServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Lines(#[from] LinesCodecError),
    #[error("the light controller is no longer running")]
    LightGone(#[from] crate::light::LightHandleError),
}

/// One line on the wire, in either direction.
#[derive(Debug, Serialize, Deserialize)]
struct BusFrame {
    topic: String,
    payload: serde_json::Value,
}

impl BusFrame {
    fn new(topic: &str, payload: &[u8]) -> Self {
        // Pass JSON payloads through structured; anything else as a string
        let payload = serde_json::from_slice(payload)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned()));

        Self {
            topic: topic.to_owned(),
            payload,
        }
    }

    fn payload_bytes(&self) -> Bytes {
        match &self.payload {
            serde_json::Value::String(s) => Bytes::from(s.clone().into_bytes()),
            other => Bytes::from(other.to_string().into_bytes()),
        }
    }
}

/// The bridge's bus side: publishes fan out to all connected clients.
pub struct JsonServer {
    outbound: broadcast::Sender<String>,
    last_will: Mutex<Option<(String, Bytes)>>,
}

#[async_trait]
impl MessageBus for JsonServer {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let frame = BusFrame::new(topic, &payload);
        let line = serde_json::to_string(&frame)?;

        // No connected clients is fine
        self.outbound.send(line).ok();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        // Every client line already reaches the controller; subscription
        // filtering happens on the topic at dispatch
        debug!(topic = %topic, "subscribed");
        Ok(())
    }

    async fn set_last_will(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        *self.last_will.lock().expect("last will lock poisoned") =
            Some((topic.to_owned(), payload));
        Ok(())
    }
}

impl JsonServer {
    /// Broker-side last-will delivery: announce the registered payload to
    /// connected clients. Called on daemon shutdown.
    pub async fn publish_last_will(&self) {
        let will = self.last_will.lock().expect("last will lock poisoned").take();

        if let Some((topic, payload)) = will {
            if let Err(error) = self.publish(&topic, payload).await {
                warn!(error = %error, "failed to publish last will");
            }
        }
    }
}

/// Bind the bridge and spawn its accept loop.
pub async fn bind(
    config: &ServerConfig,
    light: LightHandle,
) -> Result<Arc<JsonServer>, JsonServerError> {
    let listener = TcpListener::bind((config.address.as_str(), config.port)).await?;
    info!(address = %config.address, port = %config.port, "JSON bridge listening");

    let (outbound, _) = broadcast::channel(16);
    let server = Arc::new(JsonServer {
        outbound: outbound.clone(),
        last_will: Mutex::new(None),
    });

    tokio::spawn(async move {
        let mut incoming = TcpListenerStream::new(listener);

        while let Some(connection) = incoming.next().await {
            let socket = match connection {
                Ok(socket) => socket,
                Err(error) => {
                    warn!(error = %error, "accept failed");
                    continue;
                }
            };

            let peer_addr = match socket.peer_addr() {
                Ok(peer_addr) => peer_addr,
                Err(error) => {
                    warn!(error = %error, "dropping connection without peer address");
                    continue;
                }
            };

            // A fresh client wants the current state announced
            if light.bus_restored().await.is_err() {
                break;
            }

            let light = light.clone();
            let outbound = outbound.subscribe();
            tokio::spawn(async move {
                if let Err(error) = handle_client((socket, peer_addr), light, outbound).await {
                    debug!(peer = %peer_addr, error = %error, "client connection ended");
                }
            });
        }
    });

    Ok(server)
}

async fn handle_client(
    (socket, peer_addr): (TcpStream, SocketAddr),
    light: LightHandle,
    mut outbound: broadcast::Receiver<String>,
) -> Result<(), JsonServerError> {
    debug!(peer = %peer_addr, "accepted new connection");

    let mut framed = Framed::new(socket, LinesCodec::new());

    loop {
        tokio::select! {
            line = framed.next() => {
                let line = match line {
                    Some(line) => line?,
                    None => break,
                };

                match serde_json::from_str::<BusFrame>(&line) {
                    Ok(frame) => {
                        let payload = frame.payload_bytes();
                        light.message(frame.topic, payload).await?;
                    }
                    Err(error) => {
                        warn!(peer = %peer_addr, error = %error, "ignoring unparseable line");
                    }
                }
            }
            update = outbound.recv() => {
                match update {
                    Ok(line) => framed.send(line).await?,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(peer = %peer_addr, skipped = %skipped, "client lagging, skipped updates");
                    }
                }
            }
        }
    }

    Ok(())
}
