use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::Result;

/// One streamed delta of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdateEvent {
    /// Stable for every delta of the same message.
    pub id: String,
    pub thread_id: String,
    /// This delta only.
    pub text: String,
    /// Everything produced so far, including this delta.
    pub snapshot: String,
    pub completed: bool,
}

/// A payload as it went out on the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

/// One-way publish.  Returning means the transport accepted the message,
/// not that anyone received it.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

/// In-process transport over a tokio broadcast channel.
///
/// Publishing with no subscribers is not an error; slow subscribers may
/// miss messages once the channel buffer wraps.
pub struct BroadcastTransport {
    tx: broadcast::Sender<Published>,
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<Published> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

#[async_trait]
impl PubSubTransport for BroadcastTransport {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let _ = self.tx.send(Published {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Publishes message updates for every thread on one shared topic.
/// Subscribers filter by `threadId` / `id` themselves.
pub struct StreamPublisher {
    transport: Arc<dyn PubSubTransport>,
    topic: String,
}

impl StreamPublisher {
    pub fn new(transport: Arc<dyn PubSubTransport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Best-effort: transport failures are logged, never returned.
    pub async fn on_message_updated(
        &self,
        thread_id: &str,
        message_id: &str,
        text_delta: &str,
        snapshot: &str,
        completed: bool,
    ) {
        let event = MessageUpdateEvent {
            id: message_id.to_string(),
            thread_id: thread_id.to_string(),
            text: text_delta.to_string(),
            snapshot: snapshot.to_string(),
            completed,
        };
        self.publish(&event).await;
    }

    async fn publish(&self, event: &MessageUpdateEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(thread_id = %event.thread_id, message_id = %event.id, "failed to encode message update: {e}");
                return;
            }
        };

        if let Err(e) = self.transport.publish(&self.topic, payload).await {
            warn!(
                thread_id = %event.thread_id,
                message_id = %event.id,
                topic = %self.topic,
                "message update not published: {e}"
            );
            return;
        }

        debug!(
            thread_id = %event.thread_id,
            message_id = %event.id,
            delta_len = event.text.len(),
            completed = event.completed,
            "message update published"
        );
    }

    /// Start streaming one message.  The returned handle keeps the snapshot
    /// and makes the caller send deltas one at a time.
    pub fn begin(&self, thread_id: impl Into<String>, message_id: impl Into<String>) -> MessageStream<'_> {
        MessageStream {
            publisher: self,
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            snapshot: String::new(),
        }
    }
}

/// Deltas of a single message, in order.  [`MessageStream::finish`] sends
/// the terminal `completed` event.
pub struct MessageStream<'a> {
    publisher: &'a StreamPublisher,
    thread_id: String,
    message_id: String,
    snapshot: String,
}

impl MessageStream<'_> {
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub async fn push(&mut self, delta: &str) {
        self.snapshot.push_str(delta);
        self.publisher
            .on_message_updated(&self.thread_id, &self.message_id, delta, &self.snapshot, false)
            .await;
    }

    /// Send the terminal event (empty delta) and return the full text.
    pub async fn finish(self) -> String {
        self.publisher
            .on_message_updated(&self.thread_id, &self.message_id, "", &self.snapshot, true)
            .await;
        self.snapshot
    }
}
