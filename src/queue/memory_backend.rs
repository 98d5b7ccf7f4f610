//! In-memory queue backend.
//!
//! Every instance built through [`QueueBackend::from_config`] appends to and
//! pulls from the process-wide [`MessageBuffer`], so all of them observe one
//! message stream. Messages never leave the process and are lost when it
//! exits.

use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use uuid::Uuid;

use crate::metrics::{ConsumerGauge, QueueMetrics};

use super::advisory::BackendAdvisory;
use super::backend::{BackendConfig, Payload, PayloadStream, QueueBackend, QueueError, StoredMessage};
use super::buffer::MessageBuffer;

const BACKEND_TYPE: &str = "memory";

const ADVISORY: BackendAdvisory = BackendAdvisory {
    backend: BACKEND_TYPE,
    reasons: &[
        "development/testing only",
        "messages lost on restart",
        "single-process visibility only",
    ],
};

/// In-memory queue backend.
///
/// Delivery is competing-consumers: each message goes to exactly one open
/// `consume` stream, in publish order. Routing keys are stored with the
/// message but never used to filter delivery, and consumer groups are
/// ignored.
#[derive(Debug, Clone)]
pub struct MemoryQueueBackend {
    buffer: Arc<MessageBuffer>,
}

impl MemoryQueueBackend {
    /// Create a backend over the process-wide buffer.
    pub fn new() -> Self {
        Self::with_buffer(MessageBuffer::process_shared())
    }

    /// Create a backend over the given buffer.
    ///
    /// Backends built from the same buffer share one message stream.
    pub fn with_buffer(buffer: Arc<MessageBuffer>) -> Self {
        ADVISORY.emit();
        Self { buffer }
    }

    /// The buffer this backend reads and writes.
    pub fn buffer(&self) -> &Arc<MessageBuffer> {
        &self.buffer
    }

    /// Number of messages published but not yet delivered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    fn from_config(config: &BackendConfig) -> Result<Self, QueueError> {
        if !config.is_empty() {
            tracing::debug!(
                backend = BACKEND_TYPE,
                options = ?config.option_names(),
                "Ignoring options not used by the memory backend"
            );
        }

        Ok(Self::new())
    }

    fn backend_type(&self) -> &'static str {
        BACKEND_TYPE
    }

    async fn publish(&self, key: &str, payload: Payload) -> Result<(), QueueError> {
        let message = StoredMessage::new(key, payload);
        let message_id = message.id;

        let pending = self.buffer.push(message);
        QueueMetrics::record_published(BACKEND_TYPE);

        tracing::debug!(
            key = %key,
            message_id = %message_id,
            pending = pending,
            "Message published"
        );

        Ok(())
    }

    async fn consume(&self, group: Option<&str>) -> Result<PayloadStream, QueueError> {
        let stream_id = Uuid::new_v4();
        if let Some(group) = group {
            tracing::debug!(
                stream_id = %stream_id,
                group = %group,
                "Consumer groups are not supported by the memory backend, ignoring"
            );
        }

        let buffer = Arc::clone(&self.buffer);

        tracing::debug!(stream_id = %stream_id, "Consume stream opened");

        Ok(Box::pin(stream! {
            let _gauge = ConsumerGauge::open();
            loop {
                let message = buffer.pop().await;
                QueueMetrics::record_consumed(BACKEND_TYPE);
                tracing::trace!(
                    stream_id = %stream_id,
                    message_id = %message.id,
                    key = %message.key,
                    "Delivering message"
                );
                yield Ok::<Payload, QueueError>(message.into_payload());
            }
        }))
    }
}
