//! Background task draining a consume stream into a handler.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;

use super::backend::{Payload, QueueBackend, QueueError};

/// Why a [`QueueConsumer`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown signal received (or its sender dropped)
    Shutdown,
    /// The stream returned an error
    StreamError,
    /// The stream ended, which only happens on broker backends
    StreamEnded,
}

/// Outcome of a consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Payloads handed to the handler
    pub processed: u64,
    pub reason: StopReason,
}

/// Background task that consumes from a backend until shutdown.
///
/// Stopping drops the stream, which leaves any undelivered messages in the
/// backend for other consumers.
pub struct QueueConsumer {
    backend: Arc<dyn QueueBackend>,
    group: Option<String>,
    shutdown: broadcast::Receiver<()>,
}

impl QueueConsumer {
    pub fn new(backend: Arc<dyn QueueBackend>, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            backend,
            group: None,
            shutdown,
        }
    }

    /// Consume as part of the named group, on backends that support groups.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Run until shutdown, calling `handler` for each payload in order.
    ///
    /// The handler is awaited before the next payload is pulled.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the stream cannot be opened.
    pub async fn run<F, Fut>(mut self, mut handler: F) -> Result<ConsumerReport, QueueError>
    where
        F: FnMut(Payload) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut stream = self.backend.consume(self.group.as_deref()).await?;
        let mut processed = 0u64;

        tracing::info!(
            backend = self.backend.backend_type(),
            group = ?self.group,
            "Queue consumer started"
        );

        let reason = loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Queue consumer received shutdown signal");
                    break StopReason::Shutdown;
                }
                item = stream.next() => match item {
                    Some(Ok(payload)) => {
                        handler(payload).await;
                        processed += 1;
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Queue consumer stream failed");
                        break StopReason::StreamError;
                    }
                    None => {
                        tracing::warn!("Queue consumer stream ended");
                        break StopReason::StreamEnded;
                    }
                }
            }
        };

        tracing::info!(processed = processed, reason = ?reason, "Queue consumer stopped");

        Ok(ConsumerReport { processed, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::queue::{BackendConfig, MemoryQueueBackend, MessageBuffer, PayloadStream};

    fn payload(n: i64) -> Payload {
        let mut payload = Payload::new();
        payload.insert("n".to_string(), json!(n));
        payload
    }

    fn isolated_backend() -> Arc<MemoryQueueBackend> {
        Arc::new(MemoryQueueBackend::with_buffer(Arc::new(MessageBuffer::new())))
    }

    #[tokio::test]
    async fn test_handles_payloads_in_order_until_shutdown() {
        let backend = isolated_backend();
        for n in 0..5 {
            backend.publish("k", payload(n)).await.unwrap();
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (handled_tx, mut handled_rx) = mpsc::unbounded_channel();

        let consumer = QueueConsumer::new(backend.clone(), shutdown_rx);
        let task = tokio::spawn(consumer.run(move |p| {
            let handled_tx = handled_tx.clone();
            async move {
                let _ = handled_tx.send(p["n"].as_i64().unwrap());
            }
        }));

        let mut seen = Vec::new();
        while seen.len() < 5 {
            let n = tokio::time::timeout(Duration::from_secs(1), handled_rx.recv())
                .await
                .expect("handler was not called")
                .expect("consumer stopped early");
            seen.push(n);
        }

        shutdown_tx.send(()).unwrap();
        let report = task.await.unwrap().unwrap();

        assert_eq!(report.reason, StopReason::Shutdown);
        assert_eq!(report.processed, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(backend.pending(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_messages_for_others() {
        let backend = isolated_backend();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // Signal queued before the consumer starts: it opens its stream,
        // sees the shutdown and stops without pulling anything
        shutdown_tx.send(()).unwrap();
        let report = QueueConsumer::new(backend.clone(), shutdown_rx)
            .with_group("workers")
            .run(|_| async {})
            .await
            .unwrap();
        assert_eq!(report.reason, StopReason::Shutdown);
        assert_eq!(report.processed, 0);

        backend.publish("k", payload(1)).await.unwrap();
        assert_eq!(backend.pending(), 1);
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_consumer() {
        let backend = isolated_backend();
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        drop(shutdown_tx);

        let report = QueueConsumer::new(backend, shutdown_rx)
            .run(|_| async {})
            .await
            .unwrap();
        assert_eq!(report.reason, StopReason::Shutdown);
    }

    struct UnreachableBackend;

    #[async_trait]
    impl QueueBackend for UnreachableBackend {
        fn from_config(_config: &BackendConfig) -> Result<Self, QueueError> {
            Ok(Self)
        }

        fn backend_type(&self) -> &'static str {
            "unreachable"
        }

        async fn publish(&self, _key: &str, _payload: Payload) -> Result<(), QueueError> {
            Err(QueueError::Connection("down".to_string()))
        }

        async fn consume(&self, _group: Option<&str>) -> Result<PayloadStream, QueueError> {
            let items = vec![
                Ok(payload(1)),
                Err(QueueError::Connection("lost".to_string())),
                Ok(payload(2)),
            ];
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn test_stream_error_stops_consumer() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let report = QueueConsumer::new(Arc::new(UnreachableBackend), shutdown_rx)
            .run(|_| async {})
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.reason, StopReason::StreamError);
    }
}
