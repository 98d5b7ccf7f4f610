//! Shared FIFO buffer behind the in-memory backend.
//!
//! A `MessageBuffer` is an unbounded, insertion-ordered queue that many
//! producers append to and many consumers pull from. Every pull removes
//! the head entry, so each message is handed to exactly one consumer.
//!
//! # Process scope
//!
//! [`MessageBuffer::process_shared`] returns the process-wide instance.
//! It is created on first access and lives until the process exits; any
//! messages still buffered at that point are lost without notice. Only this
//! instance reports its depth through the `QUEUE_PENDING` gauge.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use tokio::sync::Notify;

use crate::metrics::QUEUE_PENDING;

use super::backend::StoredMessage;

lazy_static! {
    static ref PROCESS_BUFFER: Arc<MessageBuffer> = Arc::new(MessageBuffer {
        report_depth: true,
        ..MessageBuffer::default()
    });
}

/// Unbounded multi-producer, multi-consumer FIFO.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    entries: Mutex<VecDeque<StoredMessage>>,
    available: Notify,
    /// Whether pushes and pops move the `QUEUE_PENDING` gauge
    report_depth: bool,
}

impl MessageBuffer {
    /// Create an isolated buffer, not shared with the rest of the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer shared by every in-memory backend in this process.
    pub fn process_shared() -> Arc<MessageBuffer> {
        Arc::clone(&PROCESS_BUFFER)
    }

    // Nothing inside the critical sections can panic halfway through a
    // mutation, so a poisoned lock still guards a consistent queue.
    fn entries(&self) -> MutexGuard<'_, VecDeque<StoredMessage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adjust_depth(&self, delta: i64) {
        if self.report_depth {
            QUEUE_PENDING.add(delta);
        }
    }

    /// Append a message to the tail and wake one waiting consumer.
    ///
    /// Returns the number of buffered messages after the append.
    pub fn push(&self, message: StoredMessage) -> usize {
        let depth = {
            let mut entries = self.entries();
            entries.push_back(message);
            entries.len()
        };
        self.adjust_depth(1);
        self.available.notify_one();
        depth
    }

    /// Remove the head message if one is buffered.
    pub fn try_pop(&self) -> Option<StoredMessage> {
        let message = self.entries().pop_front();
        if message.is_some() {
            self.adjust_depth(-1);
        }
        message
    }

    /// Remove the head message, waiting until one is available.
    ///
    /// The waiter is registered before the buffer is checked, so every
    /// `push` that lands after the check wakes a registered waiter instead
    /// of collapsing into a single stored permit.
    ///
    /// Cancel safe: dropping the future before it completes removes
    /// nothing, and a wakeup it had already received passes to another
    /// waiter.
    pub async fn pop(&self) -> StoredMessage {
        let notified = self.available.notified();
        tokio::pin!(notified);

        loop {
            notified.as_mut().enable();
            if let Some(message) = self.try_pop() {
                return message;
            }
            notified.as_mut().await;
            notified.set(self.available.notified());
        }
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Discard every buffered message, returning how many were dropped.
    pub fn purge(&self) -> usize {
        let dropped = {
            let mut entries = self.entries();
            let dropped = entries.len();
            entries.clear();
            dropped
        };
        self.adjust_depth(-(dropped as i64));
        if dropped > 0 {
            tracing::warn!(dropped = dropped, "Purged undelivered messages from buffer");
        }
        dropped
    }
}
