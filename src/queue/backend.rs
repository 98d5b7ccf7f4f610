//! Backend trait for queue implementations.
//!
//! This module defines the contract every queue backend satisfies, so
//! producers and consumers can be written once and pointed at any
//! implementation (the in-memory reference backend, or a broker).

use std::collections::HashMap;
use std::ops::Deref;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Message payload: a mapping of string keys to arbitrary JSON values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Lazy, unbounded stream of payloads returned by [`QueueBackend::consume`].
///
/// The stream never ends on its own. Dropping it cancels consumption.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<Payload, QueueError>> + Send>>;

/// Errors that can occur during queue backend operations.
///
/// None of these are retryable unless the specific backend documents
/// otherwise.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Invalid construction input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed routing key or payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend unreachable
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Named backend options.
///
/// Validity is backend-specific; the in-memory backend accepts anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendConfig(HashMap<String, serde_json::Value>);

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, returning the updated config.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Option names, sorted for stable log output.
    pub fn option_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Deref for BackendConfig {
    type Target = HashMap<String, serde_json::Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<HashMap<String, serde_json::Value>> for BackendConfig {
    fn from(options: HashMap<String, serde_json::Value>) -> Self {
        Self(options)
    }
}

/// A message held by a backend between publish and delivery.
///
/// Only `payload` reaches consumers; the rest is bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Unique message ID
    pub id: Uuid,

    /// Routing key supplied by the producer
    pub key: String,

    /// The message payload
    pub payload: Payload,

    /// When the message was enqueued
    pub queued_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a new stored message from a routing key and payload.
    pub fn new(key: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            payload,
            queued_at: Utc::now(),
        }
    }

    /// Consume the message, keeping only what a consumer is allowed to see.
    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Backend trait for queue implementations.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`); a single instance
/// is shared by any number of producer and consumer tasks.
///
/// # Error Handling
///
/// Fallible operations return `Result<T, QueueError>`. Backends without an
/// external connection never return [`QueueError::Connection`].
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Build a ready-to-use backend from named options.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Configuration` if the options are invalid for
    /// this backend.
    fn from_config(config: &BackendConfig) -> Result<Self, QueueError>
    where
        Self: Sized;

    /// Short identifier of the implementation, e.g. `"memory"`.
    fn backend_type(&self) -> &'static str;

    /// Enqueue one message.
    ///
    /// On success the message is visible to current and future `consume`
    /// streams.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` if the backend rejects the key or
    /// payload, `QueueError::Connection` if it cannot be reached.
    async fn publish(&self, key: &str, payload: Payload) -> Result<(), QueueError>;

    /// Open a new delivery stream.
    ///
    /// Each call returns an independent stream. `group` names a consumer
    /// group on backends that support grouping; others ignore it.
    async fn consume(&self, group: Option<&str>) -> Result<PayloadStream, QueueError>;
}
