//! Queue backend module.
//!
//! Producers publish `(routing key, payload)` pairs and consumers pull
//! payloads from lazy streams, through the [`QueueBackend`] trait.
//!
//! # Architecture
//!
//! - `QueueBackend`: the contract every backend implements
//! - `MemoryQueueBackend`: in-process reference backend over a shared
//!   [`MessageBuffer`] (development and testing only)
//! - `BackendRegistry`: selects a backend by configured name
//! - `QueueConsumer`: background task feeding a stream into a handler
//!
//! Use `create_queue_backend()` to build the backend named in settings.

mod advisory;
pub mod backend;
mod buffer;
mod consumer;
mod factory;
pub mod memory_backend;

pub use advisory::{BackendAdvisory, ADVISORY_TARGET};
pub use backend::{BackendConfig, Payload, PayloadStream, QueueBackend, QueueError, StoredMessage};
pub use buffer::MessageBuffer;
pub use consumer::{ConsumerReport, QueueConsumer, StopReason};
pub use factory::{construct, create_queue_backend, BackendConstructor, BackendRegistry};
pub use memory_backend::MemoryQueueBackend;
