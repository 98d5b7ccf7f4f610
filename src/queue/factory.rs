//! Queue backend registry and factory

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::QueueSettings;

use super::backend::{BackendConfig, QueueBackend, QueueError};
use super::memory_backend::MemoryQueueBackend;

/// Builds a shared backend instance from its options.
pub type BackendConstructor = fn(&BackendConfig) -> Result<Arc<dyn QueueBackend>, QueueError>;

/// Adapt any `QueueBackend::from_config` into a [`BackendConstructor`].
pub fn construct<B>(config: &BackendConfig) -> Result<Arc<dyn QueueBackend>, QueueError>
where
    B: QueueBackend + 'static,
{
    Ok(Arc::new(B::from_config(config)?))
}

/// Name-keyed set of backend constructors.
///
/// Backends are selected by the name found in configuration, never by
/// inspecting instances.
pub struct BackendRegistry {
    constructors: DashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in backends (`memory`).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("memory", construct::<MemoryQueueBackend>);
        registry
    }

    /// Register a constructor, replacing any previous one under `name`.
    pub fn register(&self, name: impl Into<String>, constructor: BackendConstructor) {
        let name = name.into();
        if self.constructors.insert(name.clone(), constructor).is_some() {
            tracing::debug!(backend = %name, "Replaced registered queue backend");
        }
    }

    /// Whether a backend is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Build the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Configuration` if `name` is not registered, or
    /// whatever the backend's constructor returns.
    pub fn create(
        &self,
        name: &str,
        config: &BackendConfig,
    ) -> Result<Arc<dyn QueueBackend>, QueueError> {
        // Copy the fn pointer out so the map lock is not held while constructing
        let constructor = self.constructors.get(name).map(|entry| *entry.value());

        match constructor {
            Some(constructor) => {
                let backend = constructor(config)?;
                tracing::info!(backend = %name, "Created queue backend");
                Ok(backend)
            }
            None => Err(QueueError::Configuration(format!(
                "unknown queue backend '{}' (available: {})",
                name,
                self.names().join(", ")
            ))),
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Create a queue backend based on configuration.
///
/// Uses the built-in registry; see [`BackendRegistry`] for custom backends.
///
/// # Example
///
/// ```rust,ignore
/// let backend = create_queue_backend(&settings.queue)?;
/// backend.publish("orders", payload).await?;
/// ```
pub fn create_queue_backend(settings: &QueueSettings) -> Result<Arc<dyn QueueBackend>, QueueError> {
    BackendRegistry::with_defaults().create(&settings.backend, &settings.options)
}
