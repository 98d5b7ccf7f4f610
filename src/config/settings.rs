use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::queue::BackendConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Registered backend name (`memory` is always available)
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Backend-specific options, passed through to `from_config`
    #[serde(default)]
    pub options: BackendConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("queue.backend", default_backend())?
            .set_default("log.json", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment());

        builder.build()?.try_deserialize()
    }
}

/// Environment source: `QUEUE__BACKEND`, `QUEUE__OPTIONS__<NAME>`, `LOG__JSON`.
///
/// Nesting uses a double underscore so option names may contain single ones
/// (`QUEUE__OPTIONS__CAPACITY_HINT` sets `capacity_hint`).
fn environment() -> Environment {
    Environment::default().separator("__").try_parsing(true)
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            options: BackendConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.queue.backend, "memory");
        assert!(settings.queue.options.is_empty());
        assert!(!settings.log.json);
    }

    #[test]
    fn test_deserialize_backend_options() {
        let source = r#"
            [queue]
            backend = "memory"

            [queue.options]
            capacity_hint = 64
            label = "dev"
        "#;

        let settings: Settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.queue.backend, "memory");
        assert_eq!(settings.queue.options.len(), 2);
        assert_eq!(
            settings.queue.options.get("label").and_then(|v| v.as_str()),
            Some("dev")
        );
    }

    #[test]
    fn test_environment_keeps_underscores_in_option_names() {
        let mut vars = config::Map::new();
        vars.insert("QUEUE__BACKEND".to_string(), "memory".to_string());
        vars.insert("QUEUE__OPTIONS__CAPACITY_HINT".to_string(), "64".to_string());
        // Single underscores do not nest, so this cannot clobber `queue.backend`
        vars.insert("QUEUE_BACKEND_URL".to_string(), "amqp://localhost".to_string());

        let settings: Settings = Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.queue.backend, "memory");
        assert_eq!(settings.queue.options.option_names(), vec!["capacity_hint"]);
        assert_eq!(
            settings.queue.options.get("capacity_hint").and_then(|v| v.as_i64()),
            Some(64)
        );
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str("", FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.queue.backend, "memory");
        assert!(!settings.log.json);
    }
}
