use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;

use inproc_queue::config::Settings;
use inproc_queue::queue::{create_queue_backend, Payload, QueueConsumer};
use inproc_queue::telemetry::init_tracing;

/// Reads `<key> <json-object>` lines from stdin, publishes each one, and
/// logs every payload a background consumer receives.
#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.log)?;
    tracing::info!(backend = %settings.queue.backend, "Configuration loaded");

    let backend = create_queue_backend(&settings.queue)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let consumer = QueueConsumer::new(backend.clone(), shutdown_rx);
    let consumer_handle = tokio::spawn(consumer.run(|payload| async move {
        tracing::info!(payload = %serde_json::Value::Object(payload), "Consumed message");
    }));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Input closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok((key, payload)) => backend.publish(&key, payload).await?,
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed input line"),
                }
            }
        }
    }

    let _ = shutdown_tx.send(());
    let report = consumer_handle.await??;
    tracing::info!(processed = report.processed, "Shutdown complete");

    Ok(())
}

fn parse_line(line: &str) -> Result<(String, Payload)> {
    let (key, body) = line
        .trim()
        .split_once(char::is_whitespace)
        .context("expected '<key> <json-object>'")?;

    match serde_json::from_str(body.trim())? {
        serde_json::Value::Object(payload) => Ok((key.to_string(), payload)),
        other => bail!("payload must be a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let (key, payload) = parse_line(r#"orders {"id": 1}"#).unwrap();
        assert_eq!(key, "orders");
        assert_eq!(payload["id"], 1);
    }

    #[test]
    fn test_parse_line_rejects_non_object() {
        assert!(parse_line("orders [1, 2]").is_err());
        assert!(parse_line("orders").is_err());
        assert!(parse_line("orders {not json}").is_err());
    }
}
