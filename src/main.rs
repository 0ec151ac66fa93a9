//! message-batcher: group stdin lines into batches.
//!
//! # Usage
//!
//! ```bash
//! tail -f app.log | message-batcher --batch-size 50 --interval-ms 2000
//! ```
//!
//! Each batch is written to stdout as one JSON array. Environment variables
//! can also be used:
//! - `BATCHER_BATCH_SIZE`: Maximum lines per batch
//! - `BATCHER_INTERVAL_MS`: Interval flush period
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use message_batcher::config::Config;
use message_batcher::observability::metrics::init_metrics_with_endpoint;
use message_batcher::observability::tracing::init_tracing;
use message_batcher::Batcher;
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

async fn write_batch(batch: Vec<String>) -> anyhow::Result<()> {
    let line = serde_json::to_string(&batch)?;
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_args();

    init_tracing(&config.log_level);
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    let batcher_config = config.batcher();
    batcher_config
        .validate()
        .context("invalid batcher configuration")?;

    let batcher: Batcher<String, anyhow::Error> = Batcher::builder()
        .config(&batcher_config)
        .handler(write_batch)
        .build()?;

    tracing::info!(
        batch_size = batcher.batch_size(),
        interval_ms = config.interval_ms,
        "Batching stdin"
    );

    let mut lines = LinesStream::new(BufReader::new(io::stdin()).lines());
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(line) => batcher.add(line?).await?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), draining...");
                break;
            }
        }
    }

    let pending = batcher.len();
    batcher.stop_and_drain_all().await?;
    tracing::info!(drained = pending, "Shutdown complete");
    Ok(())
}
