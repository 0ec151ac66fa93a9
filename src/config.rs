//! Configuration for batchers and the demo binary.
//!
//! Supports:
//! - `BatcherConfig` for embedding (serde-deserializable)
//! - CLI arguments and environment overrides via clap
//! - Sensible defaults for quick start

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::batcher::DEFAULT_FLUSH_INTERVAL;
use crate::error::ConfigurationError;

/// Batch size and flush interval for one batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Maximum number of items per batch
    pub batch_size: usize,
    /// Interval flush period in milliseconds; `None` disables the timer
    pub flush_interval_ms: Option<u64>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval_ms: Some(DEFAULT_FLUSH_INTERVAL.as_millis() as u64),
        }
    }
}

impl BatcherConfig {
    /// Create a BatcherConfig from raw values.
    pub fn from_config(batch_size: usize, flush_interval_ms: Option<u64>) -> Self {
        Self {
            batch_size,
            flush_interval_ms,
        }
    }

    /// The interval timer period, if enabled.
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_ms.map(Duration::from_millis)
    }

    /// Check values without building a batcher.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::SizeNotPositive);
        }
        if self.flush_interval_ms == Some(0) {
            return Err(ConfigurationError::IntervalNotPositive);
        }
        Ok(())
    }
}

/// message-batcher: group stdin lines into JSON array batches.
#[derive(Parser, Debug, Clone)]
#[command(name = "message-batcher")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Maximum number of lines per batch
    #[arg(short, long, env = "BATCHER_BATCH_SIZE", default_value_t = 100)]
    pub batch_size: usize,

    /// Flush a partial batch after this many milliseconds
    #[arg(short, long, env = "BATCHER_INTERVAL_MS", default_value_t = 10_000)]
    pub interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The batcher settings carried by this configuration.
    pub fn batcher(&self) -> BatcherConfig {
        BatcherConfig::from_config(self.batch_size, Some(self.interval_ms))
    }
}
