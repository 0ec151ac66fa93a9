//! message-batcher: a size- and interval-triggered batching buffer.
//!
//! Callers append items one at a time or in groups; the [`Batcher`]
//! releases them to a caller-supplied async handler in batches of at most
//! `batch_size`, either as soon as a full batch is queued or when a
//! periodic timer fires.
//!
//! # Example
//!
//! ```
//! use message_batcher::Batcher;
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let batcher = Batcher::<&'static str, Infallible>::new(2, |batch| async move {
//!     println!("sending {batch:?}");
//!     Ok(())
//! })
//! .unwrap();
//!
//! batcher.add_all(["a", "b", "c"]).await.unwrap(); // sends ["a", "b"]
//! batcher.stop_and_drain().await.unwrap(); // sends ["c"]
//! assert!(batcher.is_empty());
//! # }
//! ```
//!
//! # Modules
//!
//! - [`batcher`]: The batching buffer and its builder
//! - [`chunk`](mod@chunk): Stateless partitioning into fixed-size groups
//! - [`config`]: Library and CLI configuration
//! - [`error`]: Configuration errors
//! - [`observability`]: Logging and metrics setup
//! - [`timer`]: Periodic timer facility for interval flushes

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // batcher::BatcherBuilder is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc          // Panic docs can be verbose
)]

pub mod batcher;
pub mod chunk;
pub mod config;
pub mod error;
pub mod observability;
pub mod timer;

pub use batcher::{Batcher, BatcherBuilder, FlushTrigger, DEFAULT_FLUSH_INTERVAL};
pub use chunk::chunk;
pub use config::BatcherConfig;
pub use error::ConfigurationError;
pub use timer::{Scheduler, TimerHandle, TokioScheduler};
