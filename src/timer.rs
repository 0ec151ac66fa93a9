//! Periodic timer facility used for interval flushes.
//!
//! The batcher only needs "run this callback roughly every period" and
//! "cancel that registration". [`TokioScheduler`] is the default; tests and
//! embedders can supply their own [`Scheduler`].

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigurationError;

/// Callback invoked once per elapsed period.
///
/// The returned future is awaited before the next tick is considered, so
/// ticks never overlap.
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A live periodic registration.
pub trait TimerHandle: Send + Sync {
    /// Stop future ticks. A tick already running is not interrupted.
    fn cancel(self: Box<Self>);
}

/// Something that can run a [`Tick`] periodically.
pub trait Scheduler: Send + Sync + 'static {
    /// Register `tick` to run every `period`, first firing one period from now.
    fn schedule(
        &self,
        period: Duration,
        tick: Tick,
    ) -> Result<Box<dyn TimerHandle>, ConfigurationError>;
}

/// Default scheduler backed by a spawned tokio task and `tokio::time::interval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(
        &self,
        period: Duration,
        tick: Tick,
    ) -> Result<Box<dyn TimerHandle>, ConfigurationError> {
        let runtime = Handle::try_current().map_err(|_| ConfigurationError::NoRuntime)?;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let first = Instant::now() + period;

        runtime.spawn(async move {
            let mut ticker = time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => tick().await,
                }
            }
            tracing::trace!("interval task exited");
        });

        Ok(Box::new(TokioTimer { token }))
    }
}

struct TokioTimer {
    token: CancellationToken,
}

impl TimerHandle for TokioTimer {
    fn cancel(self: Box<Self>) {
        self.token.cancel();
    }
}
