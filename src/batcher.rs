//! Size- and interval-triggered batching buffer.
//!
//! Items are appended to a FIFO queue and released to a caller-supplied
//! handler in batches of at most `batch_size`:
//! - `add` flushes every full batch as soon as one is available
//! - `flush` releases one batch (possibly short) on demand
//! - an optional interval timer calls `flush` periodically
//!
//! # Delivery
//!
//! A batch is removed from the queue before the handler runs. If the
//! handler fails, that batch is gone: the error is returned to whichever
//! call triggered the flush and nothing is retried or re-queued.
//!
//! # Concurrency
//!
//! Handler invocations are strictly sequential. A dispatch lock is held
//! from batch extraction until the handler's future resolves, so batches
//! reach the handler in queue order no matter which path (caller or timer)
//! triggered them, and no two flushes ever drain overlapping items.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::chunk::chunk;
use crate::config::BatcherConfig;
use crate::error::{require_positive, ConfigurationError};
use crate::observability::metrics::{record_flush, record_handler_failure};
use crate::timer::{Scheduler, Tick, TimerHandle, TokioScheduler};

/// Interval used by [`Batcher::start`] when none is given.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(10_000);

type Handler<T, E> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;
type ErrorSink<E> = Arc<dyn Fn(E) + Send + Sync>;

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The queue reached `batch_size` during `add`.
    Size,
    /// An explicit `flush` call.
    Manual,
    /// The interval timer fired.
    Interval,
    /// `stop_and_drain` or `drain`.
    Drain,
}

impl FlushTrigger {
    /// Label used in log fields and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Manual => "manual",
            FlushTrigger::Interval => "interval",
            FlushTrigger::Drain => "drain",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Inner<T, E> {
    queue: Mutex<VecDeque<T>>,
    batch_size: usize,
    handler: Handler<T, E>,
    /// Held for the whole extract-then-handle sequence of one flush.
    dispatch: tokio::sync::Mutex<()>,
    timer: Mutex<Option<Box<dyn TimerHandle>>>,
    scheduler: Arc<dyn Scheduler>,
    on_interval_error: ErrorSink<E>,
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E> Inner<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Release up to `batch_size` items, or only a full batch when `full_only`.
    ///
    /// Returns whether a batch was handed to the handler.
    async fn flush_once(&self, trigger: FlushTrigger, full_only: bool) -> Result<bool, E> {
        let _dispatch = self.dispatch.lock().await;

        let (batch, remaining) = {
            let mut queue = lock(&self.queue);
            let available = queue.len();
            if available == 0 || (full_only && available < self.batch_size) {
                return Ok(false);
            }
            let take = available.min(self.batch_size);
            let batch: Vec<T> = queue.drain(..take).collect();
            (batch, queue.len())
        };

        let size = batch.len();
        let start = Instant::now();
        let result = (self.handler)(batch).await;
        let latency = start.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                record_flush(trigger, size, latency);
                tracing::debug!(
                    %trigger,
                    batch_size = size,
                    remaining,
                    latency_ms = latency * 1000.0,
                    "Batch flushed"
                );
                Ok(true)
            }
            Err(e) => {
                record_handler_failure(trigger);
                tracing::warn!(%trigger, batch_size = size, error = %e, "Flush handler failed, batch dropped");
                Err(e)
            }
        }
    }

    fn stop(&self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.cancel();
            tracing::info!("Interval flush stopped");
        }
    }
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.cancel();
        }
    }
}

/// A batching buffer.
///
/// Cloning yields another handle to the same queue and timer.
///
/// The handler must not await operations on the batcher that invoked it:
/// the dispatch lock is held until the handler's future resolves. Spawn
/// such calls with `tokio::spawn` instead.
pub struct Batcher<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Batcher<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Batcher<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("batch_size", &self.inner.batch_size)
            .field("queued", &lock(&self.inner.queue).len())
            .field("running", &lock(&self.inner.timer).is_some())
            .finish_non_exhaustive()
    }
}

impl<T, E> Batcher<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a batcher releasing at most `batch_size` items per flush.
    ///
    /// # Errors
    ///
    /// `SizeNotPositive` if `batch_size` is zero.
    pub fn new<F, Fut>(batch_size: usize, handler: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self::builder().batch_size(batch_size).handler(handler).build()
    }

    /// Start building a batcher with non-default collaborators.
    pub fn builder() -> BatcherBuilder<T, E> {
        BatcherBuilder::new()
    }

    /// Append one item, then flush every full batch.
    ///
    /// # Errors
    ///
    /// The first handler error; batches after the failing one stay queued.
    pub async fn add(&self, item: T) -> Result<(), E> {
        self.add_all(std::iter::once(item)).await
    }

    /// Append items in order, then flush every full batch.
    ///
    /// Adding `batch_size * k + r` items to an empty queue invokes the
    /// handler `k` times and leaves `r` items queued. Each flush completes
    /// before the next starts.
    ///
    /// # Errors
    ///
    /// The first handler error; batches after the failing one stay queued.
    pub async fn add_all<I>(&self, items: I) -> Result<(), E>
    where
        I: IntoIterator<Item = T>,
    {
        let queued = {
            let mut queue = lock(&self.inner.queue);
            let before = queue.len();
            queue.extend(items);
            tracing::trace!(added = queue.len() - before, queued = queue.len(), "Items queued");
            queue.len()
        };

        if queued < self.inner.batch_size {
            return Ok(());
        }
        while self.inner.flush_once(FlushTrigger::Size, true).await? {}
        Ok(())
    }

    /// Release one batch of up to `batch_size` items.
    ///
    /// A no-op on an empty queue. Callers wanting everything must call
    /// [`drain`](Self::drain) or loop.
    pub async fn flush(&self) -> Result<(), E> {
        self.inner.flush_once(FlushTrigger::Manual, false).await?;
        Ok(())
    }

    /// Flush repeatedly until the queue is empty.
    pub async fn drain(&self) -> Result<(), E> {
        while self.inner.flush_once(FlushTrigger::Drain, false).await? {}
        Ok(())
    }

    /// Start flushing once per `interval` (default 10s).
    ///
    /// Replaces any active timer, so at most one is ever running.
    ///
    /// # Errors
    ///
    /// `IntervalNotPositive` for a zero interval; `NoRuntime` when the
    /// default scheduler is used outside a tokio runtime.
    pub fn start(&self, interval: Option<Duration>) -> Result<(), ConfigurationError> {
        let interval = interval.unwrap_or(DEFAULT_FLUSH_INTERVAL);
        if interval.is_zero() {
            return Err(ConfigurationError::IntervalNotPositive);
        }

        let mut slot = lock(&self.inner.timer);
        let handle = self.inner.scheduler.schedule(interval, self.interval_tick())?;
        if let Some(previous) = slot.replace(handle) {
            previous.cancel();
        }

        tracing::info!(interval_ms = interval.as_millis() as u64, "Interval flush started");
        Ok(())
    }

    fn interval_tick(&self) -> Tick {
        let weak: Weak<Inner<T, E>> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = inner.flush_once(FlushTrigger::Interval, false).await {
                    (inner.on_interval_error)(e);
                }
            }
            .boxed()
        })
    }

    /// Cancel the interval timer, if any. Queued items are untouched.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Cancel the timer and release one final batch.
    ///
    /// If more than `batch_size` items are queued the rest stay queued; use
    /// [`stop_and_drain_all`](Self::stop_and_drain_all) to empty the queue.
    pub async fn stop_and_drain(&self) -> Result<(), E> {
        self.stop();
        self.inner.flush_once(FlushTrigger::Drain, false).await?;
        Ok(())
    }

    /// Alias of [`stop_and_drain`](Self::stop_and_drain).
    pub async fn stop_and_flush(&self) -> Result<(), E> {
        self.stop_and_drain().await
    }

    /// Cancel the timer and flush until the queue is empty.
    pub async fn stop_and_drain_all(&self) -> Result<(), E> {
        self.stop();
        self.drain().await
    }

    /// Partition `items` into groups of `size`. See [`chunk`](crate::chunk()).
    pub fn chunk<I>(items: I, size: Option<usize>) -> Result<Vec<Vec<T>>, ConfigurationError>
    where
        I: IntoIterator<Item = T>,
    {
        chunk(items, size)
    }
}

impl<T, E> Batcher<T, E> {
    /// Maximum number of items per batch.
    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner.queue).is_empty()
    }

    /// Whether an interval timer is active.
    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }
}

/// Builder for [`Batcher`].
pub struct BatcherBuilder<T, E> {
    batch_size: Option<usize>,
    flush_interval: Option<Duration>,
    handler: Option<Handler<T, E>>,
    scheduler: Arc<dyn Scheduler>,
    on_interval_error: Option<ErrorSink<E>>,
}

impl<T, E> BatcherBuilder<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn new() -> Self {
        Self {
            batch_size: None,
            flush_interval: None,
            handler: None,
            scheduler: Arc::new(TokioScheduler),
            on_interval_error: None,
        }
    }

    /// Maximum number of items per batch. Required.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Apply batch size and auto-start interval from a config.
    pub fn config(mut self, config: &BatcherConfig) -> Self {
        self.batch_size = Some(config.batch_size);
        self.flush_interval = config.flush_interval();
        self
    }

    /// Start the interval timer as part of `build`.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Async function receiving each batch. Required.
    ///
    /// The handler runs while this batcher's dispatch lock is held, so it
    /// must not await `add`, `add_all`, `flush`, `drain` or `stop_and_drain`
    /// on the same batcher (or a clone); that never completes. Re-queue
    /// from a spawned task instead:
    ///
    /// ```ignore
    /// let requeue = batcher.clone();
    /// tokio::spawn(async move { requeue.add_all(batch).await });
    /// ```
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |batch| handler(batch).boxed()));
        self
    }

    /// Use a custom timer facility for interval flushes.
    pub fn scheduler<S: Scheduler>(mut self, scheduler: S) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Receive handler errors raised by interval flushes.
    ///
    /// No caller awaits those flushes, so without a sink they are reported
    /// as `tracing` error events.
    pub fn on_interval_error<F>(mut self, sink: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.on_interval_error = Some(Arc::new(sink));
        self
    }

    /// Validate and construct the batcher, starting the timer if an
    /// interval was configured.
    pub fn build(self) -> Result<Batcher<T, E>, ConfigurationError> {
        let handler = self.handler.ok_or(ConfigurationError::MissingHandler)?;
        let batch_size = require_positive(self.batch_size)?;
        let on_interval_error: ErrorSink<E> = match self.on_interval_error {
            Some(sink) => sink,
            None => Arc::new(|e: E| {
                tracing::error!(error = %e, "Interval flush failed, batch dropped");
            }),
        };

        let batcher = Batcher {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                batch_size,
                handler,
                dispatch: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
                scheduler: self.scheduler,
                on_interval_error,
            }),
        };

        if let Some(interval) = self.flush_interval {
            batcher.start(Some(interval))?;
        }
        Ok(batcher)
    }
}
