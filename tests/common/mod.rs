//! Test utilities for batcher tests.
//!
//! Provides:
//! - A recording handler that stores every batch it receives
//! - A handler that fails on chosen invocations
//! - A scheduler wrapper counting registrations and cancellations

#![allow(dead_code)]

use message_batcher::observability::tracing::init_test_tracing;
use message_batcher::timer::Tick;
use message_batcher::{Batcher, ConfigurationError, Scheduler, TimerHandle, TokioScheduler};
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BATCH_SIZE: usize = 5;

pub fn messages(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("msg{i}")).collect()
}

/// Shared log of batches delivered to a handler, in dispatch order.
#[derive(Clone, Default)]
pub struct Recorder<T> {
    batches: Arc<Mutex<Vec<Vec<T>>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn record(&self, batch: Vec<T>) {
        self.batches.lock().unwrap().push(batch);
    }

    pub fn batches(&self) -> Vec<Vec<T>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn flattened(&self) -> Vec<T> {
        self.batches().into_iter().flatten().collect()
    }
}

/// Build a batcher whose handler succeeds and records each batch.
pub fn recording_batcher(batch_size: usize) -> (Batcher<String, Infallible>, Recorder<String>) {
    init_test_tracing();
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let batcher = Batcher::<String, Infallible>::new(batch_size, move |batch| {
        sink.record(batch);
        async { Ok(()) }
    })
    .expect("valid configuration");
    (batcher, recorder)
}

/// Error returned by [`failing_batcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailed(pub usize);

impl fmt::Display for SendFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send #{} failed", self.0)
    }
}

impl std::error::Error for SendFailed {}

/// Build a batcher whose handler fails on the given (1-based) invocations.
pub fn failing_batcher(
    batch_size: usize,
    fail_on: &'static [usize],
) -> (Batcher<String, SendFailed>, Recorder<String>) {
    init_test_tracing();
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let batcher = Batcher::<String, SendFailed>::new(batch_size, move |batch| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = if fail_on.contains(&call) {
            Err(SendFailed(call))
        } else {
            sink.record(batch);
            Ok(())
        };
        async move { result }
    })
    .expect("valid configuration");
    (batcher, recorder)
}

/// Wraps [`TokioScheduler`], counting how often timers are created and cancelled.
#[derive(Clone, Default)]
pub struct CountingScheduler {
    pub scheduled: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicUsize>,
    pub last_period: Arc<Mutex<Option<Duration>>>,
}

impl CountingScheduler {
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn last_period(&self) -> Option<Duration> {
        *self.last_period.lock().unwrap()
    }
}

struct CountingHandle {
    inner: Box<dyn TimerHandle>,
    cancelled: Arc<AtomicUsize>,
}

impl TimerHandle for CountingHandle {
    fn cancel(self: Box<Self>) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel();
    }
}

impl Scheduler for CountingScheduler {
    fn schedule(
        &self,
        period: Duration,
        tick: Tick,
    ) -> Result<Box<dyn TimerHandle>, ConfigurationError> {
        let inner = TokioScheduler.schedule(period, tick)?;
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        *self.last_period.lock().unwrap() = Some(period);
        Ok(Box::new(CountingHandle {
            inner,
            cancelled: self.cancelled.clone(),
        }))
    }
}

/// Build a recording batcher driven by a [`CountingScheduler`].
pub fn timed_batcher(
    batch_size: usize,
) -> (Batcher<String, Infallible>, Recorder<String>, CountingScheduler) {
    init_test_tracing();
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let scheduler = CountingScheduler::default();
    let batcher = Batcher::<String, Infallible>::builder()
        .batch_size(batch_size)
        .handler(move |batch| {
            sink.record(batch);
            async { Ok(()) }
        })
        .scheduler(scheduler.clone())
        .build()
        .expect("valid configuration");
    (batcher, recorder, scheduler)
}
