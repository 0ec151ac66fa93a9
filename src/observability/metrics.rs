//! OpenTelemetry metrics for flush activity.
//!
//! Key metrics:
//! - batcher_flush_total: Counter of handler invocations
//! - batcher_items_flushed_total: Counter of items delivered to the handler
//! - batcher_flush_latency_seconds: Histogram of handler latency
//! - batcher_handler_failures_total: Counter of failed handler invocations
//!
//! Every metric carries a `trigger` attribute (size, manual, interval, drain).
//! Recording is a no-op until [`init_metrics`] has been called.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::batcher::FlushTrigger;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Batcher metrics registry.
#[derive(Debug)]
pub struct Metrics {
    pub flush_total: Counter<u64>,
    pub items_flushed: Counter<u64>,
    pub flush_latency: Histogram<f64>,
    pub handler_failures: Counter<u64>,
}

impl Metrics {
    fn new(meter: &Meter) -> Self {
        Self {
            flush_total: meter
                .u64_counter("batcher_flush_total")
                .with_description("Number of batches handed to the flush handler")
                .with_unit("1")
                .init(),
            items_flushed: meter
                .u64_counter("batcher_items_flushed_total")
                .with_description("Number of items handed to the flush handler")
                .with_unit("1")
                .init(),
            flush_latency: meter
                .f64_histogram("batcher_flush_latency_seconds")
                .with_description("Time spent awaiting the flush handler")
                .with_unit("s")
                .init(),
            handler_failures: meter
                .u64_counter("batcher_handler_failures_total")
                .with_description("Number of flush handler invocations that failed")
                .with_unit("1")
                .init(),
        }
    }
}

fn manual_provider() -> SdkMeterProvider {
    let reader = ManualReader::builder().build();
    SdkMeterProvider::builder().with_reader(reader).build()
}

/// Initialize the metrics system, optionally exporting over OTLP.
///
/// Subsequent calls are ignored.
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, metrics stay local");
                    global::set_meter_provider(manual_provider());
                }
            }
        } else {
            // Recorded but never exported.
            global::set_meter_provider(manual_provider());
        }

        let meter = global::meter("message_batcher");
        Metrics::new(&meter)
    });
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record a completed handler invocation.
pub fn record_flush(trigger: FlushTrigger, items: usize, latency_seconds: f64) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("trigger", trigger.as_str())];
        m.flush_total.add(1, &attrs);
        m.items_flushed.add(items as u64, &attrs);
        m.flush_latency.record(latency_seconds, &attrs);
    }
}

/// Record a failed handler invocation.
pub fn record_handler_failure(trigger: FlushTrigger) {
    if let Some(m) = METRICS.get() {
        m.handler_failures
            .add(1, &[KeyValue::new("trigger", trigger.as_str())]);
    }
}
