//! Prometheus metrics, rendered at `GET /metrics`.
//!
//! - `stash_documents_created_total` - documents stored through `/documents` or `/log`
//! - `stash_documents_read_total` - documents served through `/documents` or `/raw`

use ::metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::warn;

pub const DOCUMENTS_CREATED: &str = "stash_documents_created_total";
pub const DOCUMENTS_READ: &str = "stash_documents_read_total";

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder on first use and returns its handle.
///
/// Counters recorded before this runs are lost, so the router calls it when
/// it is built.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        if ::metrics::set_global_recorder(recorder).is_err() {
            warn!("A metrics recorder is already installed; /metrics stays empty");
        }
        register_metrics();

        handle
    })
}

fn register_metrics() {
    describe_counter!(DOCUMENTS_CREATED, "Total number of documents created");
    describe_counter!(DOCUMENTS_READ, "Total number of documents read");
}

pub fn record_document_created() {
    counter!(DOCUMENTS_CREATED).increment(1);
}

pub fn record_document_read() {
    counter!(DOCUMENTS_READ).increment(1);
}

/// Renders all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}
