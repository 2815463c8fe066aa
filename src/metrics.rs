//! Prometheus metrics for upstream latency and endpoint outcomes.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tracing::debug;

// === Metric Name Constants ===

/// Upstream request latency metric name.
pub const METRIC_UPSTREAM_LATENCY: &str = "upstream_request_latency_ms";
/// Upstream failures counter metric name.
pub const METRIC_UPSTREAM_FAILED: &str = "upstream_requests_failed_total";
/// API responses counter metric name.
pub const METRIC_API_REQUESTS: &str = "api_requests_total";

/// Label value for the settings-management service.
pub const SERVICE_SETTINGS: &str = "settings-management";
/// Label value for the Code Climate API.
pub const SERVICE_CODE_CLIMATE: &str = "code-climate";

/// Register metric descriptions. Call once at startup.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_UPSTREAM_LATENCY,
        "Outbound request latency in milliseconds"
    );
    describe_counter!(
        METRIC_UPSTREAM_FAILED,
        "Total number of failed outbound requests"
    );
    describe_counter!(
        METRIC_API_REQUESTS,
        "Total number of API responses by endpoint and status"
    );

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and describe all metrics.
pub fn install_prometheus() -> Result<PrometheusHandle, String> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("failed to install prometheus recorder: {e}"))?;
    init_metrics();
    Ok(handle)
}

/// How often histogram buckets are drained when nobody scrapes `/metrics`.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Periodically drain the recorder's histograms so memory stays bounded
/// between scrapes. The task runs until aborted.
pub fn spawn_upkeep(handle: PrometheusHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    })
}

/// Increment the failed-request counter for a collaborator.
pub fn inc_upstream_failed(service: &'static str) {
    counter!(METRIC_UPSTREAM_FAILED, "service" => service).increment(1);
}

/// Count one API response.
pub fn inc_api_requests(endpoint: &'static str, status: u16) {
    counter!(METRIC_API_REQUESTS, "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}

/// RAII guard for timing an outbound call.
/// Records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    service: &'static str,
}

impl LatencyTimer {
    /// Start timing a call to `service`.
    pub fn new(service: &'static str) -> Self {
        Self {
            start: Instant::now(),
            service,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(METRIC_UPSTREAM_LATENCY, "service" => self.service).record(self.elapsed_ms());
    }
}
