//! Prometheus metrics for the lighten pipeline.

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUESTS_TOTAL: &str = "pdflight_requests_total";
const TOOL_DURATION_SECONDS: &str = "pdflight_tool_duration_seconds";
const BYTES_IN_TOTAL: &str = "pdflight_bytes_in_total";
const BYTES_OUT_TOTAL: &str = "pdflight_bytes_out_total";

/// Install the global recorder. Call once, from `main`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(TOOL_DURATION_SECONDS.to_string()),
            &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )?
        .install_recorder()
}

/// `outcome` is `ok` or an error kind.
pub fn record_request(outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_tool_duration(tool: &'static str, elapsed: Duration) {
    histogram!(TOOL_DURATION_SECONDS, "tool" => tool).record(elapsed.as_secs_f64());
}

pub fn record_sizes(bytes_in: usize, bytes_out: usize) {
    counter!(BYTES_IN_TOTAL).increment(bytes_in as u64);
    counter!(BYTES_OUT_TOTAL).increment(bytes_out as u64);
}
