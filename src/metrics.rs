//! Pipeline and report counters.
//!
//! Recording is always safe: until [`init_metrics`] installs the Prometheus
//! recorder the macros are no-ops.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const FETCH_REQUESTS_TOTAL: &str = "healthcare_fetch_requests_total";
pub const RECORDS_FETCHED_TOTAL: &str = "healthcare_records_fetched_total";
pub const RECORDS_DROPPED_TOTAL: &str = "healthcare_records_dropped_total";
pub const RECORDS_INSERTED_TOTAL: &str = "healthcare_records_inserted_total";
pub const REPORT_QUERIES_TOTAL: &str = "healthcare_report_queries_total";

/// Installs the in-process Prometheus recorder. Idempotent and safe to race.
pub fn init_metrics() {
    HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        match metrics::set_global_recorder(recorder) {
            Ok(()) => info!("Prometheus recorder installed"),
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
        handle
    });
}

/// Prometheus text exposition of everything recorded so far
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

pub fn record_fetch(resource: &str, outcome: &'static str, records: usize) {
    counter!(FETCH_REQUESTS_TOTAL, "resource" => resource.to_string(), "outcome" => outcome)
        .increment(1);
    counter!(RECORDS_FETCHED_TOTAL, "resource" => resource.to_string())
        .increment(records as u64);
}

pub fn record_dropped(entity: &'static str, dropped: usize) {
    counter!(RECORDS_DROPPED_TOTAL, "entity" => entity).increment(dropped as u64);
}

pub fn record_inserted(table: &'static str, inserted: usize) {
    counter!(RECORDS_INSERTED_TOTAL, "table" => table).increment(inserted as u64);
}

pub fn record_report_query(kind: &'static str) {
    counter!(REPORT_QUERIES_TOTAL, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_rendered() {
        init_metrics();
        init_metrics();

        record_fetch("cases", "success", 3);
        record_dropped("Cases", 2);
        record_inserted("daily_cases", 1);
        record_report_query("top_n");

        let text = render().unwrap();
        for name in [
            FETCH_REQUESTS_TOTAL,
            RECORDS_FETCHED_TOTAL,
            RECORDS_DROPPED_TOTAL,
            RECORDS_INSERTED_TOTAL,
            REPORT_QUERIES_TOTAL,
        ] {
            assert!(text.contains(name), "missing {name} in:\n{text}");
        }
        assert!(text.contains("kind=\"top_n\""));
    }
}
