//! Per-stage metric collections for load, clean and save.

use std::time::Duration;

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics for the load stage
pub struct LoadMetrics;

impl LoadMetrics {
    pub fn record_rows(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "load", "rows")).increment(rows as u64);
    }

    pub fn record_duration(elapsed: Duration) {
        ::metrics::histogram!(phase_metric!(histogram, "load", "duration_seconds"))
            .record(elapsed.as_secs_f64());
    }
}

impl PhaseMetrics for LoadMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "load", "rows"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "load", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "load"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "load", "rows"),
                metric_type: MetricType::Counter,
                help: "Rows produced by joining messages with categories",
            },
            MetricDoc {
                name: phase_metric!(histogram, "load", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent reading and joining the input files",
            },
        ]
    }
}

/// Metrics for the clean stage
pub struct CleanMetrics;

impl CleanMetrics {
    pub fn record_dropped_out_of_range(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "clean", "rows_out_of_range"))
            .increment(rows as u64);
    }

    pub fn record_duplicates_removed(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "clean", "duplicates_removed"))
            .increment(rows as u64);
    }

    pub fn record_duration(elapsed: Duration) {
        ::metrics::histogram!(phase_metric!(histogram, "clean", "duration_seconds"))
            .record(elapsed.as_secs_f64());
    }
}

impl PhaseMetrics for CleanMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "rows_out_of_range"));
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "duplicates_removed"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "clean", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "clean"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "clean", "rows_out_of_range"),
                metric_type: MetricType::Counter,
                help: "Rows dropped because a category value was above 1",
            },
            MetricDoc {
                name: phase_metric!(counter, "clean", "duplicates_removed"),
                metric_type: MetricType::Counter,
                help: "Exact duplicate rows removed",
            },
            MetricDoc {
                name: phase_metric!(histogram, "clean", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent expanding and filtering categories",
            },
        ]
    }
}

/// Metrics for the save stage
pub struct SaveMetrics;

impl SaveMetrics {
    pub fn record_rows_written(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "save", "rows_written")).increment(rows as u64);
    }

    pub fn record_error() {
        ::metrics::counter!(phase_metric!(counter, "save", "errors")).increment(1);
    }

    pub fn record_duration(elapsed: Duration) {
        ::metrics::histogram!(phase_metric!(histogram, "save", "duration_seconds"))
            .record(elapsed.as_secs_f64());
    }
}

impl PhaseMetrics for SaveMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "save", "rows_written"));
        let _ = ::metrics::counter!(phase_metric!(counter, "save", "errors"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "save", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "save"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "save", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows written to the SQLite table",
            },
            MetricDoc {
                name: phase_metric!(counter, "save", "errors"),
                metric_type: MetricType::Counter,
                help: "Failed writes to the SQLite store",
            },
            MetricDoc {
                name: phase_metric!(histogram, "save", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent writing the output table",
            },
        ]
    }
}
