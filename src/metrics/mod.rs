//! Stage metrics for the ETL pipeline
//!
//! Each pipeline stage defines its metrics in `stages`, named through
//! `phase_metric!` so every series shares the `etl_{stage}_{name}` layout.
//! Stages only talk to the `metrics` facade. When `[metrics] textfile` is set,
//! the binary installs a Prometheus recorder and writes a textfile snapshot
//! after the run.

pub mod stages;

pub use stages::{CleanMetrics, LoadMetrics, SaveMetrics};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{EtlError, Result};

/// Trait for stage-specific metrics collections
pub trait PhaseMetrics {
    /// Pre-register all metrics for this stage
    fn register_metrics();

    /// Stage name used in metric names
    fn phase_name() -> &'static str;

    /// Documentation for all metrics in this stage
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build a metric name following `etl_{stage}_{name}` (counters get `_total`)
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("etl_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

/// Register every stage's metrics, returning the documented names.
///
/// Name clashes between stages are logged rather than rejected.
pub fn register_all_metrics() -> HashMap<&'static str, MetricDoc> {
    let mut all_metrics = HashMap::new();
    register_phase_metrics::<LoadMetrics>(&mut all_metrics);
    register_phase_metrics::<CleanMetrics>(&mut all_metrics);
    register_phase_metrics::<SaveMetrics>(&mut all_metrics);
    debug!("Registered {} metrics across all stages", all_metrics.len());
    all_metrics
}

/// Install a global Prometheus recorder and register every stage's metrics.
///
/// Returns `None` (after a warning) if another recorder is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_all_metrics();
            info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Write the current snapshot in Prometheus text format to `path`.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EtlError::FileAccess {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, handle.render()).map_err(|source| EtlError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Wrote metrics textfile");
    Ok(())
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict: '{}' defined again by stage '{}'",
                doc.name,
                T::phase_name()
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_metric_names() {
        assert_eq!(phase_metric!(counter, "load", "rows"), "etl_load_rows_total");
        assert_eq!(
            phase_metric!(histogram, "save", "duration_seconds"),
            "etl_save_duration_seconds"
        );
    }

    #[test]
    fn every_stage_metric_is_registered_once() {
        let all = register_all_metrics();
        let expected: usize = LoadMetrics::metrics_documentation().len()
            + CleanMetrics::metrics_documentation().len()
            + SaveMetrics::metrics_documentation().len();
        assert_eq!(all.len(), expected);
        assert!(all.keys().all(|name| name.starts_with("etl_")));
    }

    #[test]
    fn stage_counters_reach_the_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            CleanMetrics::record_dropped_out_of_range(2);
            CleanMetrics::record_duplicates_removed(3);
            CleanMetrics::record_duplicates_removed(1);
            SaveMetrics::record_rows_written(7);
        });

        let rendered = handle.render();
        assert!(rendered.contains("etl_clean_rows_out_of_range_total 2"), "{rendered}");
        assert!(rendered.contains("etl_clean_duplicates_removed_total 4"), "{rendered}");
        assert!(rendered.contains("etl_save_rows_written_total 7"), "{rendered}");
    }

    #[test]
    fn textfile_snapshot_is_written() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || LoadMetrics::record_rows(5));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics").join("etl.prom");
        write_textfile(&handle, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("etl_load_rows_total 5"), "{text}");
    }
}
