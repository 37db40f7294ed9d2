use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, info_span};

use crate::config::EtlConfig;
use crate::error::Result;
use crate::loader::load_data;
use crate::metrics::{CleanMetrics, LoadMetrics, SaveMetrics};
use crate::store::save_data;
use crate::transform::clean_data;

/// Input and output locations for one run
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub messages: PathBuf,
    pub categories: PathBuf,
    pub database: PathBuf,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Save,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub rows_dropped_out_of_range: usize,
    pub duplicates_removed: usize,
    pub rows_written: usize,
    pub category_count: usize,
    pub table_name: String,
}

pub struct Pipeline {
    config: EtlConfig,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    /// Load, clean and save. Any stage failure aborts the run.
    pub fn run(&self, paths: &PipelinePaths) -> Result<RunSummary> {
        self.run_with_progress(paths, |_| {})
    }

    /// Like [`Pipeline::run`], calling `on_stage` as each stage starts.
    pub fn run_with_progress(
        &self,
        paths: &PipelinePaths,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<RunSummary> {
        let combined = {
            on_stage(Stage::Load);
            let _span = info_span!("load").entered();
            info!(
                messages = %paths.messages.display(),
                categories = %paths.categories.display(),
                "Loading data"
            );
            let started = Instant::now();
            let combined = load_data(&paths.messages, &paths.categories, &self.config)?;
            LoadMetrics::record_duration(started.elapsed());
            LoadMetrics::record_rows(combined.len());
            combined
        };
        let rows_loaded = combined.len();

        let cleaned = {
            on_stage(Stage::Clean);
            let _span = info_span!("clean").entered();
            info!(rows = rows_loaded, "Cleaning data");
            let started = Instant::now();
            let cleaned = clean_data(combined, &self.config)?;
            CleanMetrics::record_duration(started.elapsed());
            CleanMetrics::record_dropped_out_of_range(cleaned.stats.dropped_out_of_range);
            CleanMetrics::record_duplicates_removed(cleaned.stats.duplicates_removed);
            cleaned
        };

        let table_name = {
            on_stage(Stage::Save);
            let _span = info_span!("save").entered();
            info!(database = %paths.database.display(), "Saving data");
            let started = Instant::now();
            let table_name = save_data(&cleaned.table, &paths.database).map_err(|e| {
                SaveMetrics::record_error();
                error!("Save failed: {}", e);
                e
            })?;
            SaveMetrics::record_duration(started.elapsed());
            SaveMetrics::record_rows_written(cleaned.table.len());
            table_name
        };

        Ok(RunSummary {
            rows_loaded,
            rows_dropped_out_of_range: cleaned.stats.dropped_out_of_range,
            duplicates_removed: cleaned.stats.duplicates_removed,
            rows_written: cleaned.table.len(),
            category_count: cleaned.schema.len(),
            table_name,
        })
    }
}
