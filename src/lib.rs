pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod table;
pub mod transform;

pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, PipelinePaths, RunSummary, Stage};
pub use table::{Table, Value};
