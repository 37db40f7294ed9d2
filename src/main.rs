use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use disaster_etl::config::EtlConfig;
use disaster_etl::pipeline::{Pipeline, PipelinePaths, Stage};
use disaster_etl::{logging, metrics};

const USAGE: &str = "Please provide the filepaths of the messages and categories \
datasets as the first and second argument respectively, as \
well as the filepath of the database to save the cleaned data \
to as the third argument. \n\nExample: disaster_etl \
disaster_messages.csv disaster_categories.csv \
DisasterResponse.db";

#[derive(Parser)]
#[command(name = "disaster_etl")]
#[command(about = "Merge disaster messages with their categories and store them in SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// MESSAGES.csv CATEGORIES.csv DATABASE.db
    #[arg(value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// Config file (defaults to $ETL_CONFIG, then ./etl.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let [messages, categories, database] = match <[PathBuf; 3]>::try_from(cli.paths) {
        Ok(paths) => paths,
        Err(_) => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let config = EtlConfig::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging);
    let metrics_handle = config
        .metrics
        .textfile
        .as_ref()
        .and_then(|_| metrics::install_recorder());
    let metrics_textfile = config.metrics.textfile.clone();

    let paths = PipelinePaths {
        messages,
        categories,
        database,
    };
    let progress = |stage: Stage| match stage {
        Stage::Load => println!(
            "Loading data...\n    MESSAGES: {}\n    CATEGORIES: {}",
            paths.messages.display(),
            paths.categories.display()
        ),
        Stage::Clean => println!("Cleaning data..."),
        Stage::Save => println!("Saving data...\n    DATABASE: {}", paths.database.display()),
    };

    let outcome = Pipeline::new(config).run_with_progress(&paths, progress);

    if let (Some(handle), Some(path)) = (&metrics_handle, &metrics_textfile) {
        if let Err(e) = metrics::write_textfile(handle, path) {
            error!("Failed to write metrics textfile: {}", e);
        }
    }

    match outcome {
        Ok(summary) => {
            info!(?summary, "Pipeline finished");
            println!("Cleaned data saved to database!");
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
