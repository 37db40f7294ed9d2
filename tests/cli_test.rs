use anyhow::Result;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

use disaster_etl::store::read_table;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_disaster_etl"))
}

#[test]
fn wrong_argument_count_prints_usage_and_does_nothing() -> Result<()> {
    let dir = tempdir()?;
    let output = bin()
        .current_dir(dir.path())
        .args(["messages.csv", "categories.csv"])
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Please provide the filepaths"));
    assert_eq!(fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn full_run_writes_database_and_reports_progress() -> Result<()> {
    let dir = tempdir()?;
    let messages = dir.path().join("messages.csv");
    let categories = dir.path().join("categories.csv");
    let database = dir.path().join("DisasterResponse.db");
    let config = dir.path().join("etl.toml");
    fs::write(&messages, "id,message\n1,flood\n2,fire\n")?;
    fs::write(
        &categories,
        "id,categories\n1,related-1;request-0\n2,related-0;request-1\n",
    )?;
    fs::write(
        &config,
        format!(
            "[logging]\ndirectory = {:?}\n",
            dir.path().join("logs").display().to_string()
        ),
    )?;

    let output = bin()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg(&messages)
        .arg(&categories)
        .arg(&database)
        .env_remove("ETL_CONFIG")
        .output()?;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Loading data..."));
    assert!(stdout.contains("Cleaning data..."));
    assert!(stdout.contains("Saving data..."));
    assert!(stdout.contains("Cleaned data saved to database!"));

    let stored = read_table(&database, "DisasterResponse.db")?;
    assert_eq!(stored.columns, vec!["id", "message", "related", "request"]);
    assert_eq!(stored.len(), 2);
    Ok(())
}

#[test]
fn failed_run_exits_non_zero() -> Result<()> {
    let dir = tempdir()?;
    let config = dir.path().join("etl.toml");
    fs::write(
        &config,
        format!(
            "[logging]\ndirectory = {:?}\n",
            dir.path().join("logs").display().to_string()
        ),
    )?;

    let output = bin()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["missing_messages.csv", "missing_categories.csv", "out.db"])
        .output()?;

    assert!(!output.status.success());
    assert!(!dir.path().join("out.db").exists());
    Ok(())
}

#[test]
fn file_named_logs_does_not_block_the_run() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("logs"), "not a directory")?;
    fs::write(dir.path().join("m.csv"), "id,message\n1,flood\n")?;
    fs::write(dir.path().join("c.csv"), "id,categories\n1,related-1;request-0\n")?;

    let output = bin()
        .current_dir(dir.path())
        .env_remove("ETL_CONFIG")
        .args(["m.csv", "c.csv", "out.db"])
        .output()?;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File logging disabled"), "stderr: {stderr}");
    assert_eq!(read_table(&dir.path().join("out.db"), "out.db")?.len(), 1);
    Ok(())
}

#[test]
fn metrics_textfile_is_written_when_configured() -> Result<()> {
    let dir = tempdir()?;
    let prom = dir.path().join("metrics").join("etl.prom");
    let config = dir.path().join("etl.toml");
    fs::write(dir.path().join("m.csv"), "id,message\n1,flood\n2,fire\n2,fire\n")?;
    fs::write(
        dir.path().join("c.csv"),
        "id,categories\n1,related-1;request-0\n2,related-0;request-1\n",
    )?;
    fs::write(
        &config,
        format!(
            "[logging]\ndirectory = {:?}\n\n[metrics]\ntextfile = {:?}\n",
            dir.path().join("logs").display().to_string(),
            prom.display().to_string()
        ),
    )?;

    let output = bin()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["m.csv", "c.csv", "out.db"])
        .output()?;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let text = fs::read_to_string(&prom)?;
    assert!(text.contains("etl_load_rows_total 3"), "{text}");
    assert!(text.contains("etl_clean_duplicates_removed_total 1"), "{text}");
    assert!(text.contains("etl_save_rows_written_total 2"), "{text}");
    Ok(())
}
