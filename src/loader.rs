use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::table::{Table, Value};

/// Suffixes appended to non-key columns that appear in both inputs.
const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Read a headed, comma-separated file into a typed table.
pub fn read_csv_table(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|source| EtlError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| EtlError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut raw_rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(parse_err)?;
        raw_rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    debug!(path = %path.display(), columns = headers.len(), rows = raw_rows.len(), "Read CSV");
    Ok(Table::from_raw(headers, raw_rows))
}

/// Read both inputs and left-join categories onto messages by the id column.
pub fn load_data(messages_path: &Path, categories_path: &Path, config: &EtlConfig) -> Result<Table> {
    let messages = read_csv_table(messages_path)?;
    let categories = read_csv_table(categories_path)?;
    info!(
        messages = messages.len(),
        categories = categories.len(),
        "Loaded input files"
    );
    left_join(&messages, &categories, &config.columns.id)
}

/// Left join on `key`.
///
/// Every left row is kept; a left row with several matches is repeated once per match
/// in right-table order, and one with no match gets nulls for the right-side columns.
pub fn left_join(left: &Table, right: &Table, key: &str) -> Result<Table> {
    let left_key = left.column_index(key).ok_or_else(|| EtlError::MissingColumn {
        table: "messages".to_string(),
        column: key.to_string(),
    })?;
    let right_key = right.column_index(key).ok_or_else(|| EtlError::MissingColumn {
        table: "categories".to_string(),
        column: key.to_string(),
    })?;

    let right_cols: Vec<usize> = (0..right.columns.len()).filter(|&i| i != right_key).collect();
    let columns = joined_columns(left, right, key, &right_cols);

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows.iter().enumerate() {
        if let Some(k) = row[right_key].join_key() {
            index.entry(k).or_default().push(row_idx);
        }
    }

    let mut joined = Table::new(columns);
    let mut unmatched = 0usize;
    for row in &left.rows {
        let matches = row[left_key]
            .join_key()
            .and_then(|k| index.get(&k))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if matches.is_empty() {
            unmatched += 1;
            let mut out = row.clone();
            out.extend(right_cols.iter().map(|_| Value::Null));
            joined.rows.push(out);
            continue;
        }
        for &right_idx in matches {
            let mut out = row.clone();
            out.extend(right_cols.iter().map(|&c| right.rows[right_idx][c].clone()));
            joined.rows.push(out);
        }
    }

    if unmatched > 0 {
        warn!(unmatched, "Messages without a matching categories row");
    }
    debug!(rows = joined.len(), columns = joined.columns.len(), "Joined tables");
    Ok(joined)
}

fn joined_columns(left: &Table, right: &Table, key: &str, right_cols: &[usize]) -> Vec<String> {
    let left_names: HashSet<&str> = left.columns.iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right_cols.iter().map(|&i| right.columns[i].as_str()).collect();

    let mut columns: Vec<String> = left
        .columns
        .iter()
        .map(|c| {
            if c != key && right_names.contains(c.as_str()) {
                format!("{c}{LEFT_SUFFIX}")
            } else {
                c.clone()
            }
        })
        .collect();
    columns.extend(right_cols.iter().map(|&i| {
        let c = &right.columns[i];
        if left_names.contains(c.as_str()) {
            format!("{c}{RIGHT_SUFFIX}")
        } else {
            c.clone()
        }
    }));
    columns
}
