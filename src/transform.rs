//! Category expansion and row filtering.
//!
//! The packed `categories` field (`related-1;request-0;...`) is decoded into one integer
//! column per category. Category names come from the first row only and are applied
//! to every other row by position.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::{EncodingConfig, EtlConfig};
use crate::error::{EtlError, Result};
use crate::table::{row_fingerprint, Table, Value};

/// Largest category value a row may carry and still be kept.
pub const MAX_CATEGORY_VALUE: i64 = 1;

/// Ordered category names, derived once from the first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySchema {
    names: Vec<String>,
}

impl CategorySchema {
    /// Derive names from one packed field: each token's text before the first separator.
    pub fn from_field(field: &str, encoding: &EncodingConfig) -> Result<Self> {
        if field.is_empty() {
            return Err(EtlError::SchemaUnavailable(
                "first row has an empty categories field".to_string(),
            ));
        }
        let names: Vec<String> = field
            .split(encoding.token_delimiter)
            .map(|token| {
                token
                    .split_once(encoding.name_separator)
                    .map_or(token, |(name, _)| name)
                    .to_string()
            })
            .collect();

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(EtlError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Row counts observed while cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_in: usize,
    pub dropped_out_of_range: usize,
    pub duplicates_removed: usize,
    pub rows_out: usize,
}

#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub table: Table,
    pub schema: CategorySchema,
    pub stats: CleanStats,
}

/// Expand the categories column, drop out-of-range rows and remove duplicates.
pub fn clean_data(mut table: Table, config: &EtlConfig) -> Result<CleanOutput> {
    let rows_in = table.len();
    let column = &config.columns.categories;
    let cat_idx = table
        .column_index(column)
        .ok_or_else(|| EtlError::MissingColumn {
            table: "combined".to_string(),
            column: column.clone(),
        })?;

    let schema = match table.rows.first().map(|row| &row[cat_idx]) {
        None => {
            return Err(EtlError::SchemaUnavailable("input has no rows".to_string()));
        }
        Some(Value::Null) => {
            return Err(EtlError::SchemaUnavailable(
                "first row has no categories value".to_string(),
            ));
        }
        Some(field) => CategorySchema::from_field(&field.to_string(), &config.encoding)?,
    };
    debug!(categories = schema.len(), "Derived category names from first row");

    let packed = table.take_column(cat_idx);
    for name in schema.names() {
        if table.column_index(name).is_some() {
            return Err(EtlError::DuplicateColumn(name.clone()));
        }
    }

    // Decode everything before touching the table so a coercion failure leaves no output
    let decoded = packed
        .iter()
        .enumerate()
        .map(|(row, field)| decode_row(row, field, &schema, &config.encoding))
        .collect::<Result<Vec<_>>>()?;

    table.columns.extend(schema.names().iter().cloned());
    for (row, values) in table.rows.iter_mut().zip(decoded) {
        row.extend(values.into_iter().map(Value::Integer));
    }

    let stats = finalize_with_stats(&mut table, &schema, rows_in);
    info!(
        rows_in = stats.rows_in,
        dropped = stats.dropped_out_of_range,
        duplicates = stats.duplicates_removed,
        rows_out = stats.rows_out,
        "Cleaned data"
    );
    Ok(CleanOutput {
        table,
        schema,
        stats,
    })
}

/// Drop out-of-range rows and duplicates from a table that already has its category
/// columns. Applying it to its own output changes nothing.
pub fn finalize(mut table: Table, schema: &CategorySchema) -> Table {
    let rows_in = table.len();
    finalize_with_stats(&mut table, schema, rows_in);
    table
}

fn finalize_with_stats(table: &mut Table, schema: &CategorySchema, rows_in: usize) -> CleanStats {
    let cat_cols: Vec<usize> = schema
        .names()
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();

    let before = table.len();
    table.rows.retain(|row| {
        !cat_cols
            .iter()
            .any(|&c| matches!(row[c], Value::Integer(v) if v > MAX_CATEGORY_VALUE))
    });
    let dropped_out_of_range = before - table.len();
    if dropped_out_of_range > 0 {
        warn!(dropped_out_of_range, "Dropped rows with non-binary category values");
    }

    let duplicates_removed = drop_duplicates(table);

    CleanStats {
        rows_in,
        dropped_out_of_range,
        duplicates_removed,
        rows_out: table.len(),
    }
}

/// Remove exact duplicate rows, keeping the first occurrence. Returns how many went.
pub fn drop_duplicates(table: &mut Table) -> usize {
    let before = table.len();
    let mut seen = HashSet::with_capacity(before);
    table.rows.retain(|row| seen.insert(row_fingerprint(row)));
    before - table.len()
}

fn decode_row(
    row: usize,
    field: &Value,
    schema: &CategorySchema,
    encoding: &EncodingConfig,
) -> Result<Vec<i64>> {
    if field.is_null() {
        return Err(EtlError::TypeCoercion {
            row,
            column: schema.names().first().cloned().unwrap_or_default(),
            token: String::new(),
        });
    }
    // Numeric cells (a lone "1" read as an integer column) are decoded from their text
    let text = field.to_string();

    let tokens: Vec<&str> = text.split(encoding.token_delimiter).collect();
    if tokens.len() != schema.len() {
        return Err(EtlError::SchemaMismatch {
            row,
            expected: schema.len(),
            found: tokens.len(),
        });
    }

    tokens
        .iter()
        .zip(schema.names())
        .map(|(token, name)| {
            token
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .map(i64::from)
                .ok_or_else(|| EtlError::TypeCoercion {
                    row,
                    column: name.clone(),
                    token: token.to_string(),
                })
        })
        .collect()
}
