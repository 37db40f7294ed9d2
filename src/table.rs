//! In-memory tabular data shared by every pipeline stage.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Value`]s. Cells read
//! from CSV are typed per column: a column whose non-empty cells all parse as integers
//! becomes an integer column, then reals, otherwise text. Empty cells and the usual
//! missing-value markers (`NaN`, `NA`, `NULL`, `N/A`, ...) are `Null`.

use sha2::{Digest, Sha256};
use std::fmt;

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text used to match join keys; `None` for nulls, which never match.
    pub fn join_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some((*f as i64).to_string())
            }
            Value::Real(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Feed a type-tagged encoding of this value into a hasher.
    fn hash_into(&self, hasher: &mut Sha256) {
        match self {
            Value::Null => hasher.update([0u8]),
            Value::Integer(i) => {
                hasher.update([1u8]);
                hasher.update(i.to_le_bytes());
            }
            Value::Real(f) => {
                hasher.update([2u8]);
                // -0.0 and 0.0 compare equal, so hash them equally
                let f = if *f == 0.0 { 0.0 } else { *f };
                hasher.update(f.to_bits().to_le_bytes());
            }
            Value::Text(s) => {
                hasher.update([3u8]);
                hasher.update((s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Storage class of a column, derived from its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_affinity(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw string cells, inferring each column's type.
    pub fn from_raw(columns: Vec<String>, raw_rows: Vec<Vec<String>>) -> Self {
        let types: Vec<ColumnType> = (0..columns.len())
            .map(|idx| infer_raw_type(raw_rows.iter().map(|r| r[idx].as_str())))
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|raw| {
                raw.into_iter()
                    .zip(&types)
                    .map(|(cell, ty)| parse_cell(cell, *ty))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Type of a column from its non-null values; all-null columns are text.
    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut ty: Option<ColumnType> = None;
        for row in &self.rows {
            let cell_ty = match &row[idx] {
                Value::Null => continue,
                Value::Integer(_) => ColumnType::Integer,
                Value::Real(_) => ColumnType::Real,
                Value::Text(_) => return ColumnType::Text,
            };
            ty = Some(match (ty, cell_ty) {
                (Some(ColumnType::Real), _) | (_, ColumnType::Real) => ColumnType::Real,
                _ => ColumnType::Integer,
            });
        }
        ty.unwrap_or(ColumnType::Text)
    }

    /// Remove a column by position, returning its values in row order.
    pub fn take_column(&mut self, idx: usize) -> Vec<Value> {
        self.columns.remove(idx);
        self.rows.iter_mut().map(|row| row.remove(idx)).collect()
    }
}

/// Hex SHA-256 over every cell of a row, used to detect exact duplicates.
pub fn row_fingerprint(row: &[Value]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((row.len() as u64).to_le_bytes());
    for value in row {
        value.hash_into(&mut hasher);
    }
    hex::encode(hasher.finalize())
}

/// Cell texts read as missing values, in any column.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

fn infer_raw_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut ty = ColumnType::Integer;
    let mut saw_value = false;
    for cell in cells {
        if is_missing(cell) {
            continue;
        }
        saw_value = true;
        if ty == ColumnType::Integer && cell.parse::<i64>().is_err() {
            ty = ColumnType::Real;
        }
        if ty == ColumnType::Real && cell.parse::<f64>().is_err() {
            return ColumnType::Text;
        }
    }
    if saw_value {
        ty
    } else {
        ColumnType::Text
    }
}

fn parse_cell(cell: String, ty: ColumnType) -> Value {
    if is_missing(&cell) {
        return Value::Null;
    }
    match ty {
        ColumnType::Integer => cell.parse().map(Value::Integer).unwrap_or(Value::Text(cell)),
        // SQLite stores NaN as NULL, so spellings outside NA_TOKENS ("NAN") are null too
        ColumnType::Real => match cell.parse::<f64>() {
            Ok(f) if f.is_nan() => Value::Null,
            Ok(f) => Value::Real(f),
            Err(_) => Value::Text(cell),
        },
        ColumnType::Text => Value::Text(cell),
    }
}
