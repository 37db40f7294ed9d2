use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::table::{Table, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Table name for a destination path: its final path segment.
pub fn table_name_for(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            EtlError::Config(format!(
                "destination '{}' has no final path segment",
                path.display()
            ))
        })
}

/// Quote an identifier for use in SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Write `table` into the SQLite file at `path`, replacing any table of the same name.
/// Returns the table name used.
pub fn save_data(table: &Table, path: &Path) -> Result<String> {
    let name = table_name_for(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EtlError::FileAccess {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut conn = Connection::open(path)?;
    write_table(&mut conn, &name, table)?;

    info!(table = %name, rows = table.len(), path = %path.display(), "Saved table");
    Ok(name)
}

/// Drop, recreate and fill `name` on an open connection.
pub fn write_table(conn: &mut Connection, name: &str, table: &Table) -> Result<()> {
    let ident = quote_ident(name);
    let column_defs = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            format!(
                "{} {}",
                quote_ident(col),
                table.column_type(idx).sql_affinity()
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {ident};\nCREATE TABLE {ident} ({column_defs});"
    ))?;

    if !table.columns.is_empty() {
        let placeholders = (1..=table.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = tx.prepare(&format!("INSERT INTO {ident} VALUES ({placeholders})"))?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;

    debug!(table = %name, columns = table.columns.len(), "Wrote table");
    Ok(())
}

/// Read a stored table back, columns in declaration order.
pub fn read_table(path: &Path, name: &str) -> Result<Table> {
    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut table = Table::new(columns);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(match row.get_ref(idx)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(i) => Value::Integer(i),
                ValueRef::Real(f) => Value::Real(f),
                ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
            });
        }
        table.rows.push(values);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Table {
        Table {
            columns: vec!["id".into(), "message".into(), "score".into(), "related".into()],
            rows: vec![
                vec![Value::Integer(1), "flood".into(), Value::Real(0.5), Value::Integer(1)],
                vec![Value::Integer(2), Value::Null, Value::Null, Value::Integer(0)],
            ],
        }
    }

    #[test]
    fn table_name_is_final_path_segment() {
        assert_eq!(
            table_name_for(Path::new("data/DisasterResponse.db")).unwrap(),
            "DisasterResponse.db"
        );
        assert_eq!(table_name_for(Path::new("out.db")).unwrap(), "out.db");
        assert!(table_name_for(Path::new("/")).is_err());
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn save_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("Disaster.db");

        let name = save_data(&sample(), &path).unwrap();
        assert_eq!(name, "Disaster.db");

        let back = read_table(&path, &name).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn saving_twice_replaces_the_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Disaster.db");

        save_data(&sample(), &path).unwrap();
        let mut smaller = sample();
        smaller.rows.truncate(1);
        save_data(&smaller, &path).unwrap();

        let back = read_table(&path, "Disaster.db").unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back, smaller);
    }

    #[test]
    fn column_affinity_follows_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("types.db");
        save_data(&sample(), &path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info('types.db') ORDER BY cid")
            .unwrap();
        let decl: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(
            decl,
            vec![
                ("id".to_string(), "INTEGER".to_string()),
                ("message".to_string(), "TEXT".to_string()),
                ("score".to_string(), "REAL".to_string()),
                ("related".to_string(), "INTEGER".to_string()),
            ]
        );
    }

    #[test]
    fn uncreatable_parent_directory_is_a_file_access_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = save_data(&sample(), &blocker.join("Disaster.db")).unwrap_err();
        assert!(matches!(err, EtlError::FileAccess { ref path, .. } if path == &blocker));
    }

    #[test]
    fn unwritable_destination_is_a_storage_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a database file
        let err = save_data(&sample(), dir.path()).unwrap_err();
        assert!(matches!(err, EtlError::Storage(_)));
    }
}
