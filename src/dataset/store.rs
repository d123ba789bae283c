//! SQLite persistence for cleaned datasets.
//!
//! The dataset is written as one table with the columns
//! `id, message, original, genre` followed by one INTEGER 0/1 column per
//! category, in [`CategorySpec`] order. Saving replaces the table inside a
//! single transaction, so a failed run never leaves a partial table behind.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::dataset::{CategorySpec, Genre, LabelVector, LabeledDataset, LabeledRow, Message};
use crate::error::{ReliefError, Result};

/// Default table name for the cleaned dataset.
pub const DEFAULT_TABLE_NAME: &str = "Disaster-Response";

/// Leading columns that precede the category columns.
pub const MESSAGE_COLUMNS: [&str; 4] = ["id", "message", "original", "genre"];

/// A dataset table inside a SQLite database file.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    table: String,
}

impl DatasetStore {
    /// Create a store for the database at `path`, using the default table.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DatasetStore {
            path: path.as_ref().to_path_buf(),
            table: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    pub fn with_table<S: Into<String>>(mut self, table: S) -> Self {
        self.table = table.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Write the dataset, replacing any existing table of the same name.
    ///
    /// Returns the number of rows written.
    pub fn save(&self, dataset: &LabeledDataset) -> Result<usize> {
        let spec = dataset.spec();
        for name in spec.iter() {
            if MESSAGE_COLUMNS.contains(&name) {
                return Err(ReliefError::schema_mismatch(format!(
                    "category '{name}' collides with a message column"
                )));
            }
        }

        log::info!(
            "Saving {} rows to table '{}' in {}",
            dataset.len(),
            self.table,
            self.path.display()
        );

        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;
        let table = quote_identifier(&self.table);

        tx.execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;

        let category_columns: Vec<String> = spec
            .iter()
            .map(|name| format!("{} INTEGER NOT NULL", quote_identifier(name)))
            .collect();
        tx.execute(
            &format!(
                "CREATE TABLE {table} (id INTEGER NOT NULL, message TEXT NOT NULL, original TEXT, genre TEXT NOT NULL, {})",
                category_columns.join(", ")
            ),
            [],
        )?;

        {
            let placeholders = vec!["?"; MESSAGE_COLUMNS.len() + spec.len()].join(", ");
            let mut stmt = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
            for row in dataset.rows() {
                let mut values: Vec<Value> = Vec::with_capacity(MESSAGE_COLUMNS.len() + spec.len());
                values.push(Value::Integer(row.message.id));
                values.push(Value::Text(row.message.text.clone()));
                values.push(match &row.message.original {
                    Some(original) => Value::Text(original.clone()),
                    None => Value::Null,
                });
                values.push(Value::Text(row.message.genre.as_str().to_string()));
                values.extend(row.labels.values().iter().map(|&v| Value::Integer(v as i64)));
                stmt.execute(params_from_iter(values))?;
            }
        }

        tx.commit()?;
        Ok(dataset.len())
    }

    /// Read the dataset back in insertion order.
    pub fn load(&self) -> Result<LabeledDataset> {
        if !self.path.exists() {
            return Err(ReliefError::not_found(format!(
                "database {} does not exist",
                self.path.display()
            )));
        }

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        if !table_exists(&conn, &self.table)? {
            return Err(ReliefError::not_found(format!(
                "table '{}' not found in {}",
                self.table,
                self.path.display()
            )));
        }

        let table = quote_identifier(&self.table);
        let columns: Vec<String> = {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
            stmt.query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<_>>()?
        };

        if columns.len() <= MESSAGE_COLUMNS.len()
            || columns[..MESSAGE_COLUMNS.len()]
                .iter()
                .zip(MESSAGE_COLUMNS)
                .any(|(found, expected)| found != expected)
        {
            return Err(ReliefError::schema_mismatch(format!(
                "table '{}' does not start with columns {:?} followed by categories",
                self.table, MESSAGE_COLUMNS
            )));
        }
        let spec = CategorySpec::new(columns[MESSAGE_COLUMNS.len()..].iter().cloned())?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let text: String = row.get(1)?;
            let original: Option<String> = row.get(2)?;
            let genre: Genre = row.get::<_, String>(3)?.parse()?;

            let mut values = Vec::with_capacity(spec.len());
            for column in MESSAGE_COLUMNS.len()..columns.len() {
                let value: i64 = row.get(column)?;
                let value = u8::try_from(value).map_err(|_| {
                    ReliefError::parse(format!(
                        "message {id}: stored value {value} for '{}' is not binary",
                        columns[column]
                    ))
                })?;
                values.push(value);
            }

            records.push(LabeledRow {
                message: Message {
                    id,
                    text,
                    original,
                    genre,
                },
                labels: LabelVector::new(values)?,
            });
        }

        log::info!("Loaded {} rows from table '{}'", records.len(), self.table);
        LabeledDataset::new(spec, records)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
