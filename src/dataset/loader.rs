//! Raw source loading.
//!
//! Reads the two CSV sources of the ETL stage and joins categories onto
//! messages by `id`:
//!
//! ```csv
//! id,message,original,genre
//! 2,Weather update - a cold front from Cuba,Un front froid se retrouve sur Cuba,direct
//! ```
//!
//! ```csv
//! id,categories
//! 2,related-1;request-0;offer-0;...
//! ```
//!
//! With the default [`JoinPolicy::Left`] every message is kept; a message
//! without a matching category row carries `None`, and label encoding later
//! rejects it with `MissingKey`. [`JoinPolicy::Inner`] drops such messages
//! here instead. A category id that occurs
//! more than once yields one joined row per occurrence.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ahash::AHashMap;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{ReliefError, Result};

/// How messages without a category row are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Keep every message; unmatched ones have no categories.
    #[default]
    Left,
    /// Drop messages that have no category row.
    Inner,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    id: i64,
    message: String,
    #[serde(default)]
    original: Option<String>,
    genre: String,
}

#[derive(Debug, Deserialize)]
struct CategoryRecord {
    id: i64,
    categories: String,
}

/// One row of the joined raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub id: i64,
    pub message: String,
    pub original: Option<String>,
    pub genre: String,
    /// Packed `name-value;name-value;...` string, absent after an unmatched left join.
    pub categories: Option<String>,
}

/// The joined raw table, in message source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRow>) -> Self {
        RawTable { rows }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Loads and joins the raw message and category sources.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    policy: JoinPolicy,
}

impl DataLoader {
    /// Create a loader with the default left join.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: JoinPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    /// Load and join the two CSV files.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        messages_path: P,
        categories_path: Q,
    ) -> Result<RawTable> {
        let messages_path = messages_path.as_ref();
        let categories_path = categories_path.as_ref();
        log::info!(
            "Loading messages from {} and categories from {}",
            messages_path.display(),
            categories_path.display()
        );

        let messages = File::open(messages_path).map_err(|e| {
            ReliefError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open messages source {}: {e}", messages_path.display()),
            ))
        })?;
        let categories = File::open(categories_path).map_err(|e| {
            ReliefError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "cannot open categories source {}: {e}",
                    categories_path.display()
                ),
            ))
        })?;

        self.load_from_readers(messages, categories)
    }

    /// Load and join two CSV sources from arbitrary readers.
    pub fn load_from_readers<M: Read, C: Read>(&self, messages: M, categories: C) -> Result<RawTable> {
        let messages: Vec<MessageRecord> =
            read_records(messages, "messages", &["id", "message", "genre"])?;
        let categories: Vec<CategoryRecord> =
            read_records(categories, "categories", &["id", "categories"])?;

        let mut by_id: AHashMap<i64, Vec<String>> = AHashMap::with_capacity(categories.len());
        for record in categories {
            by_id.entry(record.id).or_default().push(record.categories);
        }

        let mut rows = Vec::with_capacity(messages.len());
        let mut unmatched = 0usize;
        for message in messages {
            match by_id.get(&message.id) {
                Some(matches) => {
                    for categories in matches {
                        rows.push(RawRow {
                            id: message.id,
                            message: message.message.clone(),
                            original: message.original.clone(),
                            genre: message.genre.clone(),
                            categories: Some(categories.clone()),
                        });
                    }
                }
                None => {
                    unmatched += 1;
                    if self.policy == JoinPolicy::Left {
                        rows.push(RawRow {
                            id: message.id,
                            message: message.message,
                            original: message.original,
                            genre: message.genre,
                            categories: None,
                        });
                    }
                }
            }
        }

        if unmatched > 0 {
            match self.policy {
                JoinPolicy::Left => log::warn!("{unmatched} messages have no category row"),
                JoinPolicy::Inner => {
                    log::warn!("Dropped {unmatched} messages without a category row")
                }
            }
        }
        log::info!("Joined raw table has {} rows", rows.len());

        Ok(RawTable::new(rows))
    }
}

fn read_records<R, T>(reader: R, source: &str, required: &[&str]) -> Result<Vec<T>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(ReliefError::missing_key(format!(
                "{source} source has no '{column}' column"
            )));
        }
    }

    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    log::debug!("Read {} records from the {source} source", records.len());
    Ok(records)
}
