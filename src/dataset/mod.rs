//! Labeled message datasets.
//!
//! A [`LabeledDataset`] is the output of the ETL stage: every message paired
//! with a fixed-width binary [`LabelVector`] aligned to the dataset's
//! [`CategorySpec`]. The submodules cover each step of getting there:
//!
//! - [`loader`]: joins the raw message and category sources
//! - [`labels`]: expands packed category strings and cleans the result
//! - [`store`]: persists the cleaned dataset to SQLite
//! - [`summary`]: aggregate statistics for dashboards

pub mod labels;
pub mod loader;
pub mod store;
pub mod summary;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReliefError, Result};

pub use labels::LabelEncoder;
pub use loader::{DataLoader, JoinPolicy, RawRow, RawTable};
pub use store::DatasetStore;
pub use summary::DatasetSummary;

/// Source channel a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Direct,
    News,
    Social,
}

impl Genre {
    /// All genres in their canonical order.
    pub const ALL: [Genre; 3] = [Genre::Direct, Genre::News, Genre::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Direct => "direct",
            Genre::News => "news",
            Genre::Social => "social",
        }
    }
}

impl FromStr for Genre {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "direct" => Ok(Genre::Direct),
            "news" => Ok(Genre::News),
            "social" => Ok(Genre::Social),
            other => Err(ReliefError::parse(format!("unknown genre '{other}'"))),
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single disaster message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
    /// Text in its original language, when the message was translated.
    pub original: Option<String>,
    pub genre: Genre,
}

impl Message {
    pub fn new<S: Into<String>>(id: i64, text: S, genre: Genre) -> Self {
        Message {
            id,
            text: text.into(),
            original: None,
            genre,
        }
    }

    pub fn with_original<S: Into<String>>(mut self, original: S) -> Self {
        self.original = Some(original.into());
        self
    }
}

/// Ordered, fixed list of category names shared by every row of a dataset.
///
/// The position of a name in this list is the index used by label vectors,
/// store columns and per-category models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategorySpec {
    names: Vec<String>,
}

impl CategorySpec {
    /// Create a spec from category names. Names must be non-empty and unique.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ReliefError::schema_mismatch("category list is empty"));
        }
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ReliefError::schema_mismatch(format!(
                    "category at position {i} has an empty name"
                )));
            }
            if names[..i].contains(name) {
                return Err(ReliefError::schema_mismatch(format!(
                    "category '{name}' appears more than once"
                )));
            }
        }
        Ok(CategorySpec { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Check that `names` matches this spec exactly: same count, same names, same order.
    pub fn check_names<S: AsRef<str>>(&self, names: &[S], context: &str) -> Result<()> {
        if names.len() != self.names.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "{context}: expected {} categories, found {}",
                self.names.len(),
                names.len()
            )));
        }
        for (position, (expected, found)) in self.names.iter().zip(names).enumerate() {
            if expected != found.as_ref() {
                return Err(ReliefError::schema_mismatch(format!(
                    "{context}: expected category '{expected}' at position {position}, found '{}'",
                    found.as_ref()
                )));
            }
        }
        Ok(())
    }
}

/// Binary multi-label target, positionally aligned to a [`CategorySpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelVector(Vec<u8>);

impl LabelVector {
    /// Create a label vector. Every value must already be 0 or 1.
    pub fn new(values: Vec<u8>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|&&v| v > 1) {
            return Err(ReliefError::parse(format!(
                "label value {bad} is not binary"
            )));
        }
        Ok(LabelVector(values))
    }

    /// An all-zero vector of the given width.
    pub fn zeros(len: usize) -> Self {
        LabelVector(vec![0; len])
    }

    /// Map a raw source value to a binary label: 0 and 1 are kept, 2 becomes 1.
    ///
    /// Any other value is rejected. Applying the mapping to its own output
    /// returns the same value.
    pub fn normalize_value(raw: i64) -> Result<u8> {
        match raw {
            0 => Ok(0),
            1 | 2 => Ok(1),
            other => Err(ReliefError::parse(format!(
                "category value {other} is outside {{0, 1, 2}}"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    pub fn values(&self) -> &[u8] {
        &self.0
    }

    /// Number of positive labels.
    pub fn count_positive(&self) -> usize {
        self.0.iter().filter(|&&v| v == 1).count()
    }
}

/// A message together with its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub message: Message,
    pub labels: LabelVector,
}

/// Ordered collection of labeled messages plus the category spec they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledDataset {
    spec: CategorySpec,
    rows: Vec<LabeledRow>,
}

impl LabeledDataset {
    /// Create a dataset, checking that every label vector matches the category count.
    pub fn new(spec: CategorySpec, rows: Vec<LabeledRow>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.labels.len() != spec.len() {
                return Err(ReliefError::schema_mismatch(format!(
                    "row {i} (id {}) has {} labels, expected {}",
                    row.message.id,
                    row.labels.len(),
                    spec.len()
                )));
            }
        }
        Ok(LabeledDataset { spec, rows })
    }

    pub fn spec(&self) -> &CategorySpec {
        &self.spec
    }

    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.message.text.clone()).collect()
    }

    pub fn labels(&self) -> Vec<LabelVector> {
        self.rows.iter().map(|r| r.labels.clone()).collect()
    }

    /// Labels of one category across all rows.
    pub fn category_column(&self, index: usize) -> Vec<u8> {
        self.rows
            .iter()
            .map(|r| r.labels.get(index).unwrap_or(0))
            .collect()
    }

    pub fn into_rows(self) -> Vec<LabeledRow> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_parsing() {
        assert_eq!("direct".parse::<Genre>().unwrap(), Genre::Direct);
        assert_eq!("news".parse::<Genre>().unwrap(), Genre::News);
        assert_eq!("social".parse::<Genre>().unwrap(), Genre::Social);
        assert!(matches!(
            "email".parse::<Genre>(),
            Err(ReliefError::Parse(_))
        ));
        assert_eq!(Genre::Social.to_string(), "social");
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(LabelVector::normalize_value(0).unwrap(), 0);
        assert_eq!(LabelVector::normalize_value(1).unwrap(), 1);
        assert_eq!(LabelVector::normalize_value(2).unwrap(), 1);
        assert!(LabelVector::normalize_value(3).is_err());
        assert!(LabelVector::normalize_value(-1).is_err());

        for raw in [0, 1, 2] {
            let once = LabelVector::normalize_value(raw).unwrap();
            let twice = LabelVector::normalize_value(once as i64).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_label_vector_rejects_non_binary() {
        assert!(LabelVector::new(vec![0, 1, 1]).is_ok());
        assert!(LabelVector::new(vec![0, 2]).is_err());
        assert_eq!(LabelVector::new(vec![1, 0, 1]).unwrap().count_positive(), 2);
    }

    #[test]
    fn test_category_spec() {
        let spec = CategorySpec::new(["related", "request", "offer"]).unwrap();
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.index_of("offer"), Some(2));
        assert_eq!(spec.name(1), Some("request"));

        assert!(CategorySpec::new(Vec::<String>::new()).is_err());
        assert!(CategorySpec::new(["related", "related"]).is_err());

        assert!(spec.check_names(&["related", "request", "offer"], "row 1").is_ok());
        assert!(matches!(
            spec.check_names(&["request", "related", "offer"], "row 1"),
            Err(ReliefError::SchemaMismatch(_))
        ));
        assert!(spec.check_names(&["related", "request"], "row 1").is_err());
    }

    #[test]
    fn test_dataset_checks_width() {
        let spec = CategorySpec::new(["related", "request"]).unwrap();
        let row = LabeledRow {
            message: Message::new(1, "help", Genre::Direct),
            labels: LabelVector::new(vec![1]).unwrap(),
        };
        assert!(matches!(
            LabeledDataset::new(spec, vec![row]),
            Err(ReliefError::SchemaMismatch(_))
        ));
    }
}
