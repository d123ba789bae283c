//! Error types for the relief pipeline.
//!
//! All fallible operations in this crate return [`ReliefError`] through the
//! [`Result`] alias. The variants follow the data-integrity taxonomy of the
//! pipeline: schema drift between rows, unparseable category values, missing
//! join keys, unreadable sources and degenerate training targets.
//!
//! # Examples
//!
//! ```
//! use relief::error::{ReliefError, Result};
//!
//! fn check_width(width: usize) -> Result<()> {
//!     if width != 36 {
//!         return Err(ReliefError::schema_mismatch(format!("expected 36 columns, got {width}")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_width(35).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for relief operations.
#[derive(Error, Debug)]
pub enum ReliefError {
    /// I/O errors (unreadable sources, unwritable artifacts, missing stores).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Category names, ordering or count differ from the dataset's category spec.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A value that should be numeric (or otherwise well-formed) is not.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A join key or required column is absent.
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// A category is constant across the whole training partition.
    #[error(
        "Degenerate label: category '{category}' is constantly {value} across the training partition"
    )]
    DegenerateLabel { category: String, value: u8 },

    /// Text analysis errors (bad patterns, broken resources).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// CSV decoding errors from the raw sources.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Dataset store errors.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Artifact encoding/decoding errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration values out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not allowed in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation cancelled between two sub-fits.
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),
}

/// Result type alias for operations that may fail with ReliefError.
pub type Result<T> = std::result::Result<T, ReliefError>;

impl ReliefError {
    /// Create a new schema mismatch error.
    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        ReliefError::SchemaMismatch(msg.into())
    }

    /// Create a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        ReliefError::Parse(msg.into())
    }

    /// Create a new missing key error.
    pub fn missing_key<S: Into<String>>(msg: S) -> Self {
        ReliefError::MissingKey(msg.into())
    }

    /// Create a new degenerate label error.
    pub fn degenerate_label<S: Into<String>>(category: S, value: u8) -> Self {
        ReliefError::DegenerateLabel {
            category: category.into(),
            value,
        }
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        ReliefError::Analysis(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        ReliefError::Serialization(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        ReliefError::InvalidConfig(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        ReliefError::InvalidOperation(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        ReliefError::OperationCancelled(msg.into())
    }

    /// Create an I/O error of kind `NotFound`.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        ReliefError::Io(io::Error::new(io::ErrorKind::NotFound, msg.into()))
    }

    /// Whether this error originates from reading or writing a source.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ReliefError::Io(_) | ReliefError::Csv(_) | ReliefError::Sqlite(_)
        )
    }
}

impl From<bincode::Error> for ReliefError {
    fn from(err: bincode::Error) -> Self {
        ReliefError::Serialization(err.to_string())
    }
}
