//! # Relief
//!
//! Multi-label triage of disaster-response messages.
//!
//! ## Features
//!
//! - CSV ingestion joining messages with packed category labels
//! - Label expansion, validation and de-duplication
//! - SQLite persistence of the cleaned dataset
//! - Deterministic message tokenization with lemmatization
//! - TF-IDF features and one linear SVM per category
//! - Cross-validated grid search on a thread pool, cancellable and resumable
//! - Per-category and averaged evaluation metrics
//! - Versioned, checksummed model artifacts

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
