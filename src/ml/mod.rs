//! Model training, evaluation and persistence.
//!
//! This module turns a labeled dataset into a multi-label classifier:
//! TF-IDF features, one linear SVM per category, hyperparameters chosen by
//! cross-validated grid search, and a versioned binary artifact.

pub mod classifier;
pub mod cross_validation;
pub mod evaluation;
pub mod grid_search;
pub mod persist;
pub mod sparse;
pub mod stage;
pub mod svm;
pub mod tfidf;
pub mod trainer;

pub use classifier::*;
pub use cross_validation::*;
pub use evaluation::*;
pub use grid_search::*;
pub use persist::*;
pub use sparse::*;
pub use stage::*;
pub use svm::*;
pub use tfidf::*;
pub use trainer::*;
