//! Text analysis for disaster messages.
//!
//! This module provides tokenization, token filtering and the analysis
//! pipeline that turns a raw message into the token sequence the feature
//! extractor consumes. The building blocks follow the usual
//! char filter → tokenizer → token filter layout so each step can be tested
//! on its own.

pub mod analyzer;
pub mod char_filter;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

// Re-export commonly used types
pub use analyzer::*;
pub use token::*;
pub use token_filter::*;
pub use tokenizer::*;
