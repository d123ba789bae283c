//! Core analyzer trait definition.
//!
//! Analyzers serve as the complete text processing pipeline:
//!
//! ```text
//! Raw Text → Char Filters → Tokenizer → Filter 1 → ... → Filter N → Tokens
//! ```
//!
//! # Examples
//!
//! ```
//! use relief::analysis::analyzer::analyzer::Analyzer;
//! use relief::analysis::analyzer::message::MessageAnalyzer;
//!
//! let analyzer = MessageAnalyzer::new().unwrap();
//! let tokens: Vec<_> = analyzer.analyze("Water is needed").unwrap().collect();
//!
//! assert_eq!(tokens[0].text, "water");
//! assert_eq!(tokens[1].text, "needed");
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for analyzers that convert text into processed tokens.
///
/// The trait requires `Send + Sync` so one analyzer can be shared by every
/// worker of a parallel grid search.
pub trait Analyzer: Send + Sync {
    /// Analyze the given text and return a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &'static str;

    /// Analyze `text` and keep only the token texts.
    fn token_texts(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.map(|token| token.text).collect())
    }
}
