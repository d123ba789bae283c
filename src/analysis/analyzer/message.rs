//! Analyzer for disaster messages.
//!
//! This is the fixed text-to-token contract shared by training and serving:
//! characters outside `[A-Za-z0-9]` become spaces, the text is split on word
//! boundaries and lowercased, each token is reduced to its noun lemma, and
//! English stop words are dropped.
//!
//! The analyzer exposes a [`fingerprint`](MessageAnalyzer::fingerprint) over
//! every resource it depends on. A trained artifact records it, and loading an
//! artifact produced by a different analyzer is refused.
//!
//! # Examples
//!
//! ```
//! use relief::analysis::analyzer::message::MessageAnalyzer;
//!
//! let analyzer = MessageAnalyzer::new().unwrap();
//! let tokens = analyzer.tokenize("We need tents and blankets!").unwrap();
//!
//! assert_eq!(tokens, vec!["need", "tent", "blanket"]);
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::char_filter::pattern_replace::PatternReplaceCharFilter;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::lemma::english::EnglishLemmatizer;
use crate::analysis::token_filter::lemma::{LemmaFilter, Lemmatizer};
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::tokenizer::Tokenizer;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::error::Result;

/// Characters that survive the char filter.
pub const NON_ALPHANUMERIC_PATTERN: &str = "[^a-zA-Z0-9]";

/// The message analyzer: normalize, split, lemmatize, remove stop words.
#[derive(Clone)]
pub struct MessageAnalyzer {
    inner: PipelineAnalyzer,
    fingerprint: u32,
}

impl MessageAnalyzer {
    /// Build the analyzer with its default resources.
    pub fn new() -> Result<Self> {
        let char_filter = PatternReplaceCharFilter::new(NON_ALPHANUMERIC_PATTERN, " ")?;
        let tokenizer = UnicodeWordTokenizer::new();
        let lemmatizer = EnglishLemmatizer::new();
        let stop_filter = StopFilter::new();

        let fingerprint = Self::compute_fingerprint(&char_filter, &tokenizer, &lemmatizer, &stop_filter);

        let inner = PipelineAnalyzer::new(Arc::new(tokenizer))
            .add_char_filter(Arc::new(char_filter))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .add_filter(Arc::new(LemmaFilter::with_lemmatizer(Box::new(lemmatizer))))
            .add_filter(Arc::new(stop_filter))
            .with_name("message");

        Ok(MessageAnalyzer { inner, fingerprint })
    }

    fn compute_fingerprint(
        char_filter: &PatternReplaceCharFilter,
        tokenizer: &UnicodeWordTokenizer,
        lemmatizer: &EnglishLemmatizer,
        stop_filter: &StopFilter,
    ) -> u32 {
        let mut hasher = crc32fast::Hasher::new();

        hasher.update(char_filter.pattern().as_bytes());
        hasher.update(b"\0");
        hasher.update(char_filter.replacement().as_bytes());
        hasher.update(b"\0");
        hasher.update(tokenizer.name().as_bytes());
        hasher.update(b"\0");
        hasher.update(lemmatizer.name().as_bytes());
        lemmatizer.update_digest(&mut hasher);
        hasher.update(b"\0");
        for word in stop_filter.sorted_words() {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }

        hasher.finalize()
    }

    /// Tokenize a message into its final token texts.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        self.token_texts(text)
    }

    /// CRC32 over the pattern, tokenizer, lemmatizer resources and stop list.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &PipelineAnalyzer {
        &self.inner
    }
}

impl Analyzer for MessageAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "message"
    }
}

impl std::fmt::Debug for MessageAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageAnalyzer")
            .field("pipeline", &self.inner)
            .field("fingerprint", &format_args!("{:08x}", self.fingerprint))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_is_needed() {
        let analyzer = MessageAnalyzer::new().unwrap();
        assert_eq!(analyzer.tokenize("Water is needed").unwrap(), vec!["water", "needed"]);
    }

    #[test]
    fn test_punctuation_and_case() {
        let analyzer = MessageAnalyzer::new().unwrap();
        let tokens = analyzer
            .tokenize("URGENT!!! Food/water for 200 FAMILIES in Jacmel...")
            .unwrap();
        assert_eq!(tokens, vec!["urgent", "food", "water", "200", "family", "jacmel"]);
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        let analyzer = MessageAnalyzer::new().unwrap();
        assert!(analyzer.tokenize("").unwrap().is_empty());
        assert!(analyzer.tokenize("?!... ###").unwrap().is_empty());
        assert!(analyzer.tokenize("the and of").unwrap().is_empty());
    }

    #[test]
    fn test_apostrophes_split_words() {
        let analyzer = MessageAnalyzer::new().unwrap();
        // "don't" becomes "don t", both of which are stop words.
        assert_eq!(analyzer.tokenize("don't panic").unwrap(), vec!["panic"]);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let text = "People are trapped under houses after the earthquake, send rescue teams";
        let a = MessageAnalyzer::new().unwrap();
        let b = MessageAnalyzer::new().unwrap();

        let first = a.tokenize(text).unwrap();
        assert_eq!(first, a.tokenize(text).unwrap());
        assert_eq!(first, b.tokenize(text).unwrap());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_positions_are_contiguous_before_stop_removal() {
        let analyzer = MessageAnalyzer::new().unwrap();
        let tokens: Vec<_> = analyzer.analyze("water and food").unwrap().collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 2);
    }
}
