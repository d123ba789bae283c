//! Lemmatizing token filter and lemmatizer implementations.

use super::Filter;
use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for lemmatization algorithms.
///
/// Implementations must be pure functions of their input and their static
/// resources: the same word always maps to the same lemma.
pub trait Lemmatizer: Send + Sync {
    /// Reduce a word to its dictionary base form.
    fn lemmatize(&self, word: &str) -> String;

    /// Get the name of this lemmatizer.
    fn name(&self) -> &'static str;

    /// Feed every resource the lemmatizer depends on into `hasher`.
    fn update_digest(&self, hasher: &mut crc32fast::Hasher);
}

pub mod english;

pub use english::EnglishLemmatizer;

/// Filter that replaces each token with its lemma.
pub struct LemmaFilter {
    lemmatizer: Box<dyn Lemmatizer>,
}

impl std::fmt::Debug for LemmaFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LemmaFilter")
            .field("lemmatizer", &self.lemmatizer.name())
            .finish()
    }
}

impl LemmaFilter {
    /// Create a new lemma filter with the English noun lemmatizer.
    pub fn new() -> Self {
        LemmaFilter {
            lemmatizer: Box::new(EnglishLemmatizer::new()),
        }
    }

    /// Create a lemma filter with a custom lemmatizer.
    pub fn with_lemmatizer(lemmatizer: Box<dyn Lemmatizer>) -> Self {
        LemmaFilter { lemmatizer }
    }

    /// The lemmatizer backing this filter.
    pub fn lemmatizer(&self) -> &dyn Lemmatizer {
        self.lemmatizer.as_ref()
    }
}

impl Default for LemmaFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for LemmaFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let filtered_tokens = tokens
            .map(|token| {
                if token.is_stopped() {
                    token
                } else {
                    let lemma = self.lemmatizer.lemmatize(&token.text);
                    token.with_text(lemma)
                }
            })
            .collect::<Vec<_>>();

        Ok(Box::new(filtered_tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "lemma"
    }
}
