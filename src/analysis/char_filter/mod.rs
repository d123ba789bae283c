//! Char filter implementations for text normalization.
//!
//! Char filters rewrite the raw string before it reaches the tokenizer. The
//! message pipeline uses a single [`PatternReplaceCharFilter`] that turns every
//! character outside `[A-Za-z0-9]` into a space, so that punctuation separates
//! tokens instead of gluing them together.

/// Trait for character filters that transform text before tokenization.
pub trait CharFilter: Send + Sync {
    /// Apply this filter to the input text.
    fn filter(&self, input: &str) -> String;

    /// Get the name of this char filter.
    fn name(&self) -> &'static str;
}

pub mod pattern_replace;

pub use pattern_replace::PatternReplaceCharFilter;
