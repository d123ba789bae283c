//! TF-IDF vectorizer for message features.
//!
//! The vectorizer works on token sequences produced by the message analyzer.
//! Fitting builds a frozen [`Vocabulary`] of token n-grams with their inverse
//! document frequencies; transforming maps a token sequence to an
//! L2-normalized sparse vector of `count * idf` weights.
//!
//! Vocabulary indices follow the lexicographic order of the terms, and
//! n-grams are joined with a single space, so the same training corpus always
//! yields the same feature space.
//!
//! # Examples
//!
//! ```
//! use relief::ml::tfidf::{NgramRange, TfIdfVectorizer, VectorizerConfig};
//!
//! let docs = vec![
//!     vec!["water".to_string(), "need".to_string()],
//!     vec!["food".to_string(), "need".to_string()],
//! ];
//!
//! let mut vectorizer = TfIdfVectorizer::new(VectorizerConfig::new(NgramRange::new(1, 2).unwrap()));
//! vectorizer.fit(&docs).unwrap();
//!
//! let vocabulary = vectorizer.vocabulary().unwrap();
//! assert_eq!(vocabulary.index_of("food"), Some(0));
//! assert_eq!(vocabulary.index_of("water need"), Some(4));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{ReliefError, Result};
use crate::ml::sparse::SparseVector;

/// Inclusive range of n-gram lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(usize, usize)", into = "(usize, usize)")]
pub struct NgramRange {
    min_n: usize,
    max_n: usize,
}

impl NgramRange {
    pub fn new(min_n: usize, max_n: usize) -> Result<Self> {
        if min_n == 0 || min_n > max_n {
            return Err(ReliefError::invalid_config(format!(
                "invalid n-gram range ({min_n}, {max_n})"
            )));
        }
        Ok(NgramRange { min_n, max_n })
    }

    pub fn unigrams() -> Self {
        NgramRange { min_n: 1, max_n: 1 }
    }

    /// Unigrams and bigrams.
    pub fn up_to_bigrams() -> Self {
        NgramRange { min_n: 1, max_n: 2 }
    }

    pub fn min_n(&self) -> usize {
        self.min_n
    }

    pub fn max_n(&self) -> usize {
        self.max_n
    }
}

impl Default for NgramRange {
    fn default() -> Self {
        Self::unigrams()
    }
}

impl TryFrom<(usize, usize)> for NgramRange {
    type Error = ReliefError;

    fn try_from((min_n, max_n): (usize, usize)) -> Result<Self> {
        NgramRange::new(min_n, max_n)
    }
}

impl From<NgramRange> for (usize, usize) {
    fn from(range: NgramRange) -> Self {
        (range.min_n, range.max_n)
    }
}

impl fmt::Display for NgramRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.min_n, self.max_n)
    }
}

/// All contiguous token windows with lengths in `range`, shortest first.
pub fn ngrams(tokens: &[String], range: NgramRange) -> Vec<String> {
    let mut grams = Vec::new();
    for n in range.min_n..=range.max_n {
        if n > tokens.len() {
            break;
        }
        grams.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    grams
}

/// Vectorizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    pub ngram_range: NgramRange,
    /// Terms that occur in fewer documents are dropped from the vocabulary.
    pub min_df: usize,
}

impl VectorizerConfig {
    pub fn new(ngram_range: NgramRange) -> Self {
        VectorizerConfig {
            ngram_range,
            min_df: 1,
        }
    }

    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self::new(NgramRange::unigrams())
    }
}

/// Frozen term index and idf weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: BTreeMap<String, usize>,
    idf: Vec<f64>,
    n_documents: usize,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.get(term).copied()
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Terms in index order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }
}

/// TF-IDF vectorizer over token sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfVectorizer {
    config: VectorizerConfig,
    vocabulary: Option<Vocabulary>,
}

impl TfIdfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        TfIdfVectorizer {
            config,
            vocabulary: None,
        }
    }

    /// Rebuild a fitted vectorizer from its parts.
    pub fn from_parts(config: VectorizerConfig, vocabulary: Vocabulary) -> Result<Self> {
        if vocabulary.idf.len() != vocabulary.terms.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "vocabulary has {} terms but {} idf weights",
                vocabulary.terms.len(),
                vocabulary.idf.len()
            )));
        }
        Ok(TfIdfVectorizer {
            config,
            vocabulary: Some(vocabulary),
        })
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }

    /// Number of features produced by [`transform`](Self::transform).
    pub fn n_features(&self) -> usize {
        self.vocabulary.as_ref().map_or(0, Vocabulary::len)
    }

    /// Build the vocabulary and idf weights from a training corpus.
    pub fn fit(&mut self, documents: &[Vec<String>]) -> Result<()> {
        if documents.is_empty() {
            return Err(ReliefError::invalid_operation(
                "cannot fit a vectorizer on an empty corpus",
            ));
        }

        let mut document_frequency: AHashMap<String, usize> = AHashMap::new();
        for tokens in documents {
            let grams = ngrams(tokens, self.config.ngram_range);
            let unique: AHashSet<String> = grams.into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let min_df = self.config.min_df.max(1);
        let kept: BTreeMap<String, usize> = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .collect();

        if kept.is_empty() {
            return Err(ReliefError::invalid_operation(
                "empty vocabulary: no term survives tokenization and pruning",
            ));
        }

        let n = documents.len() as f64;
        let mut terms = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (index, (term, df)) in kept.into_iter().enumerate() {
            // Smoothed idf, as if one extra document contained every term.
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            terms.insert(term, index);
        }

        log::debug!(
            "Fitted vocabulary of {} terms over {} documents (ngram range {})",
            terms.len(),
            documents.len(),
            self.config.ngram_range
        );

        self.vocabulary = Some(Vocabulary {
            terms,
            idf,
            n_documents: documents.len(),
        });
        Ok(())
    }

    /// Map one token sequence to its TF-IDF row. Unknown terms are ignored.
    pub fn transform_tokens(&self, tokens: &[String]) -> Result<SparseVector> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| ReliefError::invalid_operation("vectorizer is not fitted"))?;

        let mut counts: AHashMap<usize, f64> = AHashMap::new();
        for gram in ngrams(tokens, self.config.ngram_range) {
            if let Some(index) = vocabulary.index_of(&gram) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut row = SparseVector::from_pairs(
            counts
                .into_iter()
                .map(|(index, count)| (index, count * vocabulary.idf[index]))
                .collect(),
        );
        row.l2_normalize();
        Ok(row)
    }

    /// Transform a batch of token sequences.
    pub fn transform(&self, documents: &[Vec<String>]) -> Result<Vec<SparseVector>> {
        documents
            .iter()
            .map(|tokens| self.transform_tokens(tokens))
            .collect()
    }

    pub fn fit_transform(&mut self, documents: &[Vec<String>]) -> Result<Vec<SparseVector>> {
        self.fit(documents)?;
        self.transform(documents)
    }
}
