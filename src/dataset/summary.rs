//! Aggregate statistics over a labeled dataset.
//!
//! These are the figures a dashboard shows next to the classifier: how
//! messages split across genres, how often each category is positive, and the
//! most frequent non-stopword words.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::token_filter::stop::DEFAULT_ENGLISH_STOP_WORDS_SET;
use crate::dataset::{Genre, LabeledDataset};

/// Number of words kept in [`DatasetSummary::top_words`] by default.
pub const DEFAULT_TOP_WORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCount {
    pub genre: Genre,
    pub count: usize,
    /// Share of all messages, in percent, rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Dashboard statistics for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_messages: usize,
    /// Genres present in the dataset, in canonical order.
    pub genres: Vec<GenreCount>,
    /// Positive counts per category, most frequent first, ties by name.
    pub categories: Vec<CategoryCount>,
    /// Most frequent words, most frequent first, ties by word.
    pub top_words: Vec<WordCount>,
}

impl DatasetSummary {
    /// Summarize a dataset, keeping the default number of top words.
    pub fn from_dataset(dataset: &LabeledDataset) -> Self {
        Self::with_top_words(dataset, DEFAULT_TOP_WORDS)
    }

    /// Summarize a dataset, keeping `top_n` words.
    pub fn with_top_words(dataset: &LabeledDataset, top_n: usize) -> Self {
        let total = dataset.len();

        let mut genre_counts: BTreeMap<Genre, usize> = BTreeMap::new();
        for row in dataset.rows() {
            *genre_counts.entry(row.message.genre).or_insert(0) += 1;
        }
        let genres = genre_counts
            .into_iter()
            .map(|(genre, count)| GenreCount {
                genre,
                count,
                percentage: percentage(count, total),
            })
            .collect();

        let mut categories: Vec<CategoryCount> = dataset
            .spec()
            .iter()
            .enumerate()
            .map(|(index, name)| CategoryCount {
                name: name.to_string(),
                count: dataset
                    .rows()
                    .iter()
                    .filter(|row| row.labels.get(index) == Some(1))
                    .count(),
            })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        Self {
            total_messages: total,
            genres,
            categories,
            top_words: top_words(dataset, top_n),
        }
    }

    pub fn genre_count(&self, genre: Genre) -> usize {
        self.genres
            .iter()
            .find(|g| g.genre == genre)
            .map_or(0, |g| g.count)
    }

    pub fn category_count(&self, name: &str) -> Option<usize> {
        self.categories.iter().find(|c| c.name == name).map(|c| c.count)
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (10_000.0 * count as f64 / total as f64).round() / 100.0
}

/// Lowercase, split on whitespace, drop stop words, count.
fn top_words(dataset: &LabeledDataset, top_n: usize) -> Vec<WordCount> {
    let mut counts: AHashMap<String, usize> = AHashMap::new();
    for row in dataset.rows() {
        for word in row.message.text.to_lowercase().split_whitespace() {
            if !DEFAULT_ENGLISH_STOP_WORDS_SET.contains(word) {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut words: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    words.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    words.truncate(top_n);
    words
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Messages: {}", self.total_messages)?;
        writeln!(f)?;
        writeln!(f, "Genres:")?;
        for genre in &self.genres {
            writeln!(
                f,
                "  {:<8} {:>8} {:>7.2}%",
                genre.genre.as_str(),
                genre.count,
                genre.percentage
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Categories:")?;
        for category in &self.categories {
            writeln!(f, "  {:<24} {:>8}", category.name, category.count)?;
        }
        writeln!(f)?;
        writeln!(f, "Most used words:")?;
        for word in &self.top_words {
            writeln!(f, "  {:<24} {:>8}", word.word, word.count)?;
        }
        Ok(())
    }
}
