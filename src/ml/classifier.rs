//! The trained multi-label message classifier.
//!
//! A [`MultiLabelClassifier`] bundles everything prediction needs: the message
//! analyzer, the frozen vectorizer, one binary model per category, and the
//! selection record of the training run. It is immutable after construction
//! and `Send + Sync`, so a single instance can serve concurrent requests
//! without locking.

use std::fmt;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::analysis::analyzer::message::MessageAnalyzer;
use crate::dataset::{CategorySpec, LabelVector};
use crate::error::{ReliefError, Result};
use crate::ml::evaluation::Scoring;
use crate::ml::grid_search::{CvResult, ParamSet};
use crate::ml::stage::MultiOutputModel;
use crate::ml::tfidf::TfIdfVectorizer;

/// Provenance of a trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub crate_version: String,
    pub seed: u64,
    pub scoring: Scoring,
    /// Mean cross-validation score of the selected configuration.
    pub best_score: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
}

/// Category assignments for one message, in category order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    categories: Vec<String>,
    labels: LabelVector,
}

impl Prediction {
    pub fn new(spec: &CategorySpec, labels: LabelVector) -> Self {
        Prediction {
            categories: spec.names().to_vec(),
            labels,
        }
    }

    /// All-zero prediction.
    pub fn zeros(spec: &CategorySpec) -> Self {
        Self::new(spec, LabelVector::zeros(spec.len()))
    }

    pub fn get(&self, category: &str) -> Option<u8> {
        self.categories
            .iter()
            .position(|c| c == category)
            .and_then(|i| self.labels.get(i))
    }

    pub fn labels(&self) -> &LabelVector {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.categories
            .iter()
            .map(String::as_str)
            .zip(self.labels.values().iter().copied())
    }

    /// Names of the categories predicted positive.
    pub fn positive(&self) -> Vec<&str> {
        self.iter().filter(|&(_, v)| v == 1).map(|(c, _)| c).collect()
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (category, value) in self.iter() {
            map.serialize_entry(category, &value)?;
        }
        map.end()
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, value) in self.iter() {
            writeln!(f, "{category:<24} {value}")?;
        }
        Ok(())
    }
}

/// Trained multi-label classifier.
#[derive(Debug, Clone)]
pub struct MultiLabelClassifier {
    analyzer: MessageAnalyzer,
    spec: CategorySpec,
    vectorizer: TfIdfVectorizer,
    model: MultiOutputModel,
    params: ParamSet,
    cv_results: Vec<CvResult>,
    metadata: ModelMetadata,
}

impl MultiLabelClassifier {
    pub fn new(
        analyzer: MessageAnalyzer,
        spec: CategorySpec,
        vectorizer: TfIdfVectorizer,
        model: MultiOutputModel,
        params: ParamSet,
        cv_results: Vec<CvResult>,
        metadata: ModelMetadata,
    ) -> Result<Self> {
        if model.len() != spec.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "{} category models for {} categories",
                model.len(),
                spec.len()
            )));
        }
        if !vectorizer.is_fitted() {
            return Err(ReliefError::invalid_operation("vectorizer is not fitted"));
        }
        Ok(MultiLabelClassifier {
            analyzer,
            spec,
            vectorizer,
            model,
            params,
            cv_results,
            metadata,
        })
    }

    /// Label vector for one message.
    pub fn predict_labels(&self, text: &str) -> Result<LabelVector> {
        let tokens = self.analyzer.tokenize(text)?;
        let row = self.vectorizer.transform_tokens(&tokens)?;
        Ok(self.model.predict(&row))
    }

    /// Category map for one message.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use relief::ml::persist::ModelPersister;
    ///
    /// let classifier = ModelPersister::load("classifier.bin").unwrap();
    /// let prediction = classifier.predict("We need water and food").unwrap();
    /// println!("{:?}", prediction.positive());
    /// ```
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        Ok(Prediction::new(&self.spec, self.predict_labels(text)?))
    }

    /// Like [`predict`](Self::predict), but empty input or a failure yields all zeros.
    pub fn predict_or_default(&self, text: &str) -> Prediction {
        if text.trim().is_empty() {
            return Prediction::zeros(&self.spec);
        }
        match self.predict(text) {
            Ok(prediction) => prediction,
            Err(e) => {
                log::warn!("Prediction failed, returning no categories: {e}");
                Prediction::zeros(&self.spec)
            }
        }
    }

    /// Label vectors for many messages, in input order.
    pub fn predict_batch(&self, texts: &[String]) -> Result<Vec<LabelVector>> {
        texts.par_iter().map(|t| self.predict_labels(t)).collect()
    }

    pub fn analyzer(&self) -> &MessageAnalyzer {
        &self.analyzer
    }

    pub fn fingerprint(&self) -> u32 {
        self.analyzer.fingerprint()
    }

    pub fn spec(&self) -> &CategorySpec {
        &self.spec
    }

    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    pub fn model(&self) -> &MultiOutputModel {
        &self.model
    }

    pub fn params(&self) -> ParamSet {
        self.params
    }

    pub fn cv_results(&self) -> &[CvResult] {
        &self.cv_results
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
