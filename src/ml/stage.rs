//! Pipeline stages.
//!
//! Training composes three stages in a fixed order:
//!
//! ```text
//! text → TokenizerStage → tokens → FeatureStage → tf-idf rows → ClassifierStage → labels
//! ```
//!
//! Each stage is a factory: `fit` returns an immutable fitted state and
//! `transform` applies a fitted state to new inputs. Stages hold no mutable
//! state, so one stage value can serve many parallel sub-fits.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::message::MessageAnalyzer;
use crate::dataset::{CategorySpec, LabelVector};
use crate::error::{ReliefError, Result};
use crate::ml::cross_validation::derive_seed;
use crate::ml::sparse::SparseVector;
use crate::ml::svm::{BinaryModel, SvmConfig};
use crate::ml::tfidf::{TfIdfVectorizer, VectorizerConfig};

/// A fit/transform step of the training pipeline.
pub trait Stage: Send + Sync {
    type Input: Sync;
    type Output: Send;
    type Fitted: Send + Sync;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Fit on training inputs and their targets.
    fn fit(&self, inputs: &[Self::Input], targets: &[LabelVector]) -> Result<Self::Fitted>;

    /// Apply a fitted state to inputs.
    fn transform(&self, fitted: &Self::Fitted, inputs: &[Self::Input]) -> Result<Vec<Self::Output>>;
}

/// Tokenizes raw messages. Fitting only records the analyzer fingerprint.
#[derive(Debug, Clone)]
pub struct TokenizerStage {
    analyzer: Arc<MessageAnalyzer>,
}

impl TokenizerStage {
    pub fn new(analyzer: Arc<MessageAnalyzer>) -> Self {
        TokenizerStage { analyzer }
    }

    pub fn analyzer(&self) -> &MessageAnalyzer {
        &self.analyzer
    }
}

impl Stage for TokenizerStage {
    type Input = String;
    type Output = Vec<String>;
    type Fitted = u32;

    fn name(&self) -> &'static str {
        "tokenizer"
    }

    fn fit(&self, _inputs: &[String], _targets: &[LabelVector]) -> Result<u32> {
        Ok(self.analyzer.fingerprint())
    }

    fn transform(&self, fitted: &u32, inputs: &[String]) -> Result<Vec<Vec<String>>> {
        if *fitted != self.analyzer.fingerprint() {
            return Err(ReliefError::schema_mismatch(format!(
                "tokenizer fingerprint {:08x} does not match analyzer {:08x}",
                fitted,
                self.analyzer.fingerprint()
            )));
        }
        inputs
            .par_iter()
            .map(|text| self.analyzer.tokenize(text))
            .collect()
    }
}

/// Builds TF-IDF features over token sequences.
#[derive(Debug, Clone)]
pub struct FeatureStage {
    config: VectorizerConfig,
}

impl FeatureStage {
    pub fn new(config: VectorizerConfig) -> Self {
        FeatureStage { config }
    }
}

impl Stage for FeatureStage {
    type Input = Vec<String>;
    type Output = SparseVector;
    type Fitted = TfIdfVectorizer;

    fn name(&self) -> &'static str {
        "features"
    }

    fn fit(&self, inputs: &[Vec<String>], _targets: &[LabelVector]) -> Result<TfIdfVectorizer> {
        let mut vectorizer = TfIdfVectorizer::new(self.config.clone());
        vectorizer.fit(inputs)?;
        Ok(vectorizer)
    }

    fn transform(&self, fitted: &TfIdfVectorizer, inputs: &[Vec<String>]) -> Result<Vec<SparseVector>> {
        inputs
            .par_iter()
            .map(|tokens| fitted.transform_tokens(tokens))
            .collect()
    }
}

/// One binary model per category over a shared feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOutputModel {
    models: Vec<BinaryModel>,
    n_features: usize,
}

impl MultiOutputModel {
    pub fn new(models: Vec<BinaryModel>, n_features: usize) -> Self {
        MultiOutputModel { models, n_features }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[BinaryModel] {
        &self.models
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict(&self, x: &SparseVector) -> LabelVector {
        let values = self.models.iter().map(|m| m.predict(x)).collect();
        // Every model predicts 0 or 1.
        LabelVector::new(values).unwrap_or_else(|_| LabelVector::zeros(self.models.len()))
    }
}

/// Fits one binary model per category.
#[derive(Debug, Clone)]
pub struct ClassifierStage {
    spec: CategorySpec,
    svm: SvmConfig,
    n_features: usize,
    seed: u64,
    allow_constant_labels: bool,
}

impl ClassifierStage {
    pub fn new(spec: CategorySpec, svm: SvmConfig, n_features: usize, seed: u64) -> Self {
        ClassifierStage {
            spec,
            svm,
            n_features,
            seed,
            allow_constant_labels: false,
        }
    }

    /// Fit a constant model instead of failing when a category never varies.
    pub fn allow_constant_labels(mut self, allow: bool) -> Self {
        self.allow_constant_labels = allow;
        self
    }
}

impl Stage for ClassifierStage {
    type Input = SparseVector;
    type Output = LabelVector;
    type Fitted = MultiOutputModel;

    fn name(&self) -> &'static str {
        "classifier"
    }

    fn fit(&self, inputs: &[SparseVector], targets: &[LabelVector]) -> Result<MultiOutputModel> {
        if inputs.len() != targets.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "{} feature rows but {} label rows",
                inputs.len(),
                targets.len()
            )));
        }
        if let Some(bad) = targets.iter().find(|t| t.len() != self.spec.len()) {
            return Err(ReliefError::schema_mismatch(format!(
                "label vector of width {} for {} categories",
                bad.len(),
                self.spec.len()
            )));
        }

        let models = self
            .spec
            .names()
            .par_iter()
            .enumerate()
            .map(|(index, name)| {
                let ys: Vec<u8> = targets.iter().map(|t| t.get(index).unwrap_or(0)).collect();
                let model = BinaryModel::fit(
                    name,
                    inputs,
                    &ys,
                    self.n_features,
                    &self.svm,
                    derive_seed(self.seed, index as u64, 0),
                    self.allow_constant_labels,
                )?;
                if model.is_constant() {
                    log::debug!("Category '{name}' is constant; using a constant predictor");
                }
                Ok(model)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MultiOutputModel::new(models, self.n_features))
    }

    fn transform(&self, fitted: &MultiOutputModel, inputs: &[SparseVector]) -> Result<Vec<LabelVector>> {
        Ok(inputs.par_iter().map(|x| fitted.predict(x)).collect())
    }
}
