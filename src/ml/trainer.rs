//! Training driver and its lifecycle.
//!
//! ```text
//!            fit               search ok            persist
//!   Unfit ─────────▶ Fitting ─────────────▶ Fitted ─────────▶ Persisted
//!     ▲                 │  │
//!     └─── cancelled ───┘  └── fit error ──▶ Failed
//! ```
//!
//! Any non-terminal state moves to `Failed` when the source data cannot be
//! loaded. A cancelled run keeps its completed cross-validation scores, so
//! calling [`Trainer::fit`] again on the same dataset resumes the search.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::analyzer::message::MessageAnalyzer;
use crate::config::TrainingConfig;
use crate::dataset::{DatasetStore, LabelVector, LabeledDataset};
use crate::error::{ReliefError, Result};
use crate::ml::classifier::{ModelMetadata, MultiLabelClassifier};
use crate::ml::cross_validation::train_test_split;
use crate::ml::evaluation::{EvaluationReport, Evaluator};
use crate::ml::grid_search::{CvResult, GridSearch, ParamSet, SearchState};
use crate::ml::persist::ModelPersister;
use crate::ml::stage::{ClassifierStage, FeatureStage, Stage, TokenizerStage};
use crate::ml::svm::BinaryModel;
use crate::ml::tfidf::VectorizerConfig;

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Unfit,
    Fitting,
    Fitted,
    Persisted,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Unfit, Fitting)
                | (Fitting, Fitted)
                | (Fitting, Failed)
                | (Fitting, Unfit)
                | (Fitted, Persisted)
                | (Unfit, Failed)
                | (Fitted, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Persisted | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Unfit => "unfit",
            PipelineState::Fitting => "fitting",
            PipelineState::Fitted => "fitted",
            PipelineState::Persisted => "persisted",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub params: ParamSet,
    pub best_score: f64,
    pub cv_results: Vec<CvResult>,
    /// Metrics on the held-out test partition.
    pub evaluation: EvaluationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
}

/// Drives a single training run from labeled dataset to persisted artifact.
pub struct Trainer {
    config: TrainingConfig,
    state: PipelineState,
    analyzer: Arc<MessageAnalyzer>,
    classifier: Option<MultiLabelClassifier>,
    search_state: SearchState,
    cancel: Arc<AtomicBool>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Trainer {
            config,
            state: PipelineState::Unfit,
            analyzer: Arc::new(MessageAnalyzer::new()?),
            classifier: None,
            search_state: SearchState::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Flag that cancels the grid search between two sub-fits when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Cross-validation scores completed so far.
    pub fn search_state(&self) -> &SearchState {
        &self.search_state
    }

    pub fn classifier(&self) -> Option<&MultiLabelClassifier> {
        self.classifier.as_ref()
    }

    /// Take the fitted classifier out of the trainer.
    pub fn into_classifier(self) -> Result<MultiLabelClassifier> {
        self.classifier.ok_or_else(|| {
            ReliefError::invalid_operation(format!("no classifier in state {}", self.state))
        })
    }

    fn transition(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ReliefError::invalid_operation(format!(
                "cannot move from {} to {next}",
                self.state
            )));
        }
        log::debug!("Trainer state: {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }

    /// Load the dataset from a store and fit on it.
    pub fn fit_from_store(&mut self, store: &DatasetStore) -> Result<TrainingReport> {
        match store.load() {
            Ok(dataset) => self.fit(&dataset),
            Err(e) => {
                if e.is_io() && self.state.can_transition_to(PipelineState::Failed) {
                    self.transition(PipelineState::Failed)?;
                }
                Err(e)
            }
        }
    }

    /// Split, search, refit the best configuration and evaluate it.
    pub fn fit(&mut self, dataset: &LabeledDataset) -> Result<TrainingReport> {
        self.transition(PipelineState::Fitting)?;

        match self.run(dataset) {
            Ok((classifier, report)) => {
                self.classifier = Some(classifier);
                self.transition(PipelineState::Fitted)?;
                Ok(report)
            }
            Err(e @ ReliefError::OperationCancelled(_)) => {
                log::warn!(
                    "Training cancelled; {} cross-validation scores kept for resume",
                    self.search_state.completed()
                );
                self.cancel.store(false, Ordering::SeqCst);
                self.transition(PipelineState::Unfit)?;
                Err(e)
            }
            Err(e) => {
                log::error!("Training failed: {e}");
                self.transition(PipelineState::Failed)?;
                Err(e)
            }
        }
    }

    fn run(&mut self, dataset: &LabeledDataset) -> Result<(MultiLabelClassifier, TrainingReport)> {
        if dataset.is_empty() {
            return Err(ReliefError::invalid_operation("cannot train on an empty dataset"));
        }
        let spec = dataset.spec();
        let (train_idx, test_idx) = train_test_split(dataset.len(), self.config.test_size, self.config.seed)?;

        let rows = dataset.rows();
        let pick_texts = |idx: &[usize]| -> Vec<String> {
            idx.iter().map(|&i| rows[i].message.text.clone()).collect()
        };
        let pick_labels = |idx: &[usize]| -> Vec<LabelVector> {
            idx.iter().map(|&i| rows[i].labels.clone()).collect()
        };
        let train_texts = pick_texts(&train_idx);
        let train_targets = pick_labels(&train_idx);
        let test_texts = pick_texts(&test_idx);
        let test_targets = pick_labels(&test_idx);
        log::info!(
            "Training on {} messages, evaluating on {} ({} categories)",
            train_idx.len(),
            test_idx.len(),
            spec.len()
        );

        if !self.config.allow_constant_labels {
            for (index, name) in spec.iter().enumerate() {
                let ys: Vec<u8> = train_targets.iter().map(|t| t.get(index).unwrap_or(0)).collect();
                if let Some(value) = BinaryModel::constant_target(&ys) {
                    return Err(ReliefError::degenerate_label(name, value));
                }
            }
        }

        let tokenizer = TokenizerStage::new(Arc::clone(&self.analyzer));
        let fingerprint = tokenizer.fit(&train_texts, &train_targets)?;
        let train_docs = tokenizer.transform(&fingerprint, &train_texts)?;
        let test_docs = tokenizer.transform(&fingerprint, &test_texts)?;

        let search = GridSearch::new(&self.config)?.with_cancel_flag(Arc::clone(&self.cancel));
        let outcome = search.run(spec, &train_docs, &train_targets, &mut self.search_state)?;
        log::info!(
            "Selected {} with mean {} {:.4}",
            outcome.best_params,
            self.config.scoring,
            outcome.best_score
        );

        let features = FeatureStage::new(
            VectorizerConfig::new(outcome.best_params.ngram_range).with_min_df(self.config.min_df),
        );
        let vectorizer = features.fit(&train_docs, &train_targets)?;
        let train_rows = features.transform(&vectorizer, &train_docs)?;
        let test_rows = features.transform(&vectorizer, &test_docs)?;
        let n_features = vectorizer.n_features();

        let classifier_stage = ClassifierStage::new(
            spec.clone(),
            self.config.svm.clone().with_c(outcome.best_params.c),
            n_features,
            self.config.seed,
        )
        .allow_constant_labels(self.config.allow_constant_labels);
        let model = classifier_stage.fit(&train_rows, &train_targets)?;
        let predicted = classifier_stage.transform(&model, &test_rows)?;

        let evaluation = Evaluator::new().evaluate(spec, &test_targets, &predicted)?;
        log::info!(
            "Held-out subset accuracy {:.4}, macro F1 {:.4}",
            evaluation.subset_accuracy,
            evaluation.macro_avg.f1
        );

        let metadata = ModelMetadata {
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            crate_version: crate::VERSION.to_string(),
            seed: self.config.seed,
            scoring: self.config.scoring,
            best_score: outcome.best_score,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            n_features,
        };

        let classifier = MultiLabelClassifier::new(
            (*self.analyzer).clone(),
            spec.clone(),
            vectorizer,
            model,
            outcome.best_params,
            outcome.results.clone(),
            metadata,
        )?;

        let report = TrainingReport {
            params: outcome.best_params,
            best_score: outcome.best_score,
            cv_results: outcome.results,
            evaluation,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            n_features,
        };
        Ok((classifier, report))
    }

    /// Write the fitted classifier as an artifact.
    ///
    /// A failed write leaves the trainer `Fitted` so the call can be retried.
    pub fn persist<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        if self.state != PipelineState::Fitted {
            return Err(ReliefError::invalid_operation(format!(
                "cannot persist in state {}",
                self.state
            )));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| ReliefError::invalid_operation("fitted trainer has no classifier"))?;
        let written = ModelPersister::save(classifier, path)?;
        self.transition(PipelineState::Persisted)?;
        Ok(written)
    }
}
