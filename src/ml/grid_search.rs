//! Cross-validated grid search over feature and classifier hyperparameters.
//!
//! Every (configuration, fold) pair is an independent sub-fit: it builds its
//! own vectorizer and models from the fold's training rows and scores them on
//! the fold's validation rows. Sub-fits run on a dedicated rayon pool and
//! derive their RNG seed from `(seed, config index, fold index)`, so the
//! outcome does not depend on scheduling.
//!
//! A shared cancel flag is checked before each sub-fit starts. Scores of the
//! sub-fits that did complete are kept in the [`SearchState`], and a later
//! run with the same state only computes what is missing. The state records a
//! CRC32 of everything a score depends on (documents, labels, grid, folds and
//! seed); a run over different inputs discards the stale scores first.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::dataset::{CategorySpec, LabelVector};
use crate::error::{ReliefError, Result};
use crate::ml::cross_validation::{FoldSplit, KFold, derive_seed};
use crate::ml::evaluation::Scoring;
use crate::ml::stage::{ClassifierStage, FeatureStage, Stage};
use crate::ml::svm::SvmConfig;
use crate::ml::tfidf::{NgramRange, VectorizerConfig};

/// One point of the hyperparameter grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    pub ngram_range: NgramRange,
    pub c: f64,
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ngram_range={}, C={}", self.ngram_range, self.c)
    }
}

/// Cross-validation outcome of one grid entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best mean score; equal means share a rank.
    pub rank: usize,
}

/// Scores of completed sub-fits, keyed by `(config index, fold index)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    completed: BTreeMap<(usize, usize), f64>,
    /// Fingerprint of the inputs that produced `completed`.
    inputs: Option<u32>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, config: usize, fold: usize) -> Option<f64> {
        self.completed.get(&(config, fold)).copied()
    }

    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    /// Fingerprint of the search inputs the scores belong to.
    pub fn inputs(&self) -> Option<u32> {
        self.inputs
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        self.inputs = None;
    }

    /// Bind the state to `fingerprint`, dropping scores from other inputs.
    fn bind(&mut self, fingerprint: u32) {
        if self.inputs != Some(fingerprint) {
            if !self.completed.is_empty() {
                log::info!(
                    "Search inputs changed; discarding {} cached cross-validation scores",
                    self.completed.len()
                );
            }
            self.completed.clear();
            self.inputs = Some(fingerprint);
        }
    }
}

/// Result of a finished search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub results: Vec<CvResult>,
}

/// Grid search driver.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: Vec<ParamSet>,
    n_folds: usize,
    scoring: Scoring,
    seed: u64,
    n_jobs: usize,
    svm: SvmConfig,
    min_df: usize,
    cancel: Arc<AtomicBool>,
}

impl GridSearch {
    pub fn new(config: &TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(GridSearch {
            grid: config.grid.param_sets(),
            n_folds: config.cv_folds,
            scoring: config.scoring,
            seed: config.seed,
            n_jobs: config.n_jobs,
            svm: config.svm.clone(),
            min_df: config.min_df,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an existing cancel flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn grid(&self) -> &[ParamSet] {
        &self.grid
    }

    fn thread_count(&self) -> usize {
        if self.n_jobs == 0 {
            num_cpus::get()
        } else {
            self.n_jobs
        }
    }

    /// Run the search over pre-tokenized documents.
    pub fn run(
        &self,
        spec: &CategorySpec,
        documents: &[Vec<String>],
        targets: &[LabelVector],
        state: &mut SearchState,
    ) -> Result<SearchOutcome> {
        if documents.len() != targets.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "{} documents but {} label rows",
                documents.len(),
                targets.len()
            )));
        }

        let folds = KFold::new(self.n_folds)?
            .with_shuffle(self.seed)
            .split(documents.len())?;
        state.bind(self.fingerprint(spec, documents, targets));

        let tasks: Vec<(usize, usize)> = (0..self.grid.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .filter(|key| !state.completed.contains_key(key))
            .collect();

        log::info!(
            "Grid search: {} configurations x {} folds, {} sub-fits to run on {} threads",
            self.grid.len(),
            folds.len(),
            tasks.len(),
            self.thread_count()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.thread_count())
            .build()
            .map_err(|e| ReliefError::invalid_operation(format!("cannot build thread pool: {e}")))?;

        let results: Vec<Result<Option<((usize, usize), f64)>>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| {
                    if self.cancel.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    let score = self.sub_fit(spec, documents, targets, &folds[f], c, f)?;
                    Ok(Some(((c, f), score)))
                })
                .collect()
        });

        let mut first_error = None;
        let mut skipped = 0usize;
        for result in results {
            match result {
                Ok(Some((key, score))) => {
                    state.completed.insert(key, score);
                }
                Ok(None) => skipped += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if skipped > 0 {
            return Err(ReliefError::cancelled(format!(
                "grid search cancelled with {skipped} sub-fits pending, {} completed",
                state.completed()
            )));
        }

        self.summarize(state, folds.len())
    }

    /// CRC32 over every input a sub-fit score depends on.
    fn fingerprint(&self, spec: &CategorySpec, documents: &[Vec<String>], targets: &[LabelVector]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&(self.n_folds as u64).to_le_bytes());
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&(self.min_df as u64).to_le_bytes());
        hasher.update(format!("{}|{:?}", self.scoring, self.svm).as_bytes());
        for params in &self.grid {
            hasher.update(params.to_string().as_bytes());
            hasher.update(b"\n");
        }
        for name in spec.iter() {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        for (tokens, labels) in documents.iter().zip(targets) {
            hasher.update(&(tokens.len() as u64).to_le_bytes());
            for token in tokens {
                hasher.update(token.as_bytes());
                hasher.update(&[0]);
            }
            hasher.update(labels.values());
        }
        hasher.finalize()
    }

    fn sub_fit(
        &self,
        spec: &CategorySpec,
        documents: &[Vec<String>],
        targets: &[LabelVector],
        fold: &FoldSplit,
        config_index: usize,
        fold_index: usize,
    ) -> Result<f64> {
        let params = self.grid[config_index];

        let train_docs: Vec<Vec<String>> = fold.train.iter().map(|&i| documents[i].clone()).collect();
        let train_targets: Vec<LabelVector> = fold.train.iter().map(|&i| targets[i].clone()).collect();
        let test_docs: Vec<Vec<String>> = fold.test.iter().map(|&i| documents[i].clone()).collect();
        let test_targets: Vec<LabelVector> = fold.test.iter().map(|&i| targets[i].clone()).collect();

        let features = FeatureStage::new(
            VectorizerConfig::new(params.ngram_range).with_min_df(self.min_df),
        );
        let vectorizer = features.fit(&train_docs, &train_targets)?;
        let train_rows = features.transform(&vectorizer, &train_docs)?;
        let test_rows = features.transform(&vectorizer, &test_docs)?;

        let classifier = ClassifierStage::new(
            spec.clone(),
            self.svm.clone().with_c(params.c),
            vectorizer.n_features(),
            derive_seed(self.seed, config_index as u64, fold_index as u64),
        )
        .allow_constant_labels(true);
        let model = classifier.fit(&train_rows, &train_targets)?;
        let predicted = classifier.transform(&model, &test_rows)?;

        let score = self.scoring.score(&test_targets, &predicted)?;
        log::debug!(
            "Config {config_index} ({params}) fold {fold_index}: {} = {score:.4}",
            self.scoring
        );
        Ok(score)
    }

    fn summarize(&self, state: &SearchState, n_folds: usize) -> Result<SearchOutcome> {
        let mut results = Vec::with_capacity(self.grid.len());
        for (c, params) in self.grid.iter().enumerate() {
            let fold_scores = (0..n_folds)
                .map(|f| {
                    state.score(c, f).ok_or_else(|| {
                        ReliefError::invalid_operation(format!(
                            "missing score for configuration {c} fold {f}"
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            let mean = fold_scores.iter().sum::<f64>() / n_folds as f64;
            let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n_folds as f64;
            results.push(CvResult {
                params: *params,
                fold_scores,
                mean_score: mean,
                std_score: variance.sqrt(),
                rank: 0,
            });
        }

        let means: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
        for result in &mut results {
            result.rank = 1 + means.iter().filter(|&&m| m > result.mean_score).count();
        }

        // Strict comparison keeps the earliest grid entry on ties.
        let mut best_index = 0;
        for (i, result) in results.iter().enumerate() {
            if result.mean_score > results[best_index].mean_score {
                best_index = i;
            }
        }

        let best = &results[best_index];
        log::info!(
            "Best configuration: {} with mean {} = {:.4}",
            best.params,
            self.scoring,
            best.mean_score
        );

        Ok(SearchOutcome {
            best_index,
            best_params: best.params,
            best_score: best.mean_score,
            results,
        })
    }
}
