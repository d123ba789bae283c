//! Per-category evaluation of multi-label predictions.
//!
//! Every category is scored on its positive class. A zero denominator yields
//! a metric of 0 instead of an error, so a category with no positives in the
//! evaluation set still gets a well-defined row with `support = 0`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::{CategorySpec, LabelVector};
use crate::error::{ReliefError, Result};

/// Model selection criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Fraction of samples whose whole label vector is predicted exactly.
    #[default]
    SubsetAccuracy,
    /// Unweighted mean of per-category F1.
    MacroF1,
    /// F1 over counts pooled across categories.
    MicroF1,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::SubsetAccuracy => "subset_accuracy",
            Scoring::MacroF1 => "macro_f1",
            Scoring::MicroF1 => "micro_f1",
        }
    }

    /// Score predictions against the truth.
    pub fn score(&self, truth: &[LabelVector], predicted: &[LabelVector]) -> Result<f64> {
        let counts = count_outcomes(truth, predicted)?;
        Ok(match self {
            Scoring::SubsetAccuracy => subset_accuracy(truth, predicted),
            Scoring::MacroF1 => macro_average(&counts).f1,
            Scoring::MicroF1 => micro_average(&counts).f1,
        })
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of positives in the truth.
    pub support: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Evaluation of a classifier on a held-out partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub categories: Vec<CategoryMetrics>,
    pub macro_avg: AverageMetrics,
    pub micro_avg: AverageMetrics,
    pub subset_accuracy: f64,
    pub n_samples: usize,
}

impl EvaluationReport {
    pub fn category(&self, name: &str) -> Option<&CategoryMetrics> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn score(&self, scoring: Scoring) -> f64 {
        match scoring {
            Scoring::SubsetAccuracy => self.subset_accuracy,
            Scoring::MacroF1 => self.macro_avg.f1,
            Scoring::MicroF1 => self.micro_avg.f1,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .categories
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("micro avg".len());

        writeln!(
            f,
            "{:<width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.categories {
            writeln!(
                f,
                "{:<width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                c.name, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;

        let total_support: usize = self.categories.iter().map(|c| c.support).sum();
        for (label, avg) in [("micro avg", &self.micro_avg), ("macro avg", &self.macro_avg)] {
            writeln!(
                f,
                "{:<width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                label, avg.precision, avg.recall, avg.f1, total_support
            )?;
        }
        writeln!(f)?;
        write!(
            f,
            "subset accuracy: {:.4} over {} samples",
            self.subset_accuracy, self.n_samples
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Outcomes {
    tp: usize,
    fp: usize,
    fn_: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn count_outcomes(truth: &[LabelVector], predicted: &[LabelVector]) -> Result<Vec<Outcomes>> {
    if truth.len() != predicted.len() {
        return Err(ReliefError::schema_mismatch(format!(
            "{} truth rows but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    let width = truth.first().map_or(0, LabelVector::len);

    let mut counts = vec![Outcomes::default(); width];
    for (row, (t, p)) in truth.iter().zip(predicted).enumerate() {
        if t.len() != width || p.len() != width {
            return Err(ReliefError::schema_mismatch(format!(
                "row {row}: expected {width} labels, got {} and {}",
                t.len(),
                p.len()
            )));
        }
        for (c, (&tv, &pv)) in t.values().iter().zip(p.values()).enumerate() {
            match (tv, pv) {
                (1, 1) => counts[c].tp += 1,
                (0, 1) => counts[c].fp += 1,
                (1, 0) => counts[c].fn_ += 1,
                _ => {}
            }
        }
    }
    Ok(counts)
}

fn subset_accuracy(truth: &[LabelVector], predicted: &[LabelVector]) -> f64 {
    let exact = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    ratio(exact, truth.len())
}

fn macro_average(counts: &[Outcomes]) -> AverageMetrics {
    if counts.is_empty() {
        return AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let n = counts.len() as f64;
    let (mut p_sum, mut r_sum, mut f_sum) = (0.0, 0.0, 0.0);
    for o in counts {
        let p = ratio(o.tp, o.tp + o.fp);
        let r = ratio(o.tp, o.tp + o.fn_);
        p_sum += p;
        r_sum += r;
        f_sum += harmonic(p, r);
    }
    AverageMetrics {
        precision: p_sum / n,
        recall: r_sum / n,
        f1: f_sum / n,
    }
}

fn micro_average(counts: &[Outcomes]) -> AverageMetrics {
    let tp: usize = counts.iter().map(|o| o.tp).sum();
    let fp: usize = counts.iter().map(|o| o.fp).sum();
    let fn_: usize = counts.iter().map(|o| o.fn_).sum();
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    AverageMetrics {
        precision,
        recall,
        f1: harmonic(precision, recall),
    }
}

/// Builds evaluation reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// Evaluate predictions for every category of `spec`.
    pub fn evaluate(
        &self,
        spec: &CategorySpec,
        truth: &[LabelVector],
        predicted: &[LabelVector],
    ) -> Result<EvaluationReport> {
        let counts = if truth.is_empty() && predicted.is_empty() {
            vec![Outcomes::default(); spec.len()]
        } else {
            count_outcomes(truth, predicted)?
        };
        if counts.len() != spec.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "expected {} categories, labels have {}",
                spec.len(),
                counts.len()
            )));
        }

        let categories = spec
            .iter()
            .zip(&counts)
            .map(|(name, o)| {
                let precision = ratio(o.tp, o.tp + o.fp);
                let recall = ratio(o.tp, o.tp + o.fn_);
                CategoryMetrics {
                    name: name.to_string(),
                    precision,
                    recall,
                    f1: harmonic(precision, recall),
                    support: o.tp + o.fn_,
                    true_positives: o.tp,
                    false_positives: o.fp,
                    false_negatives: o.fn_,
                }
            })
            .collect();

        Ok(EvaluationReport {
            categories,
            macro_avg: macro_average(&counts),
            micro_avg: micro_average(&counts),
            subset_accuracy: subset_accuracy(truth, predicted),
            n_samples: truth.len(),
        })
    }
}
