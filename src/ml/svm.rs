//! Linear support vector machine for one binary category.
//!
//! The model minimizes the L2-regularized squared hinge loss
//!
//! ```text
//! 0.5 * |w|^2 + C * sum_i max(0, 1 - y_i * (w . x_i + b))^2
//! ```
//!
//! by dual coordinate descent. The intercept is learned as the weight of an
//! extra constant feature. Each epoch visits the samples in a permutation
//! drawn from a seeded RNG, so a fit is fully determined by its inputs and
//! seed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{ReliefError, Result};
use crate::ml::sparse::SparseVector;

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// Inverse regularization strength.
    pub c: f64,
    /// Stop when the projected-gradient spread falls below this value.
    pub tol: f64,
    /// Upper bound on passes over the data.
    pub max_epochs: usize,
    /// Value of the constant feature carrying the intercept.
    pub intercept_scaling: f64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        SvmConfig {
            c: 1.0,
            tol: 1e-4,
            max_epochs: 1000,
            intercept_scaling: 1.0,
        }
    }
}

impl SvmConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ReliefError::invalid_config(format!(
                "C must be a positive number, got {}",
                self.c
            )));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(ReliefError::invalid_config(format!(
                "tolerance must be a positive number, got {}",
                self.tol
            )));
        }
        if self.max_epochs == 0 {
            return Err(ReliefError::invalid_config("max_epochs must be at least 1"));
        }
        if !(self.intercept_scaling.is_finite() && self.intercept_scaling > 0.0) {
            return Err(ReliefError::invalid_config(format!(
                "intercept_scaling must be a positive number, got {}",
                self.intercept_scaling
            )));
        }
        Ok(())
    }
}

/// A fitted linear decision function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    weights: Vec<f64>,
    intercept: f64,
    epochs: usize,
    converged: bool,
}

impl LinearSvm {
    /// Fit on rows `xs` with binary targets `ys`.
    pub fn fit(
        xs: &[SparseVector],
        ys: &[u8],
        n_features: usize,
        config: &SvmConfig,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if xs.is_empty() {
            return Err(ReliefError::invalid_operation(
                "cannot fit a classifier without samples",
            ));
        }
        if xs.len() != ys.len() {
            return Err(ReliefError::schema_mismatch(format!(
                "{} samples but {} targets",
                xs.len(),
                ys.len()
            )));
        }

        let n = xs.len();
        let scale = config.intercept_scaling;
        let diag = 0.5 / config.c;
        let y: Vec<f64> = ys.iter().map(|&v| if v == 1 { 1.0 } else { -1.0 }).collect();
        let qd: Vec<f64> = xs
            .iter()
            .map(|x| x.squared_norm() + scale * scale + diag)
            .collect();

        let mut weights = vec![0.0; n_features];
        let mut bias_weight = 0.0;
        let mut alpha = vec![0.0; n];
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut epochs = 0;
        let mut converged = false;
        while epochs < config.max_epochs {
            epochs += 1;
            order.shuffle(&mut rng);

            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;

            for &i in &order {
                let margin = xs[i].dot(&weights) + bias_weight * scale;
                let g = y[i] * margin - 1.0 + alpha[i] * diag;

                // alpha has no upper bound with the squared hinge loss.
                let pg = if alpha[i] == 0.0 { g.min(0.0) } else { g };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);

                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (alpha[i] - g / qd[i]).max(0.0);
                    let delta = (alpha[i] - old) * y[i];
                    xs[i].add_scaled_to(&mut weights, delta);
                    bias_weight += delta * scale;
                }
            }

            if pg_max - pg_min <= config.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::debug!(
                "Coordinate descent stopped after {epochs} epochs without reaching tolerance {}",
                config.tol
            );
        }

        Ok(LinearSvm {
            weights,
            intercept: bias_weight * scale,
            epochs,
            converged,
        })
    }

    /// Signed distance-like score; positive means the category applies.
    pub fn decision_function(&self, x: &SparseVector) -> f64 {
        x.dot(&self.weights) + self.intercept
    }

    pub fn predict(&self, x: &SparseVector) -> u8 {
        u8::from(self.decision_function(x) > 0.0)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Per-category model: a fitted SVM, or a constant when the target never varies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinaryModel {
    Linear(LinearSvm),
    Constant(u8),
}

impl BinaryModel {
    /// The single value of `ys` if it never varies.
    pub fn constant_target(ys: &[u8]) -> Option<u8> {
        let first = *ys.first()?;
        ys.iter().all(|&v| v == first).then_some(first)
    }

    /// Fit one category. A constant target yields a constant model when allowed,
    /// and a degenerate-label error otherwise.
    pub fn fit(
        category: &str,
        xs: &[SparseVector],
        ys: &[u8],
        n_features: usize,
        config: &SvmConfig,
        seed: u64,
        allow_constant: bool,
    ) -> Result<Self> {
        if let Some(value) = Self::constant_target(ys) {
            if !allow_constant {
                return Err(ReliefError::degenerate_label(category, value));
            }
            return Ok(BinaryModel::Constant(value));
        }
        Ok(BinaryModel::Linear(LinearSvm::fit(
            xs, ys, n_features, config, seed,
        )?))
    }

    pub fn predict(&self, x: &SparseVector) -> u8 {
        match self {
            BinaryModel::Linear(svm) => svm.predict(x),
            BinaryModel::Constant(value) => *value,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, BinaryModel::Constant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<SparseVector>, Vec<u8>) {
        let xs = vec![
            SparseVector::from_pairs(vec![(0, 1.0)]),
            SparseVector::from_pairs(vec![(0, 0.9), (2, 0.1)]),
            SparseVector::from_pairs(vec![(1, 1.0)]),
            SparseVector::from_pairs(vec![(1, 0.8), (2, 0.2)]),
        ];
        (xs, vec![1, 1, 0, 0])
    }

    #[test]
    fn test_fits_separable_data() {
        let (xs, ys) = separable();
        let svm = LinearSvm::fit(&xs, &ys, 3, &SvmConfig::default(), 7).unwrap();

        assert!(svm.converged());
        for (x, y) in xs.iter().zip(&ys) {
            assert_eq!(svm.predict(x), *y);
        }
        assert!(svm.decision_function(&SparseVector::from_pairs(vec![(0, 1.0)])) > 0.0);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (xs, ys) = separable();
        let a = LinearSvm::fit(&xs, &ys, 3, &SvmConfig::default(), 42).unwrap();
        let b = LinearSvm::fit(&xs, &ys, 3, &SvmConfig::default(), 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_targets() {
        let (xs, _) = separable();
        let ys = vec![0, 0, 0, 0];
        let config = SvmConfig::default();

        let err = BinaryModel::fit("child_alone", &xs, &ys, 3, &config, 0, false).unwrap_err();
        assert!(matches!(err, ReliefError::DegenerateLabel { value: 0, .. }));

        let model = BinaryModel::fit("child_alone", &xs, &ys, 3, &config, 0, true).unwrap();
        assert_eq!(model, BinaryModel::Constant(0));
        assert_eq!(model.predict(&xs[0]), 0);
    }

    #[test]
    fn test_invalid_config() {
        let (xs, ys) = separable();
        let config = SvmConfig::default().with_c(0.0);
        assert!(matches!(
            LinearSvm::fit(&xs, &ys, 3, &config, 0),
            Err(ReliefError::InvalidConfig(_))
        ));
        assert!(LinearSvm::fit(&[], &[], 3, &SvmConfig::default(), 0).is_err());
    }
}
