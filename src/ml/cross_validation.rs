//! Data splitting for model selection.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{ReliefError, Result};

/// Indices of one train/validation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold splitter with an optional seeded shuffle.
///
/// The first `n % k` folds hold one extra sample.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(ReliefError::invalid_config(format!(
                "k-fold needs at least 2 splits, got {n_splits}"
            )));
        }
        Ok(KFold {
            n_splits,
            seed: None,
        })
    }

    /// Shuffle samples with `seed` before cutting folds.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<FoldSplit>> {
        if n_samples < self.n_splits {
            return Err(ReliefError::invalid_operation(format!(
                "cannot make {} folds from {n_samples} samples",
                self.n_splits
            )));
        }

        let mut order: Vec<usize> = (0..n_samples).collect();
        if let Some(seed) = self.seed {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let test = order[start..end].to_vec();
            let train = order[..start]
                .iter()
                .chain(&order[end..])
                .copied()
                .collect();
            folds.push(FoldSplit { train, test });
            start = end;
        }
        Ok(folds)
    }
}

/// Seeded shuffle split into `(train, test)` indices.
///
/// The test partition gets `ceil(test_size * n)` samples; both partitions must
/// end up non-empty.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ReliefError::invalid_config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(ReliefError::invalid_operation(format!(
            "test_size {test_size} leaves an empty partition for {n_samples} samples"
        )));
    }

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}

/// Derive an independent seed for sub-task `(a, b)` of a run seeded with `seed`.
pub fn derive_seed(seed: u64, a: u64, b: u64) -> u64 {
    let mut state = splitmix64(seed);
    state = splitmix64(state ^ a);
    splitmix64(state ^ b.rotate_left(32))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kfold_partitions_every_sample_once() {
        let folds = KFold::new(3).unwrap().with_shuffle(11).split(10).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].test.len(), 4);
        assert_eq!(folds[2].test.len(), 3);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 10);
            assert!(fold.test.iter().all(|i| !fold.train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_errors() {
        assert!(KFold::new(1).is_err());
        assert!(KFold::new(5).unwrap().split(4).is_err());
    }

    #[test]
    fn test_train_test_split() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(train_test_split(10, 0.2, 42).unwrap(), (train, test));

        assert!(train_test_split(10, 0.0, 42).is_err());
        assert!(train_test_split(1, 0.2, 42).is_err());
    }

    #[test]
    fn test_derive_seed_distinguishes_tasks() {
        let a = derive_seed(42, 0, 1);
        let b = derive_seed(42, 1, 0);
        let c = derive_seed(43, 0, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_seed(42, 0, 1));
    }
}
