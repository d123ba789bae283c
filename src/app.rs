//! Read-only application context for serving predictions.
//!
//! An [`AppContext`] is built once at startup and then shared by reference.
//! It holds the loaded classifier next to the dataset summary so a front end
//! can render statistics and classify messages without touching the store
//! again.

use std::path::Path;

use crate::dataset::{DatasetStore, DatasetSummary};
use crate::error::{ReliefError, Result};
use crate::ml::classifier::{MultiLabelClassifier, Prediction};
use crate::ml::persist::ModelPersister;

/// Classifier and dataset statistics, immutable after construction.
#[derive(Debug, Clone)]
pub struct AppContext {
    classifier: MultiLabelClassifier,
    summary: DatasetSummary,
}

impl AppContext {
    pub fn new(classifier: MultiLabelClassifier, summary: DatasetSummary) -> Self {
        AppContext { classifier, summary }
    }

    /// Load the dataset summary and the model artifact.
    ///
    /// Fails with a schema mismatch when the model was trained on a different
    /// set of categories than the stored dataset carries.
    pub fn load<P: AsRef<Path>>(store: &DatasetStore, model_path: P) -> Result<Self> {
        let dataset = store.load()?;
        let classifier = ModelPersister::load(model_path)?;
        if dataset.spec() != classifier.spec() {
            return Err(ReliefError::schema_mismatch(format!(
                "model has {} categories, dataset table '{}' has {}",
                classifier.spec().len(),
                store.table(),
                dataset.spec().len()
            )));
        }
        let summary = DatasetSummary::from_dataset(&dataset);
        log::info!(
            "Application context ready: {} messages, {} categories",
            summary.total_messages,
            classifier.spec().len()
        );
        Ok(AppContext::new(classifier, summary))
    }

    /// Classify one message; empty or unusable input yields all zeros.
    pub fn classify(&self, text: &str) -> Prediction {
        self.classifier.predict_or_default(text)
    }

    pub fn classifier(&self) -> &MultiLabelClassifier {
        &self.classifier
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::dataset::{CategorySpec, Genre, LabelVector, LabeledDataset, LabeledRow, Message};
    use crate::ml::trainer::Trainer;

    fn dataset(names: &[&str]) -> LabeledDataset {
        let spec = CategorySpec::new(names.iter().copied()).unwrap();
        let texts = [
            "We need water",
            "Clean water please",
            "No drinking water",
            "Water shortage here",
            "Bottled water needed",
            "We need food",
            "Rice and food please",
            "Hungry, no food",
            "Food supplies needed",
            "Food for children",
        ];
        let rows = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let water = u8::from(i < 5);
                let mut labels = vec![water, 1 - water];
                labels.resize(names.len(), 0);
                LabeledRow {
                    message: Message::new(i as i64, *t, Genre::Social),
                    labels: LabelVector::new(labels).unwrap(),
                }
            })
            .collect();
        LabeledDataset::new(spec, rows).unwrap()
    }

    #[test]
    fn test_load_and_classify() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path().join("relief.db"));
        let data = dataset(&["water", "food"]);
        store.save(&data).unwrap();

        let model_path = dir.path().join("model.bin");
        let mut trainer = Trainer::new(TrainingConfig {
            cv_folds: 2,
            n_jobs: 1,
            ..TrainingConfig::default()
        })
        .unwrap();
        trainer.fit(&data).unwrap();
        trainer.persist(&model_path).unwrap();

        let context = AppContext::load(&store, &model_path).unwrap();
        assert_eq!(context.summary().total_messages, 10);
        assert_eq!(context.summary().genre_count(Genre::Social), 10);
        assert!(context.classify("").iter().all(|(_, v)| v == 0));
        assert_eq!(context.classify("water").labels().len(), 2);

        let other = DatasetStore::new(dir.path().join("other.db"));
        other.save(&dataset(&["water", "food", "shelter"])).unwrap();
        assert!(matches!(
            AppContext::load(&other, &model_path),
            Err(ReliefError::SchemaMismatch(_))
        ));
    }
}
