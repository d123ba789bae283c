//! Integration tests for training, evaluation and model artifacts.

use relief::analysis::analyzer::message::MessageAnalyzer;
use relief::config::TrainingConfig;
use relief::dataset::*;
use relief::error::{ReliefError, Result};
use relief::ml::*;

const WATER: [&str; 8] = [
    "We need water in the camp",
    "Clean drinking water please",
    "No water since the storm",
    "Water tanks are empty",
    "Bottled water needed for children",
    "The well is dry, send water",
    "Water is needed urgently",
    "Please bring water and buckets",
];

const FOOD: [&str; 8] = [
    "We need food in the camp",
    "Rice and beans please",
    "No food since the storm",
    "Food stocks are empty",
    "Hungry children need food",
    "Send food and flour",
    "Food is needed urgently",
    "Please bring food and oil",
];

/// Categories `water`, `food`, `related` and an `offer` column that is never set.
fn dataset() -> LabeledDataset {
    let spec = CategorySpec::new(["related", "water", "food", "offer"]).unwrap();
    let mut rows = Vec::new();
    for (i, text) in WATER.iter().enumerate() {
        rows.push(LabeledRow {
            message: Message::new(i as i64, *text, Genre::Direct),
            labels: LabelVector::new(vec![1, 1, 0, 0]).unwrap(),
        });
    }
    for (i, text) in FOOD.iter().enumerate() {
        rows.push(LabeledRow {
            message: Message::new(100 + i as i64, *text, Genre::News),
            labels: LabelVector::new(vec![u8::from(i < 2), 0, 1, 0]).unwrap(),
        });
    }
    LabeledDataset::new(spec, rows).unwrap()
}

fn config() -> TrainingConfig {
    TrainingConfig {
        cv_folds: 3,
        n_jobs: 2,
        allow_constant_labels: true,
        ..TrainingConfig::default()
    }
}

#[test]
fn test_artifact_reload_predicts_identically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("classifier.bin");

    let mut trainer = Trainer::new(config())?;
    trainer.fit(&dataset())?;
    trainer.persist(&path)?;
    assert_eq!(trainer.state(), PipelineState::Persisted);
    let original = trainer.into_classifier()?;

    let inputs = ["we need water", "send food", "", "storm"];
    let first = ModelPersister::load(&path)?;
    for text in inputs {
        assert_eq!(first.predict_or_default(text), original.predict_or_default(text));
    }

    // Save the reloaded model and load it once more.
    let second_path = dir.path().join("classifier-2.bin");
    ModelPersister::save(&first, &second_path)?;
    let second = ModelPersister::load(&second_path)?;
    for text in inputs {
        assert_eq!(second.predict_or_default(text), first.predict_or_default(text));
    }
    assert_eq!(second.metadata(), original.metadata());
    Ok(())
}

#[test]
fn test_zero_support_category_is_reported() -> Result<()> {
    let mut trainer = Trainer::new(config())?;
    let report = trainer.fit(&dataset())?;

    let offer = report.evaluation.category("offer").unwrap();
    assert_eq!(offer.support, 0);
    assert_eq!(offer.precision, 0.0);
    assert_eq!(offer.recall, 0.0);
    assert_eq!(offer.f1, 0.0);
    assert_eq!(report.evaluation.categories.len(), 4);
    Ok(())
}

#[test]
fn test_constant_category_fails_by_default() {
    let mut trainer = Trainer::new(TrainingConfig {
        allow_constant_labels: false,
        ..config()
    })
    .unwrap();
    let err = trainer.fit(&dataset()).unwrap_err();
    assert!(matches!(
        err,
        ReliefError::DegenerateLabel { ref category, value: 0 } if category == "offer"
    ));
    assert_eq!(trainer.state(), PipelineState::Failed);
}

#[test]
fn test_training_is_deterministic() -> Result<()> {
    let mut a = Trainer::new(config())?;
    let mut b = Trainer::new(TrainingConfig { n_jobs: 1, ..config() })?;
    let report_a = a.fit(&dataset())?;
    let report_b = b.fit(&dataset())?;

    assert_eq!(report_a.params, report_b.params);
    assert_eq!(report_a.cv_results, report_b.cv_results);
    assert_eq!(report_a.evaluation, report_b.evaluation);
    assert_eq!(
        a.classifier().unwrap().model(),
        b.classifier().unwrap().model()
    );
    Ok(())
}

#[test]
fn test_grid_results_are_ranked() -> Result<()> {
    let mut trainer = Trainer::new(TrainingConfig {
        grid: relief::config::GridConfig {
            ngram_ranges: vec![NgramRange::unigrams(), NgramRange::up_to_bigrams()],
            c_values: vec![0.5, 1.0],
        },
        ..config()
    })?;
    let report = trainer.fit(&dataset())?;

    assert_eq!(report.cv_results.len(), 4);
    assert!(report.cv_results.iter().all(|r| r.fold_scores.len() == 3));
    assert!(report.cv_results.iter().any(|r| r.rank == 1));
    let best = report
        .cv_results
        .iter()
        .map(|r| r.mean_score)
        .fold(f64::MIN, f64::max);
    assert_eq!(report.best_score, best);
    Ok(())
}

#[test]
fn test_tokenizer_determinism() -> Result<()> {
    let first = MessageAnalyzer::new()?;
    let second = MessageAnalyzer::new()?;
    let text = "Houses were destroyed; families are needing tents & water!!";

    assert_eq!(first.tokenize(text)?, first.tokenize(text)?);
    assert_eq!(first.tokenize(text)?, second.tokenize(text)?);
    assert_eq!(first.fingerprint(), second.fingerprint());
    Ok(())
}

#[test]
fn test_store_to_artifact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = DatasetStore::new(dir.path().join("relief.db"));
    store.save(&dataset())?;

    let mut trainer = Trainer::new(config())?;
    let report = trainer.fit_from_store(&store)?;
    assert_eq!(report.n_train + report.n_test, 16);

    let model = dir.path().join("model.bin");
    trainer.persist(&model)?;
    let context = relief::app::AppContext::load(&store, &model)?;
    assert_eq!(context.summary().total_messages, 16);
    assert_eq!(context.classify("   ").positive(), Vec::<&str>::new());
    Ok(())
}
