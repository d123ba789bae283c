//! Command implementations for the relief CLI.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::PipelineConfig;
use crate::dataset::{DataLoader, DatasetStore, DatasetSummary, JoinPolicy, LabelEncoder};
use crate::ml::persist::ModelPersister;
use crate::ml::trainer::Trainer;

/// Execute a CLI command.
pub fn execute_command(args: ReliefArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    match &args.command {
        Command::ProcessData(etl_args) => process_data(etl_args, &config, &args),
        Command::Train(train_args) => train(train_args, config, &args),
        Command::Predict(predict_args) => predict(predict_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &config, &args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn store_for(database: &Path, table: Option<&String>, config: &PipelineConfig) -> DatasetStore {
    let table = table.cloned().unwrap_or_else(|| config.etl.table_name.clone());
    DatasetStore::new(database).with_table(table)
}

/// Load, clean and persist the raw sources.
fn process_data(args: &ProcessDataArgs, config: &PipelineConfig, cli_args: &ReliefArgs) -> Result<()> {
    let start_time = Instant::now();
    let policy = if args.inner_join {
        JoinPolicy::Inner
    } else {
        config.etl.join_policy
    };

    let raw = DataLoader::new()
        .with_policy(policy)
        .load(&args.messages, &args.categories)
        .context("failed to load raw sources")?;

    let encoder = LabelEncoder::new();
    let encoded = encoder.encode(&raw).context("failed to encode categories")?;
    let rows_loaded = encoded.len();
    let cleaned = encoder.clean(encoded).context("failed to clean dataset")?;

    let store = store_for(&args.database, args.table.as_ref(), config);
    let rows_stored = store
        .save(&cleaned)
        .with_context(|| format!("failed to write {}", args.database.display()))?;

    output_result(
        "Cleaned data saved",
        &ProcessDataResult {
            database: args.database.clone(),
            table: store.table().to_string(),
            rows_loaded,
            duplicates_removed: rows_loaded - cleaned.len(),
            rows_stored,
            categories: cleaned.spec().len(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )?;
    Ok(())
}

/// Train on a stored dataset and write the artifact.
fn train(args: &TrainArgs, mut config: PipelineConfig, cli_args: &ReliefArgs) -> Result<()> {
    let start_time = Instant::now();
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    if let Some(n_jobs) = args.n_jobs {
        config.training.n_jobs = n_jobs;
    }
    if args.allow_constant_labels {
        config.training.allow_constant_labels = true;
    }

    let store = store_for(&args.database, args.table.as_ref(), &config);
    let mut trainer = Trainer::new(config.training).context("invalid training configuration")?;
    let report = trainer
        .fit_from_store(&store)
        .with_context(|| format!("training on {} failed", args.database.display()))?;
    let artifact_bytes = trainer
        .persist(&args.model)
        .with_context(|| format!("failed to save model to {}", args.model.display()))?;

    output_result(
        "Trained model saved",
        &TrainResult {
            model: args.model.clone(),
            artifact_bytes,
            params: report.params,
            best_score: report.best_score,
            cv_results: report.cv_results,
            evaluation: report.evaluation,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )?;
    Ok(())
}

/// Classify one message.
fn predict(args: &PredictArgs, cli_args: &ReliefArgs) -> Result<()> {
    let classifier = ModelPersister::load(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;
    let prediction = classifier.predict_or_default(&args.text);
    let positive = prediction.positive().into_iter().map(str::to_string).collect();

    output_result(
        "Prediction",
        &PredictResult {
            text: args.text.clone(),
            positive,
            labels: prediction,
        },
        cli_args,
    )?;
    Ok(())
}

/// Show dataset statistics.
fn show_stats(args: &StatsArgs, config: &PipelineConfig, cli_args: &ReliefArgs) -> Result<()> {
    let store = store_for(&args.database, args.table.as_ref(), config);
    let dataset = store
        .load()
        .with_context(|| format!("failed to read {}", args.database.display()))?;
    let summary = DatasetSummary::with_top_words(&dataset, args.top);

    output_result("Dataset statistics", &summary, cli_args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    const MESSAGES: &str = "id,message,original,genre\n\
1,We need water,,direct\n\
2,Please send food,,direct\n\
3,Water is needed,,news\n\
4,No food left,,social\n\
5,Drinking water please,,direct\n\
6,We are hungry and need food,,news\n\
7,Clean water needed urgently,,social\n\
8,Food supplies are gone,,direct\n\
9,The well has no water,,news\n\
10,Send rice and food,,social\n";

    const CATEGORIES: &str = "id,categories\n\
1,water-1;food-0\n\
2,water-0;food-1\n\
3,water-1;food-0\n\
4,water-0;food-1\n\
5,water-1;food-0\n\
6,water-0;food-1\n\
7,water-1;food-0\n\
8,water-0;food-1\n\
9,water-1;food-0\n\
10,water-0;food-1\n";

    #[test]
    fn test_full_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let messages = dir.path().join("messages.csv");
        let categories = dir.path().join("categories.csv");
        let database = dir.path().join("relief.db");
        let model = dir.path().join("model.bin");
        let config = dir.path().join("relief.json");
        fs::write(&messages, MESSAGES).unwrap();
        fs::write(&categories, CATEGORIES).unwrap();
        fs::write(&config, r#"{"training": {"cv_folds": 2, "n_jobs": 1}}"#).unwrap();

        let run = |argv: &[&str]| execute_command(ReliefArgs::try_parse_from(argv).unwrap());
        let q = |p: &Path| p.to_str().unwrap().to_string();
        let (messages, categories, database_arg, model_arg, config) =
            (q(&messages), q(&categories), q(&database), q(&model), q(&config));

        run(&["relief", "-q", "process-data", messages.as_str(), categories.as_str(), database_arg.as_str()]).unwrap();
        assert_eq!(DatasetStore::new(&database).load().unwrap().len(), 10);

        run(&["relief", "-q", "--config", config.as_str(), "train", database_arg.as_str(), model_arg.as_str()]).unwrap();
        assert!(model.exists());

        run(&["relief", "-q", "predict", model_arg.as_str(), "we need water"]).unwrap();
        run(&["relief", "-q", "-f", "json", "stats", database_arg.as_str()]).unwrap();
    }

    #[test]
    fn test_errors_carry_context() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReliefArgs::try_parse_from([
            "relief",
            "-q",
            "stats",
            dir.path().join("missing.db").to_str().unwrap(),
        ])
        .unwrap();
        let err = execute_command(args).unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }
}
