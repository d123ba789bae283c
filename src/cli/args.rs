//! Command line argument parsing for the relief CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dataset::summary::DEFAULT_TOP_WORDS;

/// Relief - multi-label triage of disaster-response messages
#[derive(Parser, Debug, Clone)]
#[command(name = "relief")]
#[command(about = "Clean disaster-response messages, train per-category classifiers and classify new messages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ReliefArgs {
    /// Verbosity level (-v warnings, -vv info, -vvv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ReliefArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to warnings
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load, clean and store the raw message and category sources
    ///
    /// Messages are left-joined to categories by id. Encoding needs labels for
    /// every kept message, so a single message without a category row fails the
    /// whole run; pass --inner-join to drop such messages instead.
    #[command(name = "process-data")]
    ProcessData(ProcessDataArgs),

    /// Train the classifier on a stored dataset
    Train(TrainArgs),

    /// Classify a message with a trained model
    Predict(PredictArgs),

    /// Show statistics of a stored dataset
    Stats(StatsArgs),
}

/// Arguments for the ETL step
#[derive(Parser, Debug, Clone)]
pub struct ProcessDataArgs {
    /// Messages CSV (id, message, original, genre)
    #[arg(value_name = "MESSAGES")]
    pub messages: PathBuf,

    /// Categories CSV (id, categories)
    #[arg(value_name = "CATEGORIES")]
    pub categories: PathBuf,

    /// SQLite database to write
    #[arg(value_name = "DATABASE")]
    pub database: PathBuf,

    /// Table name (defaults to the configured table)
    #[arg(long)]
    pub table: Option<String>,

    /// Drop messages without a category row (the default left join fails on them)
    #[arg(long)]
    pub inner_join: bool,
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// SQLite database holding the cleaned dataset
    #[arg(value_name = "DATABASE")]
    pub database: PathBuf,

    /// Path of the model artifact to write
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Table name (defaults to the configured table)
    #[arg(long)]
    pub table: Option<String>,

    /// Seed for splitting, shuffling and solver permutations
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads for the grid search (0 = one per CPU)
    #[arg(short = 'j', long)]
    pub n_jobs: Option<usize>,

    /// Fit constant predictors for categories that never vary
    #[arg(long)]
    pub allow_constant_labels: bool,
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// Model artifact
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Message to classify
    #[arg(value_name = "TEXT")]
    pub text: String,
}

/// Arguments for dataset statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// SQLite database holding the cleaned dataset
    #[arg(value_name = "DATABASE")]
    pub database: PathBuf,

    /// Table name (defaults to the configured table)
    #[arg(long)]
    pub table: Option<String>,

    /// Number of most frequent words to show
    #[arg(long, default_value_t = DEFAULT_TOP_WORDS)]
    pub top: usize,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_process_data_help_explains_join_failure() {
        let mut command = ReliefArgs::command();
        let help = command
            .find_subcommand_mut("process-data")
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("fails"));
        assert!(help.contains("--inner-join"));
    }

    #[test]
    fn test_process_data_command() {
        let args = ReliefArgs::try_parse_from([
            "relief",
            "process-data",
            "messages.csv",
            "categories.csv",
            "relief.db",
            "--inner-join",
        ])
        .unwrap();

        if let Command::ProcessData(etl) = args.command {
            assert_eq!(etl.messages, PathBuf::from("messages.csv"));
            assert_eq!(etl.categories, PathBuf::from("categories.csv"));
            assert_eq!(etl.database, PathBuf::from("relief.db"));
            assert!(etl.inner_join);
            assert_eq!(etl.table, None);
        } else {
            panic!("Expected ProcessData command");
        }
    }

    #[test]
    fn test_train_command() {
        let args = ReliefArgs::try_parse_from([
            "relief", "train", "relief.db", "model.bin", "--seed", "7", "-j", "4",
        ])
        .unwrap();

        if let Command::Train(train) = args.command {
            assert_eq!(train.model, PathBuf::from("model.bin"));
            assert_eq!(train.seed, Some(7));
            assert_eq!(train.n_jobs, Some(4));
            assert!(!train.allow_constant_labels);
        } else {
            panic!("Expected Train command");
        }
    }

    #[test]
    fn test_wrong_argument_count() {
        assert!(ReliefArgs::try_parse_from(["relief", "process-data", "messages.csv"]).is_err());
        assert!(ReliefArgs::try_parse_from(["relief", "train", "relief.db"]).is_err());
        assert!(
            ReliefArgs::try_parse_from(["relief", "train", "a.db", "m.bin", "extra"]).is_err()
        );
        assert!(ReliefArgs::try_parse_from(["relief"]).is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = ReliefArgs::try_parse_from(["relief", "stats", "relief.db"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = ReliefArgs::try_parse_from(["relief", "-vv", "stats", "relief.db"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = ReliefArgs::try_parse_from(["relief", "stats", "relief.db", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_global_options() {
        let args = ReliefArgs::try_parse_from([
            "relief",
            "--format",
            "json",
            "--config",
            "relief.json",
            "predict",
            "model.bin",
            "we need water",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.config, Some(PathBuf::from("relief.json")));
        if let Command::Predict(predict) = args.command {
            assert_eq!(predict.text, "we need water");
        } else {
            panic!("Expected Predict command");
        }

        let args = ReliefArgs::try_parse_from(["relief", "stats", "relief.db", "--top", "3"]).unwrap();
        if let Command::Stats(stats) = args.command {
            assert_eq!(stats.top, 3);
        } else {
            panic!("Expected Stats command");
        }
    }
}
