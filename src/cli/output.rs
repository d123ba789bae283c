//! Output formatting for CLI commands.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ReliefArgs};
use crate::error::Result;
use crate::ml::classifier::Prediction;
use crate::ml::evaluation::EvaluationReport;
use crate::ml::grid_search::{CvResult, ParamSet};

/// Result structure for the ETL step.
#[derive(Debug, Serialize)]
pub struct ProcessDataResult {
    pub database: PathBuf,
    pub table: String,
    pub rows_loaded: usize,
    pub duplicates_removed: usize,
    pub rows_stored: usize,
    pub categories: usize,
    pub duration_ms: u64,
}

impl fmt::Display for ProcessDataResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database:            {}", self.database.display())?;
        writeln!(f, "Table:               {}", self.table)?;
        writeln!(f, "Rows loaded:         {}", self.rows_loaded)?;
        writeln!(f, "Duplicates removed:  {}", self.duplicates_removed)?;
        writeln!(f, "Rows stored:         {}", self.rows_stored)?;
        writeln!(f, "Categories:          {}", self.categories)?;
        writeln!(f, "Duration:            {} ms", self.duration_ms)
    }
}

/// Result structure for training.
#[derive(Debug, Serialize)]
pub struct TrainResult {
    pub model: PathBuf,
    pub artifact_bytes: usize,
    pub params: ParamSet,
    pub best_score: f64,
    pub cv_results: Vec<CvResult>,
    pub evaluation: EvaluationReport,
    pub duration_ms: u64,
}

impl fmt::Display for TrainResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Grid search:")?;
        for result in &self.cv_results {
            writeln!(
                f,
                "  #{:<3} {:<28} mean {:.4}  std {:.4}",
                result.rank, result.params, result.mean_score, result.std_score
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Selected {} (cv score {:.4})", self.params, self.best_score)?;
        writeln!(f)?;
        write!(f, "{}", self.evaluation)?;
        writeln!(f)?;
        writeln!(
            f,
            "Saved {} ({} bytes) in {} ms",
            self.model.display(),
            self.artifact_bytes,
            self.duration_ms
        )
    }
}

/// Result structure for a single prediction.
#[derive(Debug, Serialize)]
pub struct PredictResult {
    pub text: String,
    pub positive: Vec<String>,
    pub labels: Prediction,
}

impl fmt::Display for PredictResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive.is_empty() {
            writeln!(f, "No categories")?;
        } else {
            writeln!(f, "Categories: {}", self.positive.join(", "))?;
        }
        writeln!(f)?;
        write!(f, "{}", self.labels)
    }
}

/// Output a result on stdout in the selected format.
pub fn output_result<T>(message: &str, result: &T, args: &ReliefArgs) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, message, result, args.output_format, args.verbosity())
}

/// Write a result in the given format.
pub fn write_result<W, T>(
    out: &mut W,
    message: &str,
    result: &T,
    format: OutputFormat,
    verbosity: u8,
) -> Result<()>
where
    W: Write,
    T: Serialize + fmt::Display,
{
    match format {
        OutputFormat::Human => {
            if verbosity > 0 {
                writeln!(out, "{message}")?;
                writeln!(out)?;
            }
            write!(out, "{result}")?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CategorySpec, LabelVector};

    fn predict_result() -> PredictResult {
        let spec = CategorySpec::new(["water", "food"]).unwrap();
        PredictResult {
            text: "we need water".to_string(),
            positive: vec!["water".to_string()],
            labels: Prediction::new(&spec, LabelVector::new(vec![1, 0]).unwrap()),
        }
    }

    #[test]
    fn test_human_output() {
        let mut buf = Vec::new();
        write_result(&mut buf, "Prediction", &predict_result(), OutputFormat::Human, 1).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Prediction\n"));
        assert!(text.contains("Categories: water"));

        let mut quiet = Vec::new();
        write_result(&mut quiet, "Prediction", &predict_result(), OutputFormat::Human, 0).unwrap();
        assert!(!String::from_utf8(quiet).unwrap().contains("Prediction\n"));
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_result(&mut buf, "Prediction", &predict_result(), OutputFormat::Json, 1).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["positive"][0], "water");
        assert_eq!(value["labels"]["water"], 1);
        assert_eq!(value["labels"]["food"], 0);
    }
}
