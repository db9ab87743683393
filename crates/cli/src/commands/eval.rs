//! Eval command handler.
//!
//! Answers a set of questions and scores each answer against a reference.

use super::runtime::build_harness;
use anyhow::{Context, Result};
use clap::Args;
use sage_agent::evaluation::{
    builtin_dataset, load_dataset, run_batch, save_records, score_records,
};
use sage_core::config::AppConfig;
use std::path::PathBuf;

/// Evaluate answers against reference answers
#[derive(Args, Debug)]
pub struct EvalCommand {
    /// JSON list of {query, reference_answer} (default: built-in renewable-energy set)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Where generated answers are written before scoring
    #[arg(long, default_value = "eval/results.json")]
    pub results: PathBuf,

    /// Where scored records are written
    #[arg(long, default_value = "eval/scored_results.json")]
    pub output: PathBuf,

    /// Number of questions answered at once
    #[arg(long, default_value = "1")]
    pub concurrency: usize,
}

impl EvalCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let cases = match &self.dataset {
            Some(path) => load_dataset(&config.workspace.join(path))
                .with_context(|| format!("Failed to load dataset {}", path.display()))?,
            None => builtin_dataset(),
        };
        tracing::info!("Evaluating {} queries", cases.len());

        let harness = build_harness(config).await;
        let mut records = run_batch(&harness, cases, self.concurrency).await;

        let results_path = config.workspace.join(&self.results);
        save_records(&results_path, &records)?;
        println!("Generated answers saved to '{}'", results_path.display());

        score_records(&mut records);
        let output_path = config.workspace.join(&self.output);
        save_records(&output_path, &records)?;

        for record in &records {
            let f1 = record
                .metric
                .and_then(|m| m.f1)
                .map_or_else(|| "n/a".to_string(), |f1| format!("{:.4}", f1));
            println!("F1 {}  {}", f1, record.query);
        }
        println!(
            "Evaluation completed for {} queries, results saved to '{}'",
            records.len(),
            output_path.display()
        );

        Ok(())
    }
}
