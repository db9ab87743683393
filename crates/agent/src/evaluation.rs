//! Batch evaluation against reference answers.

use crate::harness::Harness;
use futures::stream::{self, StreamExt};
use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One question with the answer it is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,
    pub reference_answer: String,
}

impl EvalCase {
    pub fn new(query: impl Into<String>, reference_answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reference_answer: reference_answer.into(),
        }
    }
}

/// Three renewable-energy questions used when no dataset file is given.
pub fn builtin_dataset() -> Vec<EvalCase> {
    vec![
        EvalCase::new(
            "How does renewable energy help reduce greenhouse gas emissions?",
            "Using renewable energy sources such as solar, wind, and biomass reduces CO2 and other greenhouse gases.",
        ),
        EvalCase::new(
            "What are the benefits of solar energy?",
            "Solar energy is sustainable, cost-effective, and environmentally friendly.",
        ),
        EvalCase::new(
            "Explain the advantages of wind energy for rural areas.",
            "Wind energy provides clean electricity, supports rural electrification, and reduces dependence on fossil fuels.",
        ),
    ]
}

/// Read a JSON array of `{query, reference_answer}`.
pub fn load_dataset(path: &Path) -> AppResult<Vec<EvalCase>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read dataset {}: {}", path.display(), e))
    })?;
    let cases: Vec<EvalCase> = serde_json::from_str(&content)?;
    Ok(cases)
}

/// Overlap scores, each rounded to 4 decimals.
///
/// All three are `None` when either side has no tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

impl Metric {
    const UNDEFINED: Metric = Metric {
        precision: None,
        recall: None,
        f1: None,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub query: String,
    pub generated_answer: String,
    pub reference_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Token-overlap precision, recall and F1 of `candidate` against `reference`.
///
/// Tokens are lower-cased alphanumeric runs, counted as a multiset.
pub fn token_f1(candidate: &str, reference: &str) -> Metric {
    let candidate = tokenize(candidate);
    let reference = tokenize(reference);
    if candidate.is_empty() || reference.is_empty() {
        return Metric::UNDEFINED;
    }

    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for token in &reference {
        *remaining.entry(token.as_str()).or_default() += 1;
    }

    let mut overlap = 0usize;
    for token in &candidate {
        if let Some(count) = remaining.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }

    let precision = overlap as f64 / candidate.len() as f64;
    let recall = overlap as f64 / reference.len() as f64;
    let f1 = if overlap == 0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Metric {
        precision: Some(round4(precision)),
        recall: Some(round4(recall)),
        f1: Some(round4(f1)),
    }
}

/// Run every case through the harness, at most `concurrency` at a time.
///
/// Records keep the input order. A failed run records an empty answer.
pub async fn run_batch(
    harness: &Harness,
    cases: Vec<EvalCase>,
    concurrency: usize,
) -> Vec<EvalRecord> {
    stream::iter(cases)
        .map(|case| async move {
            tracing::info!(query = %case.query, "Generating answer");
            let outcome = harness.run(&case.query).await;
            let generated_answer = outcome
                .state()
                .map(|state| state.answer().to_string())
                .unwrap_or_default();

            EvalRecord {
                query: case.query,
                generated_answer,
                reference_answer: case.reference_answer,
                metric: None,
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Fill in the metric of every record.
pub fn score_records(records: &mut [EvalRecord]) {
    for record in records.iter_mut() {
        record.metric = Some(token_f1(&record.generated_answer, &record.reference_answer));
    }
}

/// Write records as pretty-printed JSON, creating parent directories.
pub fn save_records(path: &Path, records: &[EvalRecord]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), count = records.len(), "Saved evaluation records");
    Ok(())
}
