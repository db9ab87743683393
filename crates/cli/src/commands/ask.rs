//! Ask command handler.
//!
//! Runs one question through the self-reflective pipeline and renders the
//! answer, its relevance score and the passages it was grounded on.

use super::runtime::build_harness;
use anyhow::Result;
use clap::Args;
use sage_agent::{validate_query, RunOutcome};
use sage_core::config::AppConfig;

/// Retrieved passages are cut to this many characters in text output.
const PASSAGE_PREVIEW_CHARS: usize = 1200;

/// Ask a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Vec<String>,

    /// Output the full result record as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let question = self.question.join(" ");
        let query = match validate_query(&question) {
            Ok(query) => query,
            Err(_) => {
                tracing::warn!("Please provide a valid question.");
                return Ok(());
            }
        };

        tracing::info!("User query: {}", query);

        let harness = build_harness(config).await;
        let outcome = harness.run(query).await;

        if let Some(error) = outcome.error() {
            tracing::error!("Agent run failed: {}", error);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print!("{}", render(&outcome));
        }

        Ok(())
    }
}

/// "High" above the relevance bar, "Low" otherwise.
fn score_label(score: f32) -> &'static str {
    if score > 0.7 {
        "High"
    } else {
        "Low"
    }
}

fn preview(passage: &str) -> String {
    match passage.char_indices().nth(PASSAGE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &passage[..cut]),
        None => passage.to_string(),
    }
}

fn render(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    out.push_str("Final Answer\n");
    out.push_str(outcome.answer());
    out.push_str("\n\n");

    match outcome.reflection_score() {
        Some(score) => out.push_str(&format!(
            "Relevance & Completeness Score: {} ({})\n",
            score,
            score_label(score)
        )),
        None => out.push_str("Relevance & Completeness Score: N/A\n"),
    }
    if let Some(state) = outcome.state() {
        out.push_str(&format!("Reflection: {}\n", state.reflection()));
    }
    out.push('\n');

    let docs = outcome.retrieved_docs();
    if docs.is_empty() {
        out.push_str("No relevant documents were retrieved from the knowledge base.\n");
    } else {
        out.push_str("Retrieved Contexts\n");
        for (i, doc) in docs.iter().enumerate() {
            out.push_str(&format!("Document {}:\n{}\n\n", i + 1, preview(doc)));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_label_boundary() {
        assert_eq!(score_label(0.71), "High");
        assert_eq!(score_label(0.7), "Low");
        assert_eq!(score_label(0.0), "Low");
    }

    #[test]
    fn test_preview_truncates_long_passages() {
        let long = "é".repeat(PASSAGE_PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PASSAGE_PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));

        let exact = "a".repeat(PASSAGE_PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn test_render_failed_outcome_uses_defaults() {
        let outcome = RunOutcome::Failed {
            error: "boom".to_string(),
        };
        let text = render(&outcome);
        assert!(text.contains("No answer generated."));
        assert!(text.contains("Relevance & Completeness Score: N/A"));
        assert!(text.contains("No relevant documents"));
    }
}
