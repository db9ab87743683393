//! Entry point that turns any failure into a result record.

use crate::state::WorkflowState;
use crate::workflow::{Workflow, WorkflowBuilder};
use futures::FutureExt;
use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Shown when a run produced no answer.
pub const NO_ANSWER: &str = "No answer generated.";

/// Reject input that should never reach the workflow.
pub fn validate_query(query: &str) -> AppResult<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("query must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// What a caller gets back from [`Harness::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    State(WorkflowState),
    Failed { error: String },
}

impl RunOutcome {
    pub fn state(&self) -> Option<&WorkflowState> {
        match self {
            RunOutcome::State(state) => Some(state),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn answer(&self) -> &str {
        self.state().map_or(NO_ANSWER, WorkflowState::answer)
    }

    pub fn reflection_score(&self) -> Option<f32> {
        self.state().and_then(WorkflowState::reflection_score)
    }

    pub fn retrieved_docs(&self) -> &[String] {
        self.state()
            .map(WorkflowState::retrieved_docs)
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunOutcome::State(_) => None,
            RunOutcome::Failed { error } => Some(error),
        }
    }
}

/// Runs a workflow without ever propagating an error or a panic.
#[derive(Clone)]
pub struct Harness {
    workflow: Result<Arc<Workflow>, String>,
}

impl Harness {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Ok(Arc::new(workflow)),
        }
    }

    /// A harness whose every run reports `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            workflow: Err(error.into()),
        }
    }

    /// Construction errors are kept and reported by every later [`run`](Self::run).
    pub fn from_builder(builder: WorkflowBuilder) -> Self {
        Self {
            workflow: builder.build().map(Arc::new).map_err(|e| e.to_string()),
        }
    }

    pub async fn run(&self, query: &str) -> RunOutcome {
        let workflow = match &self.workflow {
            Ok(workflow) => workflow,
            Err(error) => {
                tracing::error!(%error, "Workflow could not be built");
                return RunOutcome::Failed {
                    error: error.clone(),
                };
            }
        };

        tracing::info!(%query, "Running agent");

        match AssertUnwindSafe(workflow.run(query)).catch_unwind().await {
            Ok(state) => {
                tracing::info!(
                    answer = %state.answer(),
                    score = ?state.reflection_score(),
                    docs = state.retrieved_docs().len(),
                    "Run complete"
                );
                RunOutcome::State(state)
            }
            Err(payload) => {
                let error = panic_message(payload.as_ref());
                tracing::error!(%error, "Workflow panicked");
                RunOutcome::Failed { error }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "workflow panicked".to_string()
    }
}
