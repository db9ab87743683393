//! Self-reflective retrieval-augmented question answering.
//!
//! A query flows through four strictly ordered stages:
//!
//! 1. **plan**: decide whether the query needs supporting passages
//! 2. **retrieve**: similarity search, keeping only passages above a threshold
//! 3. **answer**: grounded generation, or zero-shot when nothing was retrieved
//! 4. **reflect**: the model grades its own answer; the grade is parsed into a
//!    score in `[0, 1]`
//!
//! Every failure inside a stage degrades into a well-defined value instead of
//! aborting the run. [`Harness`] wraps the workflow and converts anything that
//! still escapes into an error record.

pub mod evaluation;
pub mod events;
pub mod harness;
pub mod reflection;
pub mod retriever;
pub mod state;
pub mod workflow;

pub use evaluation::{
    builtin_dataset, load_dataset, run_batch, save_records, score_records, token_f1, EvalCase,
    EvalRecord, Metric,
};
pub use events::{EventSink, RecordingSink, Stage, TracingSink, WorkflowEvent};
pub use harness::{validate_query, Harness, RunOutcome, NO_ANSWER};
pub use reflection::{
    parse_fallback, parse_judgment, parse_structured, ParseError, ParseTier, ReflectionJudgment,
    ReflectionScorer,
};
pub use retriever::{Retriever, SimilarityFilteredRetriever, SIMILARITY_THRESHOLD};
pub use state::{AnsweredState, PlannedState, RetrievedState, SeedState, WorkflowState};
pub use workflow::{needs_retrieval, Workflow, WorkflowBuilder, WorkflowSettings};

#[cfg(test)]
mod tests;
