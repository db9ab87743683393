//! Command handlers for the Sage CLI.

pub mod ask;
pub mod eval;
pub mod knowledge;
pub mod runtime;

pub use ask::AskCommand;
pub use eval::EvalCommand;
pub use knowledge::KnowledgeCommand;
