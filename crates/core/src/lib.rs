//! Sage Core Library
//!
//! This crate provides the foundational utilities shared by every Sage crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (LLM providers and agent tuning)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AgentConfig, AppConfig};
pub use error::{AppError, AppResult};
