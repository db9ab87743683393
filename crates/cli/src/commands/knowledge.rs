//! Knowledge command handler.
//!
//! Manages the local knowledge base the retrieve stage searches.

use anyhow::Result;
use clap::{Args, Subcommand};
use sage_core::config::AppConfig;
use sage_knowledge::LearnOptions;
use std::path::PathBuf;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    /// Knowledge base name (default: agent.knowledgeBase from config)
    #[arg(short, long, global = true)]
    pub base: Option<String>,

    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Ingest documents into the knowledge base
    Learn(KnowledgeLearnCommand),
    /// Raw similarity search, without the relevance threshold
    Search(KnowledgeSearchCommand),
    /// Remove every source and chunk
    Clean,
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
}

/// Learn from files
#[derive(Args, Debug)]
pub struct KnowledgeLearnCommand {
    /// Files or directories to learn from (default: the configured data directory)
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// Reset base before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLearnCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> Result<()> {
        tracing::info!("Executing knowledge learn command for base '{}'", base);

        let paths = if self.path.is_empty() {
            vec![config.data_dir()]
        } else {
            self.path.clone()
        };

        let options = LearnOptions {
            base_name: base.to_string(),
            paths,
            reset: self.reset,
        };

        let stats = sage_knowledge::learn(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "sourcesCount": stats.sources_count,
                "skippedCount": stats.skipped_count,
                "chunksCount": stats.chunks_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} sources ({} chunks, {} bytes) in {:.2}s",
                stats.sources_count, stats.chunks_count, stats.bytes_processed, stats.duration_secs
            );
            if stats.skipped_count > 0 {
                println!("Skipped {} files", stats.skipped_count);
            }
        }

        Ok(())
    }
}

/// Search the knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeSearchCommand {
    /// Query text
    pub query: String,

    /// Number of passages to return
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeSearchCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> Result<()> {
        tracing::info!("Executing knowledge search command for base '{}'", base);

        let results =
            sage_knowledge::search(&config.workspace, base, &self.query, self.top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No passages found");
        }
        let threshold = config.agent.similarity_threshold;
        for (i, doc) in results.iter().enumerate() {
            let marker = if doc.score >= threshold { "+" } else { "-" };
            println!("{} [{}] {:.4}  {}", marker, i + 1, doc.score, doc.source);
            println!("    {}", doc.text.replace('\n', " "));
        }

        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub fn execute(&self, config: &AppConfig, base: &str) -> Result<()> {
        tracing::info!("Executing knowledge stats command for base '{}'", base);

        let stats = sage_knowledge::stats(&config.workspace, base)?;

        if self.json {
            let output = serde_json::json!({
                "base": stats.base_name,
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "lastLearnAt": stats.last_learn_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last_learn) = stats.last_learn_at {
                println!("  Last learn: {}", last_learn);
            }
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let base = self
            .base
            .as_deref()
            .unwrap_or(&config.agent.knowledge_base);

        match &self.action {
            KnowledgeAction::Learn(cmd) => cmd.execute(config, base).await,
            KnowledgeAction::Search(cmd) => cmd.execute(config, base).await,
            KnowledgeAction::Clean => {
                tracing::info!("Executing knowledge clean command for base '{}'", base);
                sage_knowledge::clean(&config.workspace, base)?;
                println!("Knowledge base '{}' cleaned", base);
                Ok(())
            }
            KnowledgeAction::Stats(cmd) => cmd.execute(config, base),
        }
    }
}
