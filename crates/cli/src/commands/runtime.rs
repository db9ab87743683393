//! Wiring of configuration into a runnable harness.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sage_agent::{Harness, SimilarityFilteredRetriever, Workflow, WorkflowSettings};
use sage_core::{config::AppConfig, AppError, AppResult};
use sage_knowledge::{ScoredDocument, VectorStore};
use sage_llm::{create_client, LlmClient};
use sage_prompt::PromptSet;
use std::sync::Arc;
use std::time::Duration;

/// Stands in for a knowledge base that could not be opened, so every search
/// fails and the workflow answers zero-shot.
struct UnavailableStore {
    reason: String,
}

#[async_trait]
impl VectorStore for UnavailableStore {
    async fn similarity_search(&self, _query: &str, _k: usize) -> AppResult<Vec<ScoredDocument>> {
        Err(AppError::Retrieval(self.reason.clone()))
    }
}

/// Client for the configured generation provider.
pub fn create_generator(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.and_then(|pc| pc.endpoint());
    let timeout = provider_config
        .and_then(|pc| pc.timeout())
        .map(Duration::from_secs);
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint, api_key.as_deref(), timeout)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Failed to create '{}' client", config.provider))
}

async fn open_store(config: &AppConfig) -> Arc<dyn VectorStore> {
    let base = &config.agent.knowledge_base;
    match sage_knowledge::open_or_build(&config.workspace, base, &config.data_dir()).await {
        Ok(store) => {
            tracing::debug!(
                base = %store.base_name(),
                chunks = ?store.chunk_count().ok(),
                "Knowledge base ready"
            );
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(base = %base, error = %e, "Knowledge base unavailable");
            Arc::new(UnavailableStore {
                reason: e.to_string(),
            })
        }
    }
}

/// Build the harness for the current configuration.
///
/// Never fails: construction problems are carried by the harness and
/// reported as an error record by each run.
pub async fn build_harness(config: &AppConfig) -> Harness {
    if let Err(e) = config.validate() {
        return Harness::failed(e.to_string());
    }

    let generator = match create_generator(config) {
        Ok(generator) => generator,
        Err(e) => return Harness::failed(format!("{:#}", e)),
    };

    let prompts = match PromptSet::load(&config.workspace) {
        Ok(prompts) => Arc::new(prompts),
        Err(e) => return Harness::failed(e.to_string()),
    };

    let retriever = SimilarityFilteredRetriever::new(open_store(config).await)
        .with_threshold(config.agent.similarity_threshold);

    Harness::from_builder(
        Workflow::builder()
            .retriever(Arc::new(retriever))
            .generator(generator)
            .prompts(prompts)
            .settings(WorkflowSettings::from_config(config)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_store_fails_every_search() {
        let store = UnavailableStore {
            reason: "missing corpus".to_string(),
        };
        let err = store.similarity_search("query", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.provider = "nope".to_string();
        let err = create_generator(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("Unknown provider"));
    }
}
