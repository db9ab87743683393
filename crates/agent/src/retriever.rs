//! Similarity search gated by a relevance threshold.

use crate::events::{EventSink, TracingSink, WorkflowEvent};
use async_trait::async_trait;
use sage_knowledge::{ScoredDocument, VectorStore};
use std::sync::Arc;

/// Minimum similarity for a passage to count as relevant.
pub const SIMILARITY_THRESHOLD: f32 = 0.6;

/// Source of supporting passages for the answer stage.
///
/// Implementations absorb their own failures: a broken index yields no
/// passages rather than an error.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument>;
}

/// Runs a top-k search and keeps the passages scoring at least the
/// threshold, in the store's ranking order.
pub struct SimilarityFilteredRetriever {
    store: Arc<dyn VectorStore>,
    threshold: f32,
    events: Arc<dyn EventSink>,
}

impl SimilarityFilteredRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            threshold: SIMILARITY_THRESHOLD,
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[async_trait]
impl Retriever for SimilarityFilteredRetriever {
    async fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        let candidates = match self.store.similarity_search(query, k).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.events.emit(&WorkflowEvent::RetrievalFailed {
                    error: e.to_string(),
                });
                return Vec::new();
            }
        };

        let returned = candidates.len();
        let mut accepted = Vec::with_capacity(returned);

        for (rank, doc) in candidates.into_iter().enumerate() {
            let keep = doc.score >= self.threshold;
            self.events.emit(&WorkflowEvent::DocumentScored {
                rank: rank + 1,
                score: doc.score,
                source: doc.source.clone(),
                accepted: keep,
            });
            if keep {
                accepted.push(doc);
            }
        }

        self.events.emit(&WorkflowEvent::DocumentsFiltered {
            returned,
            accepted: accepted.len(),
            threshold: self.threshold,
        });

        accepted
    }
}
