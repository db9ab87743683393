//! Tests for threshold filtering in the retriever.

use super::support::FakeStore;
use crate::{
    RecordingSink, Retriever, SimilarityFilteredRetriever, WorkflowEvent, SIMILARITY_THRESHOLD,
};
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever(store: FakeStore) -> (SimilarityFilteredRetriever, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let retriever = SimilarityFilteredRetriever::new(Arc::new(store)).with_events(sink.clone());
        (retriever, sink)
    }

    #[tokio::test]
    async fn test_keeps_scores_at_or_above_threshold_in_order() {
        let (retriever, _) = retriever(FakeStore::with_scores(&[0.9, 0.6, 0.59, 0.75, 0.1]));

        let docs = retriever.search("solar benefits", 5).await;

        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["doc-1", "doc-2", "doc-4"]);
        assert!(docs.iter().all(|d| d.score >= SIMILARITY_THRESHOLD));
    }

    #[tokio::test]
    async fn test_all_below_threshold_is_empty() {
        let (retriever, sink) = retriever(FakeStore::with_scores(&[0.5, 0.4]));

        assert!(retriever.search("solar benefits", 5).await.is_empty());
        assert!(sink.events().contains(&WorkflowEvent::DocumentsFiltered {
            returned: 2,
            accepted: 0,
            threshold: SIMILARITY_THRESHOLD,
        }));
    }

    #[tokio::test]
    async fn test_empty_index_is_empty() {
        let (retriever, _) = retriever(FakeStore::with_scores(&[]));
        assert!(retriever.search("anything at all", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_absorbed() {
        let (retriever, sink) = retriever(FakeStore::failing());

        assert!(retriever.search("solar benefits", 5).await.is_empty());
        assert!(matches!(
            sink.events().as_slice(),
            [WorkflowEvent::RetrievalFailed { error }] if error.contains("index unavailable")
        ));
    }

    #[tokio::test]
    async fn test_every_candidate_is_reported() {
        let (retriever, sink) = retriever(FakeStore::with_scores(&[0.8, 0.2]));
        retriever.search("solar benefits", 5).await;

        let scored: Vec<(usize, bool)> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                WorkflowEvent::DocumentScored { rank, accepted, .. } => Some((rank, accepted)),
                _ => None,
            })
            .collect();
        assert_eq!(scored, [(1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let store = FakeStore::with_scores(&[0.9, 0.75]);
        let retriever = SimilarityFilteredRetriever::new(Arc::new(store)).with_threshold(0.8);

        assert_eq!(retriever.threshold(), 0.8);
        assert_eq!(retriever.search("solar benefits", 5).await.len(), 1);
    }
}
