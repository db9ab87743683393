//! In-memory stand-ins for the generation and index collaborators.

use async_trait::async_trait;
use sage_core::{AppError, AppResult};
use sage_knowledge::{ScoredDocument, VectorStore};
use sage_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted reply for one generation call.
pub enum Reply {
    Text(String),
    Fail(String),
    Panic,
}

/// Generator that replays scripted replies and records every request.
///
/// Once the script runs out it answers with `fallback`.
pub struct FakeLlm {
    replies: Mutex<VecDeque<Reply>>,
    fallback: String,
    requests: Mutex<Vec<LlmRequest>>,
}

impl FakeLlm {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: r#"{"score": 0.5, "reason": "default"}"#.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer text followed by a judge response.
    pub fn answering(answer: &str, judgment: &str) -> Self {
        Self::new(vec![
            Reply::Text(answer.to_string()),
            Reply::Text(judgment.to_string()),
        ])
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Text(content)) => Ok(response(content, &request.model)),
            Some(Reply::Fail(message)) => Err(AppError::Llm(message)),
            Some(Reply::Panic) => panic!("generator exploded"),
            None => Ok(response(self.fallback.clone(), &request.model)),
        }
    }
}

fn response(content: String, model: &str) -> LlmResponse {
    LlmResponse {
        content,
        model: model.to_string(),
        usage: LlmUsage::default(),
    }
}

/// Index returning fixed scored passages, or failing on every call.
pub struct FakeStore {
    docs: Vec<ScoredDocument>,
    fail: bool,
    calls: AtomicUsize,
    last_k: AtomicUsize,
}

impl FakeStore {
    /// One passage per score, named `doc-<n>` in the given order.
    pub fn with_scores(scores: &[f32]) -> Self {
        let docs = scores
            .iter()
            .enumerate()
            .map(|(i, score)| ScoredDocument {
                text: format!("passage {} about solar energy", i + 1),
                score: *score,
                source: format!("doc-{}", i + 1),
            })
            .collect();

        Self {
            docs,
            fail: false,
            calls: AtomicUsize::new(0),
            last_k: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_scores(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_k(&self) -> usize {
        self.last_k.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn similarity_search(&self, _query: &str, k: usize) -> AppResult<Vec<ScoredDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_k.store(k, Ordering::SeqCst);

        if self.fail {
            return Err(AppError::Retrieval("index unavailable".to_string()));
        }
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}
