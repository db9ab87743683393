//! The plan → retrieve → answer → reflect pipeline.

use crate::events::{EventSink, Stage, TracingSink, WorkflowEvent};
use crate::reflection::ReflectionScorer;
use crate::retriever::Retriever;
use crate::state::{AnsweredState, PlannedState, RetrievedState, SeedState, WorkflowState};
use sage_core::{AppConfig, AppError, AppResult};
use sage_llm::{LlmClient, LlmRequest};
use sage_prompt::PromptSet;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Substrings marking a conversational query that needs no context.
pub const CONVERSATIONAL_MARKERS: [&str; 5] =
    ["hello", "hi", "who are you", "your name", "thank you"];

/// Queries with fewer whitespace tokens than this skip retrieval.
pub const MIN_QUERY_TOKENS: usize = 3;

/// Answer recorded when generation fails.
pub const ANSWER_ERROR_MESSAGE: &str = "Sorry, an error occurred while generating the answer.";

/// Routing decision of the plan stage.
///
/// Markers are matched as plain substrings of the lower-cased query, so
/// "hi" also matches inside "this" or "which".
pub fn needs_retrieval(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();

    if CONVERSATIONAL_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
    {
        return false;
    }

    normalized.split_whitespace().count() >= MIN_QUERY_TOKENS
}

/// Numeric and model settings for a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    pub top_k: usize,
    pub max_context_docs: usize,
    pub relevance_threshold: f32,
    pub temperature: f32,
    pub answer_model: String,
    pub reflection_model: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_docs: 5,
            relevance_threshold: 0.7,
            temperature: 0.0,
            answer_model: "llama3.2".to_string(),
            reflection_model: "llama3.2".to_string(),
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.agent.top_k,
            max_context_docs: config.agent.max_context_docs,
            relevance_threshold: config.agent.relevance_threshold,
            temperature: config.agent.temperature,
            answer_model: config.model.clone(),
            reflection_model: config.reflection_model().to_string(),
        }
    }
}

/// A compiled, reusable pipeline.
///
/// Stages run strictly in order and never abort the run: every failure is
/// turned into a sentinel value on the state record.
pub struct Workflow {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    scorer: ReflectionScorer,
    settings: WorkflowSettings,
    events: Arc<dyn EventSink>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run all four stages for one query.
    pub async fn run(&self, query: &str) -> WorkflowState {
        let seed = SeedState::new(query);

        let planned = self.stage(Stage::Plan, async { self.plan(seed) }).await;
        let retrieved = self.stage(Stage::Retrieve, self.retrieve(planned)).await;
        let answered = self.stage(Stage::Answer, self.answer(retrieved)).await;
        self.stage(Stage::Reflect, self.reflect(answered)).await
    }

    async fn stage<T>(&self, stage: Stage, body: impl Future<Output = T>) -> T {
        self.events.emit(&WorkflowEvent::StageStarted { stage });
        let output = body.instrument(stage_span(stage)).await;
        self.events.emit(&WorkflowEvent::StageCompleted { stage });
        output
    }

    fn plan(&self, state: SeedState) -> PlannedState {
        let retrieve_needed = needs_retrieval(state.query());
        self.events
            .emit(&WorkflowEvent::PlanDecided { retrieve_needed });
        state.into_planned(retrieve_needed)
    }

    async fn retrieve(&self, state: PlannedState) -> RetrievedState {
        if !state.retrieve_needed() {
            self.events.emit(&WorkflowEvent::RetrievalSkipped);
            return state.into_retrieved(Vec::new());
        }

        let docs = self
            .retriever
            .search(state.query(), self.settings.top_k)
            .await
            .into_iter()
            .map(|doc| doc.text)
            .collect();

        state.into_retrieved(docs)
    }

    async fn answer(&self, state: RetrievedState) -> AnsweredState {
        let context = state
            .retrieved_docs()
            .iter()
            .take(self.settings.max_context_docs)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");
        let context_docs = state
            .retrieved_docs()
            .len()
            .min(self.settings.max_context_docs);

        let answer = match self.generate_answer(state.query(), &context).await {
            Ok(answer) => {
                self.events.emit(&WorkflowEvent::AnswerGenerated {
                    grounded: !context.is_empty(),
                    context_docs,
                    chars: answer.chars().count(),
                });
                answer
            }
            Err(e) => {
                self.events.emit(&WorkflowEvent::AnswerFailed {
                    error: e.to_string(),
                });
                ANSWER_ERROR_MESSAGE.to_string()
            }
        };

        state.into_answered(answer)
    }

    async fn generate_answer(&self, query: &str, context: &str) -> AppResult<String> {
        let prompt = self.prompts.render_answer(query, context)?;

        let mut request = LlmRequest::new(prompt.user, self.settings.answer_model.as_str())
            .with_temperature(self.settings.temperature);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let response = self.generator.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }

    async fn reflect(&self, state: AnsweredState) -> WorkflowState {
        let judgment = self.scorer.reflect(state.query(), state.answer()).await;
        state.into_reflected(judgment, self.settings.relevance_threshold)
    }
}

fn stage_span(stage: Stage) -> tracing::Span {
    match stage {
        Stage::Plan => tracing::info_span!("plan"),
        Stage::Retrieve => tracing::info_span!("retrieve"),
        Stage::Answer => tracing::info_span!("answer"),
        Stage::Reflect => tracing::info_span!("reflect"),
    }
}

/// Assembles a [`Workflow`]; the retriever, generator and prompts are
/// required.
#[derive(Default)]
pub struct WorkflowBuilder {
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<Arc<dyn LlmClient>>,
    prompts: Option<Arc<PromptSet>>,
    settings: WorkflowSettings,
    events: Option<Arc<dyn EventSink>>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn LlmClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn prompts(mut self, prompts: Arc<PromptSet>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults to [`TracingSink`].
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> AppResult<Workflow> {
        let retriever = self
            .retriever
            .ok_or_else(|| AppError::Workflow("no retriever configured".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| AppError::Workflow("no generator configured".to_string()))?;
        let prompts = self
            .prompts
            .ok_or_else(|| AppError::Workflow("no prompts configured".to_string()))?;

        if self.settings.top_k == 0 {
            return Err(AppError::Workflow("top_k must be at least 1".to_string()));
        }

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn EventSink>);

        let scorer = ReflectionScorer::new(
            generator.clone(),
            prompts.clone(),
            self.settings.reflection_model.clone(),
            self.settings.temperature,
            self.settings.relevance_threshold,
            events.clone(),
        );

        Ok(Workflow {
            retriever,
            generator,
            prompts,
            scorer,
            settings: self.settings,
            events,
        })
    }
}
