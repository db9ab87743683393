//! Self-evaluation of generated answers.
//!
//! The judge model is asked for `{"score": .., "reason": ..}` but is free to
//! answer in prose. Parsing tries the JSON shape first, then falls back to the
//! first number in `[0, 1]` found anywhere in the text.

use crate::events::{EventSink, WorkflowEvent};
use regex::Regex;
use sage_llm::{LlmClient, LlmRequest};
use sage_prompt::PromptSet;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Reason recorded when the query or the answer is empty.
pub const INCOMPLETE_INPUT_REASON: &str = "No reflection — incomplete input.";

/// Reason recorded when the judge call itself fails.
pub const REFLECTION_ERROR_REASON: &str = "Error during reflection.";

/// Reason recorded when structured output carries no usable reason.
pub const MISSING_REASON_PLACEHOLDER: &str = "Could not parse reflection output.";

/// Leftmost number that reads as a score: `0.x` or `1`/`1.0`.
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"0\.\d+|1(\.0+)?").unwrap());

/// Parsed judge output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectionJudgment {
    /// In `[0, 1]` when present
    pub score: Option<f32>,
    pub reason: String,
}

impl ReflectionJudgment {
    fn unscored(reason: impl Into<String>) -> Self {
        Self {
            score: None,
            reason: reason.into(),
        }
    }

    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.score.is_some_and(|score| score >= threshold)
    }

    fn clamped(mut self) -> Self {
        self.score = self.score.map(|s| s.clamp(0.0, 1.0));
        self
    }
}

/// Which parsing tier produced a judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    Structured,
    Fallback,
    Unparsed,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("score is not a finite number: {0}")]
    InvalidScore(String),

    #[error("reason is not a string")]
    InvalidReason,

    #[error("no score found in text")]
    NoScore,
}

/// Parse `{"score": <number or numeric string>, "reason": <string>}`.
///
/// A missing score counts as `0.0`; a boolean score as `1.0` or `0.0`. A missing or blank reason becomes
/// [`MISSING_REASON_PLACEHOLDER`]. The score is not clamped here.
pub fn parse_structured(raw: &str) -> Result<ReflectionJudgment, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let score = match object.get("score") {
        None => 0.0,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ParseError::InvalidScore(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidScore(s.clone()))?,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(other) => return Err(ParseError::InvalidScore(other.to_string())),
    };
    if !score.is_finite() {
        return Err(ParseError::InvalidScore(score.to_string()));
    }

    let reason = match object.get("reason") {
        None => "",
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(ParseError::InvalidReason),
    };
    let reason = if reason.is_empty() {
        MISSING_REASON_PLACEHOLDER
    } else {
        reason
    };

    Ok(ReflectionJudgment {
        score: Some(score as f32),
        reason: reason.to_string(),
    })
}

/// Take the leftmost score-like number in free text; the reason is the
/// whole text.
pub fn parse_fallback(raw: &str) -> Result<ReflectionJudgment, ParseError> {
    let found = SCORE_RE.find(raw).ok_or(ParseError::NoScore)?;
    let score = found
        .as_str()
        .parse::<f32>()
        .map_err(|_| ParseError::InvalidScore(found.as_str().to_string()))?;

    Ok(ReflectionJudgment {
        score: Some(score),
        reason: raw.to_string(),
    })
}

/// Trim, try both tiers in order and clamp the result into `[0, 1]`.
///
/// Never fails: text with no recognizable score yields `score: None` with the
/// text itself as the reason.
pub fn parse_judgment(raw: &str) -> (ReflectionJudgment, ParseTier) {
    let raw = raw.trim();

    let (judgment, tier) = match parse_structured(raw) {
        Ok(judgment) => (judgment, ParseTier::Structured),
        Err(structured_err) => {
            tracing::debug!(error = %structured_err, "Reflection output is not structured");
            match parse_fallback(raw) {
                Ok(judgment) => (judgment, ParseTier::Fallback),
                Err(_) => (ReflectionJudgment::unscored(raw), ParseTier::Unparsed),
            }
        }
    };

    (judgment.clamped(), tier)
}

/// Asks the judge model to grade an answer.
pub struct ReflectionScorer {
    generator: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    temperature: f32,
    relevance_threshold: f32,
    events: Arc<dyn EventSink>,
}

impl ReflectionScorer {
    pub fn new(
        generator: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: impl Into<String>,
        temperature: f32,
        relevance_threshold: f32,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            generator,
            prompts,
            model: model.into(),
            temperature,
            relevance_threshold,
            events,
        }
    }

    /// Grade `answer` as a response to `query`.
    ///
    /// Empty input skips the model call; a failed call yields an unscored
    /// judgment. Neither case is an error.
    pub async fn reflect(&self, query: &str, answer: &str) -> ReflectionJudgment {
        if query.is_empty() || answer.is_empty() {
            self.events.emit(&WorkflowEvent::ReflectionSkipped);
            return ReflectionJudgment::unscored(INCOMPLETE_INPUT_REASON);
        }

        let raw = match self.call_judge(query, answer).await {
            Ok(raw) => raw,
            Err(error) => {
                self.events.emit(&WorkflowEvent::ReflectionFailed { error });
                return ReflectionJudgment::unscored(REFLECTION_ERROR_REASON);
            }
        };

        let (judgment, tier) = parse_judgment(&raw);
        self.events.emit(&WorkflowEvent::ReflectionParsed {
            score: judgment.score,
            tier,
            is_relevant: judgment.is_relevant(self.relevance_threshold),
        });

        judgment
    }

    async fn call_judge(&self, query: &str, answer: &str) -> Result<String, String> {
        let prompt = self
            .prompts
            .render_reflection(query, answer)
            .map_err(|e| e.to_string())?;

        let mut request =
            LlmRequest::new(prompt.user, self.model.as_str()).with_temperature(self.temperature);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let response = self
            .generator
            .complete(&request)
            .await
            .map_err(|e| e.to_string())?;

        Ok(response.content)
    }
}
