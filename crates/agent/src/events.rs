//! Typed workflow events and the sinks that receive them.

use crate::reflection::ParseTier;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Retrieve,
    Answer,
    Reflect,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Plan, Stage::Retrieve, Stage::Answer, Stage::Reflect];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Retrieve => "retrieve",
            Stage::Answer => "answer",
            Stage::Reflect => "reflect",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
    },
    PlanDecided {
        retrieve_needed: bool,
    },
    RetrievalSkipped,
    DocumentScored {
        rank: usize,
        score: f32,
        source: String,
        accepted: bool,
    },
    DocumentsFiltered {
        returned: usize,
        accepted: usize,
        threshold: f32,
    },
    RetrievalFailed {
        error: String,
    },
    AnswerGenerated {
        grounded: bool,
        context_docs: usize,
        chars: usize,
    },
    AnswerFailed {
        error: String,
    },
    ReflectionSkipped,
    ReflectionFailed {
        error: String,
    },
    ReflectionParsed {
        score: Option<f32>,
        tier: ParseTier,
        is_relevant: bool,
    },
}

/// Receiver of workflow events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StageStarted { stage } => tracing::debug!(%stage, "Stage started"),
            WorkflowEvent::StageCompleted { stage } => tracing::debug!(%stage, "Stage completed"),
            WorkflowEvent::PlanDecided { retrieve_needed } => {
                if *retrieve_needed {
                    tracing::info!("Retrieval required (factual question detected)");
                } else {
                    tracing::info!("Retrieval skipped (conversational or short query)");
                }
            }
            WorkflowEvent::RetrievalSkipped => {
                tracing::info!("Retrieval not required, skipping");
            }
            WorkflowEvent::DocumentScored {
                rank,
                score,
                source,
                accepted,
            } => tracing::debug!(rank, score, %source, accepted, "Scored candidate"),
            WorkflowEvent::DocumentsFiltered {
                returned,
                accepted,
                threshold,
            } => {
                if *accepted == 0 {
                    tracing::info!(returned, threshold, "No relevant context found");
                } else {
                    tracing::info!(returned, accepted, threshold, "Retrieved relevant documents");
                }
            }
            WorkflowEvent::RetrievalFailed { error } => {
                tracing::warn!(%error, "Retrieval failed, continuing without context");
            }
            WorkflowEvent::AnswerGenerated {
                grounded,
                context_docs,
                chars,
            } => tracing::info!(grounded, context_docs, chars, "Answer generated"),
            WorkflowEvent::AnswerFailed { error } => {
                tracing::warn!(%error, "Answer generation failed");
            }
            WorkflowEvent::ReflectionSkipped => {
                tracing::info!("Missing query or answer, skipping reflection");
            }
            WorkflowEvent::ReflectionFailed { error } => {
                tracing::warn!(%error, "Reflection call failed");
            }
            WorkflowEvent::ReflectionParsed {
                score,
                tier,
                is_relevant,
            } => {
                tracing::info!(?score, ?tier, is_relevant, "Reflection scored");
                if !is_relevant {
                    tracing::warn!("Answer may be incomplete or off-topic");
                }
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stages in the order they completed.
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WorkflowEvent::StageCompleted { stage } => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(Stage::to_string).collect();
        assert_eq!(names, ["plan", "retrieve", "answer", "reflect"]);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = WorkflowEvent::StageStarted {
            stage: Stage::Retrieve,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stage_started");
        assert_eq!(json["stage"], "retrieve");
    }

    #[test]
    fn test_tracing_sink_accepts_all_events() {
        // Must not panic without a subscriber installed
        let sink = TracingSink;
        sink.emit(&WorkflowEvent::ReflectionParsed {
            score: None,
            tier: ParseTier::Unparsed,
            is_relevant: false,
        });
        sink.emit(&WorkflowEvent::DocumentsFiltered {
            returned: 3,
            accepted: 0,
            threshold: 0.6,
        });
    }
}
