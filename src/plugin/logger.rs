//! Structured reporting of extraction decisions
//!
//! The parser and analyzers never print. Each decision (a fallback step
//! matching or missing, a candidate being accepted or rejected, a default
//! being substituted) is handed to an [`AnalysisLogger`] trait object.

use std::sync::Mutex;
use tracing::debug;

/// One extraction decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    StepMatched {
        field: &'static str,
        step: &'static str,
        value: String,
    },
    StepMissed {
        field: &'static str,
        step: &'static str,
        reason: String,
    },
    CandidateAccepted {
        field: &'static str,
        detail: String,
    },
    CandidateRejected {
        field: &'static str,
        reason: String,
    },
    DefaultApplied {
        field: &'static str,
        value: String,
    },
}

impl AnalysisEvent {
    pub fn field(&self) -> &'static str {
        match self {
            AnalysisEvent::StepMatched { field, .. }
            | AnalysisEvent::StepMissed { field, .. }
            | AnalysisEvent::CandidateAccepted { field, .. }
            | AnalysisEvent::CandidateRejected { field, .. }
            | AnalysisEvent::DefaultApplied { field, .. } => field,
        }
    }
}

/// Sink for extraction decisions.
pub trait AnalysisLogger: Send + Sync {
    fn record(&self, event: AnalysisEvent);
}

/// Forwards every decision to `tracing` at debug level.
pub struct TracingAnalysisLogger {
    component: String,
}

impl TracingAnalysisLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl AnalysisLogger for TracingAnalysisLogger {
    fn record(&self, event: AnalysisEvent) {
        match event {
            AnalysisEvent::StepMatched { field, step, value } => {
                debug!(component = %self.component, field, step, value = %value, "Step matched");
            }
            AnalysisEvent::StepMissed { field, step, reason } => {
                debug!(component = %self.component, field, step, reason = %reason, "Step missed");
            }
            AnalysisEvent::CandidateAccepted { field, detail } => {
                debug!(component = %self.component, field, detail = %detail, "Candidate accepted");
            }
            AnalysisEvent::CandidateRejected { field, reason } => {
                debug!(component = %self.component, field, reason = %reason, "Candidate rejected");
            }
            AnalysisEvent::DefaultApplied { field, value } => {
                debug!(component = %self.component, field, value = %value, "Default applied");
            }
        }
    }
}

/// Keeps decisions in memory so callers can inspect how a result was reached.
#[derive(Default)]
pub struct RecordingAnalysisLogger {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingAnalysisLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Label of the step that produced `field`, if any step matched.
    pub fn matched_step(&self, field: &str) -> Option<&'static str> {
        self.events().into_iter().find_map(|event| match event {
            AnalysisEvent::StepMatched { field: f, step, .. } if f == field => Some(step),
            _ => None,
        })
    }

    /// Whether `field` ended up with its default value.
    pub fn defaulted(&self, field: &str) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, AnalysisEvent::DefaultApplied { field: f, .. } if *f == field))
    }
}

impl AnalysisLogger for RecordingAnalysisLogger {
    fn record(&self, event: AnalysisEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
