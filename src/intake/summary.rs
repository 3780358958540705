//! Closing summary for the sales team.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::error::IntakeError;

use super::collaborators::{Summarizer, call_with_timeout};
use super::history::ConversationHistory;
use super::model::{CustomerRecord, Field};
use super::policy;
use super::state::{IntakePhase, IntakeState, join_fields, missing_fields};

/// Result of a summary request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub text: String,
    pub is_complete: bool,
    /// Fields still to collect, empty for a complete session.
    pub missing: Vec<Field>,
}

/// Produces the closing summary, or an incomplete-session report when the
/// intake has not finished.
pub struct SummaryGenerator {
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(summarizer: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self {
            summarizer,
            timeout,
        }
    }

    /// Fails with `InvariantViolation` when `state` disagrees with `record`.
    pub async fn generate(
        &self,
        record: &CustomerRecord,
        state: &IntakeState,
        history: &ConversationHistory,
    ) -> Result<SessionSummary, IntakeError> {
        let mut record = record.clone();
        let table = policy::recompute(&mut record);
        state.validate(&record, &table)?;

        if !state.all_information_collected {
            return Ok(incomplete_report(&record, state));
        }

        info!(turns = history.len(), "Generating closing summary");
        let text = call_with_timeout(
            "summary",
            self.timeout,
            self.summarizer.summarize(&record, history),
        )
        .await?;
        Ok(SessionSummary {
            text,
            is_complete: true,
            missing: Vec::new(),
        })
    }
}

/// List what is still missing from the current phase onward.
pub fn incomplete_report(record: &CustomerRecord, state: &IntakeState) -> SessionSummary {
    let mut record = record.clone();
    let table = policy::recompute(&mut record);

    let mut lines = Vec::new();
    let mut missing = Vec::new();
    for phase in IntakePhase::ALL.into_iter().filter(|p| *p >= state.phase) {
        let gaps = missing_fields(&record, &table, phase);
        if gaps.is_empty() {
            continue;
        }
        lines.push(format!("- {phase}: {}", join_fields(&gaps)));
        missing.extend(gaps);
    }

    let text = if lines.is_empty() {
        format!(
            "Conversation incomplete (current phase: {}). No required fields are outstanding yet.",
            state.phase
        )
    } else {
        format!(
            "Conversation incomplete (current phase: {}). Still missing:\n{}",
            state.phase,
            lines.join("\n")
        )
    };

    SessionSummary {
        text,
        is_complete: false,
        missing,
    }
}
