//! One message-response cycle of the intake conversation.
//!
//! Sessions are owned by the caller and passed in whole on every turn; the
//! orchestrator keeps no per-conversation state, so independent sessions
//! can be processed concurrently.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::IntakeError;

use super::collaborators::{
    ExtractionContext, Extractor, Responder, ResponseContext, call_with_timeout,
};
use super::history::ConversationHistory;
use super::merge::{FieldChange, merge};
use super::model::{CustomerRecord, Field};
use super::normalize::normalize;
use super::policy;
use super::state::{IntakePhase, IntakeState, missing_fields};
use super::summary::SummaryGenerator;

/// Reply when a turn fails for any reason.
pub const APOLOGY: &str =
    "I'm sorry, something went wrong on our end. Could you please send that again?";

/// Reply to a blank message.
pub const EMPTY_MESSAGE_REPLY: &str = "I didn't catch that. Could you please repeat?";

/// Reply to messages arriving after the intake has finished.
pub const ALREADY_COMPLETE_REPLY: &str = "Thank you, I already have everything I need. \
A member of our sales team will be in touch shortly.";

const CLOSING_INTRO: &str = "Thank you for your time! Here's a summary of our conversation:";

/// Everything the caller must persist between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSession {
    #[serde(default = "Uuid::new_v4")]
    pub session_id: Uuid,
    #[serde(default)]
    pub record: CustomerRecord,
    #[serde(default)]
    pub state: IntakeState,
    #[serde(default)]
    pub history: ConversationHistory,
}

impl IntakeSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            record: CustomerRecord::default(),
            state: IntakeState::default(),
            history: ConversationHistory::new(),
        }
    }

    pub fn phase(&self) -> IntakePhase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.all_information_collected
    }
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of `IntakeOrchestrator::process_message`.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text to show the customer.
    pub reply: String,
    /// The session after this turn. Identical to the input when the turn
    /// failed or was skipped.
    pub session: IntakeSession,
    /// Fields filled in by this turn.
    pub changes: Vec<FieldChange>,
    /// Phases entered during this turn.
    pub entered: Vec<IntakePhase>,
    /// Whether the turn failed and `reply` is the apology.
    pub failed: bool,
}

impl TurnOutcome {
    fn unchanged(session: IntakeSession, reply: &str, failed: bool) -> Self {
        Self {
            reply: reply.to_string(),
            session,
            changes: Vec::new(),
            entered: Vec::new(),
            failed,
        }
    }
}

struct TurnResult {
    reply: String,
    changes: Vec<FieldChange>,
    entered: Vec<IntakePhase>,
}

/// Drives the extract → normalize → merge → recompute → advance → respond
/// cycle.
pub struct IntakeOrchestrator {
    extractor: Arc<dyn Extractor>,
    responder: Arc<dyn Responder>,
    summaries: SummaryGenerator,
    knowledge: Option<String>,
    timeout: Duration,
}

impl IntakeOrchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        responder: Arc<dyn Responder>,
        summaries: SummaryGenerator,
        knowledge: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            responder,
            summaries,
            knowledge,
            timeout,
        }
    }

    pub fn summaries(&self) -> &SummaryGenerator {
        &self.summaries
    }

    /// Process one customer message.
    ///
    /// Never fails: any error is logged and turned into `APOLOGY`, with the
    /// session returned exactly as it was passed in.
    pub async fn process_message(&self, session: IntakeSession, message: &str) -> TurnOutcome {
        let message = message.trim();
        if message.is_empty() {
            return TurnOutcome::unchanged(session, EMPTY_MESSAGE_REPLY, false);
        }
        if session.is_complete() {
            return TurnOutcome::unchanged(session, ALREADY_COMPLETE_REPLY, false);
        }

        let mut working = session.clone();
        match self.run_turn(&mut working, message).await {
            Ok(turn) => TurnOutcome {
                reply: turn.reply,
                session: working,
                changes: turn.changes,
                entered: turn.entered,
                failed: false,
            },
            Err(e) => {
                error!(
                    session_id = %session.session_id,
                    phase = %session.phase(),
                    error = %e,
                    "Turn failed, replying with apology"
                );
                TurnOutcome::unchanged(session, APOLOGY, true)
            }
        }
    }

    async fn run_turn(
        &self,
        session: &mut IntakeSession,
        message: &str,
    ) -> Result<TurnResult, IntakeError> {
        let session_id = session.session_id;

        let table = policy::recompute(&mut session.record);
        session.state.validate(&session.record, &table)?;

        session.history.push_user(message);

        let ctx = ExtractionContext {
            phase: session.state.phase,
            record: &session.record,
            history: &session.history,
            message,
        };
        let raw = call_with_timeout("extraction", self.timeout, self.extractor.extract(&ctx)).await?;

        let normalized = normalize(&raw);
        let changes = merge(&mut session.record, &normalized.values)?;
        for change in &changes {
            info!(%session_id, field = %change.field, "Field collected");
        }

        let table = policy::recompute(&mut session.record);
        let mut from = session.state.phase;
        let entered = session.state.advance_while_complete(&session.record, &table);
        for phase in &entered {
            info!(%session_id, %from, to = %phase, "Phase advanced");
            from = *phase;
        }

        let reply = if session.state.all_information_collected {
            info!(%session_id, "All information collected");
            let summary = self
                .summaries
                .generate(&session.record, &session.state, &session.history)
                .await?;
            format!("{CLOSING_INTRO}\n\n{}", summary.text)
        } else {
            let missing = missing_fields(&session.record, &table, session.state.phase);
            let clarify: Vec<Field> = normalized
                .needs_clarification
                .iter()
                .copied()
                .filter(|f| session.record.is_missing(*f))
                .collect();
            let collected = session.record.filled_fields();
            let ctx = ResponseContext {
                phase: session.state.phase,
                next_field: missing.first().copied(),
                clarify: &clarify,
                collected: &collected,
                knowledge: self.knowledge.as_deref(),
                history: &session.history,
            };
            call_with_timeout("response", self.timeout, self.responder.respond(&ctx)).await?
        };

        session.history.push_assistant(&reply);
        Ok(TurnResult {
            reply,
            changes,
            entered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::intake::collaborators::Summarizer;
    use crate::intake::normalize::RawCandidates;
    use crate::intake::model::{Slot, TransactionType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Hands out one canned extraction per call.
    struct ScriptedExtractor(Mutex<Vec<serde_json::Value>>);

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        async fn extract(&self, _ctx: &ExtractionContext<'_>) -> Result<RawCandidates, LlmError> {
            let next = self.0.lock().unwrap().pop().unwrap_or_default();
            Ok(next.as_object().cloned().unwrap_or_default())
        }
    }

    /// Echoes the field it was told to ask about.
    struct EchoResponder;

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, ctx: &ResponseContext<'_>) -> Result<String, LlmError> {
            let clarify: Vec<&str> = ctx.clarify.iter().map(Field::as_str).collect();
            Ok(format!(
                "ask:{} clarify:{}",
                ctx.next_field.map(|f| f.as_str()).unwrap_or("-"),
                clarify.join(",")
            ))
        }
    }

    struct DownResponder;

    #[async_trait]
    impl Responder for DownResponder {
        async fn respond(&self, _ctx: &ResponseContext<'_>) -> Result<String, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "test".into(),
                reason: "unavailable".into(),
            })
        }
    }

    struct NoSummary;

    #[async_trait]
    impl Summarizer for NoSummary {
        async fn summarize(
            &self,
            _record: &CustomerRecord,
            _history: &ConversationHistory,
        ) -> Result<String, LlmError> {
            Ok("summary".into())
        }
    }

    fn orchestrator(
        extractions: Vec<serde_json::Value>,
        responder: impl Responder + 'static,
    ) -> IntakeOrchestrator {
        let mut script = extractions;
        script.reverse();
        IntakeOrchestrator::new(
            Arc::new(ScriptedExtractor(Mutex::new(script))),
            Arc::new(responder),
            SummaryGenerator::new(Arc::new(NoSummary), Duration::from_secs(5)),
            None,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn blank_message_leaves_session_untouched() {
        let orch = orchestrator(vec![], EchoResponder);
        let session = IntakeSession::new();
        let outcome = orch.process_message(session.clone(), "   ").await;
        assert_eq!(outcome.reply, EMPTY_MESSAGE_REPLY);
        assert_eq!(outcome.session, session);
        assert!(!outcome.failed);
    }

    #[tokio::test]
    async fn turn_appends_both_messages_and_asks_next_field() {
        let orch = orchestrator(
            vec![serde_json::json!({"first_name": "Dana", "last_name": "Reyes"})],
            EchoResponder,
        );
        let outcome = orch
            .process_message(IntakeSession::new(), "I'm Dana Reyes")
            .await;
        assert_eq!(outcome.reply, "ask:email clarify:");
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(outcome.session.history.len(), 2);
        assert_eq!(outcome.session.phase(), IntakePhase::PersonalInfo);
    }

    #[tokio::test]
    async fn ambiguous_answer_is_sent_back_for_clarification() {
        let orch = orchestrator(
            vec![serde_json::json!({"credit_rating": "somewhere between fair and good"})],
            EchoResponder,
        );
        let outcome = orch
            .process_message(IntakeSession::new(), "fair to good I think")
            .await;
        assert!(outcome.reply.ends_with("clarify:credit_rating"));
        assert_eq!(outcome.session.record.credit_rating, Slot::Unknown);
    }

    #[tokio::test]
    async fn negative_answer_leaves_field_open() {
        let orch = orchestrator(
            vec![serde_json::json!({"desired_features": "none"})],
            EchoResponder,
        );
        let outcome = orch
            .process_message(IntakeSession::new(), "no special features")
            .await;
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.session.record.desired_features, Slot::Unknown);
    }

    #[tokio::test]
    async fn failure_returns_apology_and_original_session() {
        let orch = orchestrator(
            vec![serde_json::json!({"first_name": "Dana"})],
            DownResponder,
        );
        let session = IntakeSession::new();
        let outcome = orch.process_message(session.clone(), "I'm Dana").await;
        assert_eq!(outcome.reply, APOLOGY);
        assert!(outcome.failed);
        assert_eq!(outcome.session, session);
    }

    #[tokio::test]
    async fn inconsistent_session_is_rejected_without_changes() {
        let orch = orchestrator(vec![], EchoResponder);
        let mut session = IntakeSession::new();
        session.state.phase = IntakePhase::TradeIn;
        let outcome = orch.process_message(session.clone(), "hello").await;
        assert!(outcome.failed);
        assert_eq!(outcome.session, session);
    }

    #[tokio::test]
    async fn completed_session_gets_closing_reply() {
        let orch = orchestrator(vec![], EchoResponder);
        let mut session = IntakeSession::new();
        session.state = IntakeState {
            phase: IntakePhase::TransactionDetails,
            all_information_collected: true,
        };
        let outcome = orch.process_message(session.clone(), "one more thing").await;
        assert_eq!(outcome.reply, ALREADY_COMPLETE_REPLY);
        assert_eq!(outcome.session, session);
    }

    #[tokio::test]
    async fn loaded_session_is_brought_in_line_with_policy() {
        let orch = orchestrator(vec![serde_json::json!({})], EchoResponder);
        let mut session = IntakeSession::new();
        session.record.transaction_type = Slot::Value(TransactionType::Lease);
        let outcome = orch.process_message(session, "hi").await;
        assert!(outcome.session.record.is_not_applicable(Field::PaymentMethod));
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = IntakeSession::new();
        session.record.first_name = Slot::Value("Dana".into());
        session.history.push_user("hi");
        let json = serde_json::to_value(&session).unwrap();
        let back: IntakeSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn missing_session_id_gets_a_fresh_one() {
        let session: IntakeSession = serde_json::from_str("{}").unwrap();
        assert!(!session.session_id.is_nil());
        assert_eq!(session.phase(), IntakePhase::PersonalInfo);
    }
}
