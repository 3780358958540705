//! Ports to the language-model collaborators, plus their LLM-backed
//! implementations.
//!
//! The orchestrator only sees the `Extractor`, `Responder` and
//! `Summarizer` traits, so tests can swap in deterministic fakes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{IntakeError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};

use super::history::ConversationHistory;
use super::model::{CustomerRecord, Field};
use super::normalize::RawCandidates;
use super::prompts;
use super::state::IntakePhase;

/// Minimum length of a customer turn to be quoted in a summary.
pub const HIGHLIGHT_MIN_CHARS: usize = 10;

/// Input to the extraction step.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub phase: IntakePhase,
    pub record: &'a CustomerRecord,
    pub history: &'a ConversationHistory,
    pub message: &'a str,
}

/// Input to the response step.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub phase: IntakePhase,
    /// First missing field of the current phase.
    pub next_field: Option<Field>,
    /// Fields whose last answer was ambiguous.
    pub clarify: &'a [Field],
    /// Filled fields only.
    pub collected: &'a Map<String, Value>,
    pub knowledge: Option<&'a str>,
    pub history: &'a ConversationHistory,
}

/// Turns a customer message into raw candidate field values.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Unparseable replies yield an empty map; only transport failures are
    /// errors.
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<RawCandidates, LlmError>;
}

/// Writes the assistant's next message.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, ctx: &ResponseContext<'_>) -> Result<String, LlmError>;
}

/// Writes the closing summary for the sales team.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        record: &CustomerRecord,
        history: &ConversationHistory,
    ) -> Result<String, LlmError>;
}

/// Sampling settings for one collaborator call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CallSettings {
    fn apply(self, request: CompletionRequest) -> CompletionRequest {
        request
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// Per-collaborator sampling settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollaboratorConfig {
    pub extraction: CallSettings,
    pub response: CallSettings,
    pub summary: CallSettings,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            extraction: CallSettings {
                temperature: 0.0,
                max_tokens: 1024,
            },
            response: CallSettings {
                temperature: 0.7,
                max_tokens: 1024,
            },
            summary: CallSettings {
                temperature: 0.5,
                max_tokens: 1024,
            },
        }
    }
}

/// Await a collaborator call under `limit`, tagging failures with `stage`.
pub(crate) async fn call_with_timeout<T, F>(
    stage: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, IntakeError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(IntakeError::Collaborator { stage, source }),
        Err(_) => Err(IntakeError::CollaboratorTimeout {
            stage,
            timeout: limit,
        }),
    }
}

async fn complete_logged(
    llm: &dyn LlmProvider,
    stage: &'static str,
    request: CompletionRequest,
) -> Result<CompletionResponse, LlmError> {
    let response = llm.complete(request).await?;
    info!(
        stage,
        model = llm.model_name(),
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        cost_usd = %response.cost(llm.cost_per_token()),
        "LLM call complete"
    );
    Ok(response)
}

/// Extraction through an `LlmProvider`.
pub struct LlmExtractor {
    llm: Arc<dyn LlmProvider>,
    settings: CallSettings,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: CallSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<RawCandidates, LlmError> {
        let messages = vec![
            ChatMessage::system("You are a data extraction assistant. Output only valid JSON."),
            ChatMessage::user(prompts::extraction_prompt(ctx)),
        ];
        let request = self.settings.apply(CompletionRequest::new(messages));
        let response = match complete_logged(self.llm.as_ref(), "extraction", request).await {
            Ok(response) => response,
            Err(LlmError::InvalidResponse { provider, reason }) => {
                warn!(
                    phase = %ctx.phase,
                    %provider,
                    %reason,
                    "Extraction reply unusable, continuing with no candidates"
                );
                return Ok(RawCandidates::new());
            }
            Err(e) => return Err(e),
        };

        match prompts::parse_candidates(&response.content) {
            Some(candidates) => Ok(candidates),
            None => {
                warn!(
                    phase = %ctx.phase,
                    raw = %response.content,
                    "Extraction reply unusable, continuing with no candidates"
                );
                Ok(RawCandidates::new())
            }
        }
    }
}

/// Reply generation through an `LlmProvider`.
pub struct LlmResponder {
    llm: Arc<dyn LlmProvider>,
    settings: CallSettings,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: CallSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, ctx: &ResponseContext<'_>) -> Result<String, LlmError> {
        let mut messages = vec![ChatMessage::system(prompts::response_system_prompt(ctx))];
        messages.extend(ctx.history.to_chat_messages());
        let request = self.settings.apply(CompletionRequest::new(messages));
        let response = complete_logged(self.llm.as_ref(), "response", request).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Summary generation through an `LlmProvider`.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmProvider>,
    settings: CallSettings,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: CallSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        record: &CustomerRecord,
        history: &ConversationHistory,
    ) -> Result<String, LlmError> {
        let highlights = history.customer_highlights(HIGHLIGHT_MIN_CHARS);
        let messages = vec![
            ChatMessage::system(prompts::SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(prompts::summary_prompt(record, &highlights)),
        ];
        let request = self.settings.apply(CompletionRequest::new(messages));
        let response = complete_logged(self.llm.as_ref(), "summary", request).await?;
        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, Role};
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Returns a canned reply and records every request it receives.
    enum Canned {
        Text(String),
        Down,
        NoText,
    }

    struct CannedLlm {
        reply: Canned,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedLlm {
        fn with(reply: Canned) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn replying(text: &str) -> Arc<Self> {
            Self::with(Canned::Text(text.to_string()))
        }

        fn failing() -> Arc<Self> {
            Self::with(Canned::Down)
        }
    }

    #[async_trait]
    impl LlmProvider for CannedLlm {
        fn model_name(&self) -> &str {
            "canned"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Canned::Text(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 10,
                    output_tokens: 5,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                Canned::NoText => Err(LlmError::InvalidResponse {
                    provider: "canned".into(),
                    reason: "response contained no text".into(),
                }),
                Canned::Down => Err(LlmError::RequestFailed {
                    provider: "canned".into(),
                    reason: "offline".into(),
                }),
            }
        }
    }

    fn ctx<'a>(record: &'a CustomerRecord, history: &'a ConversationHistory) -> ExtractionContext<'a> {
        ExtractionContext {
            phase: IntakePhase::PersonalInfo,
            record,
            history,
            message: "I'm Dana Reyes",
        }
    }

    #[tokio::test]
    async fn timeout_wrapper_tags_stage() {
        let failed = call_with_timeout("response", Duration::from_secs(1), async {
            Err::<(), _>(LlmError::AuthFailed {
                provider: "openai".into(),
            })
        })
        .await;
        assert!(matches!(
            failed,
            Err(IntakeError::Collaborator {
                stage: "response",
                ..
            })
        ));

        let slow = call_with_timeout("extraction", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, LlmError>(())
        })
        .await;
        assert!(matches!(
            slow,
            Err(IntakeError::CollaboratorTimeout {
                stage: "extraction",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn extractor_parses_json_reply() {
        let llm = CannedLlm::replying(r#"{"first_name": "Dana", "last_name": "Reyes"}"#);
        let extractor = LlmExtractor::new(llm.clone(), CollaboratorConfig::default().extraction);
        let record = CustomerRecord::default();
        let history = ConversationHistory::new();

        let candidates = extractor.extract(&ctx(&record, &history)).await.unwrap();
        assert_eq!(candidates["first_name"], "Dana");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn extractor_fails_closed_on_garbage() {
        let llm = CannedLlm::replying("Sorry, I can't help with that.");
        let extractor = LlmExtractor::new(llm, CollaboratorConfig::default().extraction);
        let record = CustomerRecord::default();
        let history = ConversationHistory::new();

        let candidates = extractor.extract(&ctx(&record, &history)).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn extractor_fails_closed_on_empty_reply() {
        let extractor = LlmExtractor::new(
            CannedLlm::with(Canned::NoText),
            CollaboratorConfig::default().extraction,
        );
        let record = CustomerRecord::default();
        let history = ConversationHistory::new();

        let candidates = extractor.extract(&ctx(&record, &history)).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn extractor_surfaces_transport_errors() {
        let extractor =
            LlmExtractor::new(CannedLlm::failing(), CollaboratorConfig::default().extraction);
        let record = CustomerRecord::default();
        let history = ConversationHistory::new();
        assert!(extractor.extract(&ctx(&record, &history)).await.is_err());
    }

    #[tokio::test]
    async fn responder_sends_history_after_system_prompt() {
        let llm = CannedLlm::replying("  What's your email?  ");
        let responder = LlmResponder::new(llm.clone(), CollaboratorConfig::default().response);
        let mut history = ConversationHistory::new();
        history.push_user("Hi, I'm Dana");
        let collected = Map::new();
        let reply = responder
            .respond(&ResponseContext {
                phase: IntakePhase::PersonalInfo,
                next_field: Some(Field::Email),
                clarify: &[],
                collected: &collected,
                knowledge: None,
                history: &history,
            })
            .await
            .unwrap();
        assert_eq!(reply, "What's your email?");

        let seen = llm.seen.lock().unwrap();
        let messages = &seen[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("Hi, I'm Dana"));
        assert_eq!(seen[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn summarizer_quotes_long_customer_turns() {
        let llm = CannedLlm::replying("Summary text");
        let summarizer = LlmSummarizer::new(llm.clone(), CollaboratorConfig::default().summary);
        let mut history = ConversationHistory::new();
        history.push_user("ok");
        history.push_user("I want something with good mileage");

        let summary = summarizer
            .summarize(&CustomerRecord::default(), &history)
            .await
            .unwrap();
        assert_eq!(summary, "Summary text");

        let seen = llm.seen.lock().unwrap();
        let prompt = &seen[0].messages[1].content;
        assert!(prompt.contains("I want something with good mileage"));
        assert!(!prompt.contains("- Customer mentioned: ok"));
    }
}
