//! Phase-gated customer intake for the sales assistant.
//!
//! Each turn extracts candidate values from the customer's message,
//! validates and merges them into the `CustomerRecord`, re-applies the
//! buy/lease rules, and advances through the fixed phase sequence until
//! everything the sales team needs has been collected.

pub mod collaborators;
pub mod history;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod prompts;
pub mod routes;
pub mod state;
pub mod summary;

pub use collaborators::{
    CallSettings, CollaboratorConfig, ExtractionContext, Extractor, LlmExtractor, LlmResponder,
    LlmSummarizer, Responder, ResponseContext, Summarizer,
};
pub use history::{ConversationHistory, Turn, TurnRole};
pub use merge::{FieldChange, merge};
pub use model::{CustomerRecord, Field, FieldValue, Slot};
pub use normalize::{NormalizedCandidates, RawCandidates, normalize};
pub use orchestrator::{IntakeOrchestrator, IntakeSession, TurnOutcome};
pub use policy::{RequirementTable, recompute};
pub use routes::{IntakeRouteState, intake_routes};
pub use state::{IntakePhase, IntakeState, missing_fields};
pub use summary::{SessionSummary, SummaryGenerator};
