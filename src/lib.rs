//! Car Sales Assist: a conversational intake service for a vehicle sales
//! team.

pub mod config;
pub mod error;
pub mod intake;
pub mod llm;

use std::sync::Arc;

use axum::Router;

use crate::config::AppConfig;
use crate::intake::{
    IntakeOrchestrator, IntakeRouteState, LlmExtractor, LlmResponder, LlmSummarizer,
    SummaryGenerator, intake_routes,
};
use crate::llm::LlmProvider;

/// Wire the LLM-backed collaborators around `llm`.
pub fn build_orchestrator(llm: Arc<dyn LlmProvider>, config: &AppConfig) -> IntakeOrchestrator {
    let settings = config.collaborators;
    let summaries = SummaryGenerator::new(
        Arc::new(LlmSummarizer::new(Arc::clone(&llm), settings.summary)),
        config.collaborator_timeout,
    );
    IntakeOrchestrator::new(
        Arc::new(LlmExtractor::new(Arc::clone(&llm), settings.extraction)),
        Arc::new(LlmResponder::new(llm, settings.response)),
        summaries,
        config.knowledge.clone(),
        config.collaborator_timeout,
    )
}

/// Build the HTTP application for `config`.
pub fn build_app(config: &AppConfig) -> error::Result<Router> {
    let llm = llm::create_provider(&config.llm)?;
    let orchestrator = build_orchestrator(llm, config);
    Ok(intake_routes(IntakeRouteState {
        orchestrator: Arc::new(orchestrator),
    }))
}
