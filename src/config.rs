//! Configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::intake::CollaboratorConfig;
use crate::llm::{LlmBackend, LlmConfig};

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Upper bound on each collaborator call.
    pub collaborator_timeout: Duration,
    /// Dealership knowledge text handed to the response collaborator.
    pub knowledge: Option<String>,
    pub collaborators: CollaboratorConfig,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("CAR_ASSIST_LLM_BACKEND") {
            Some(raw) => raw
                .parse::<LlmBackend>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "CAR_ASSIST_LLM_BACKEND".to_string(),
                    message,
                })?,
            None => LlmBackend::OpenAi,
        };

        let key_var = backend.api_key_var();
        let api_key = lookup(key_var)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: key_var.to_string(),
                hint: format!("export {key_var}=... before starting the service"),
            })?;

        let model = lookup("CAR_ASSIST_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string());

        let bind_raw = lookup("CAR_ASSIST_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "CAR_ASSIST_BIND".to_string(),
                message: format!("{bind_raw:?}: {e}"),
            })?;

        let timeout_secs: u64 = lookup("CAR_ASSIST_COLLABORATOR_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let knowledge = match lookup("CAR_ASSIST_KNOWLEDGE_PATH") {
            Some(path) => Some(read_knowledge(PathBuf::from(path))?),
            None => None,
        };

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            bind_addr,
            collaborator_timeout: Duration::from_secs(timeout_secs),
            knowledge,
            collaborators: CollaboratorConfig::default(),
        })
    }
}

fn read_knowledge(path: PathBuf) -> Result<String, ConfigError> {
    std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
