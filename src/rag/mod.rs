//! Retrieval-augmented narrative generation: the boundary traits for the
//! external model server plus the in-memory similarity cache.

pub mod engine;
pub mod ollama;

use crate::error::{MonitorError, Result};
use async_trait::async_trait;

/// Opaque text-completion service. Failures are expected and handled by
/// the orchestrator's degraded mode; implementations should just report
/// them.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Fixed-dimension text encoder. Availability is decided once at startup;
/// when absent, retrieval and embedding persistence are skipped entirely.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Narrative backend used when generation is explicitly disabled. Always
/// errors, which routes every scan through the placeholder-narrative path.
pub struct DisabledNarrative;

#[async_trait]
impl NarrativeService for DisabledNarrative {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        Err(MonitorError::Narrative(
            "narrative generation disabled".to_string(),
        ))
    }
}
