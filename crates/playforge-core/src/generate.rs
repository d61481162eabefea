//! Text generation abstraction.
//!
//! The chat collaborator consumes this trait only; the rule/state core
//! never touches it.

use async_trait::async_trait;

use crate::error::CoreError;

/// Sampling parameters for a generation call.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Sampling temperature in `[0.0, 2.0]`.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Prompt-in/text-out generative backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the prompt.
    async fn generate(&self, prompt: &str, params: &GenerationParams)
    -> Result<String, CoreError>;
}
