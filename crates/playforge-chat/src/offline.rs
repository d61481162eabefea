//! Fallback generator for deployments without a generation backend.

use async_trait::async_trait;
use playforge_core::error::CoreError;
use playforge_core::generate::{GenerationParams, TextGenerator};

/// A `TextGenerator` that answers every prompt with a fixed notice.
///
/// Used when no generation backend is configured, so the chat pipeline
/// stays wired and observable instead of failing at startup.
#[derive(Debug, Clone, Default)]
pub struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, CoreError> {
        Ok("The storyteller is resting; no generation backend is configured.".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_generator_always_answers() {
        let response = OfflineGenerator
            .generate("anything", &GenerationParams::default())
            .await
            .unwrap();
        assert!(response.contains("no generation backend"));
    }
}
