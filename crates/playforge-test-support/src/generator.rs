//! Test generators — mock `TextGenerator` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use playforge_core::error::CoreError;
use playforge_core::generate::{GenerationParams, TextGenerator};

/// A generator that returns canned responses in order and records every
/// prompt it was given. Returns the last response again once the script
/// is exhausted.
#[derive(Debug)]
pub struct ScriptedGenerator {
    responses: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Creates a generator with the given response script.
    ///
    /// # Panics
    ///
    /// Panics if `responses` is empty.
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        assert!(
            !responses.is_empty(),
            "ScriptedGenerator needs at least one response"
        );
        Self {
            responses,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns every prompt passed to `generate`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, CoreError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(prompt.to_owned());
        let index = (calls.len() - 1).min(self.responses.len() - 1);
        Ok(self.responses[index].clone())
    }
}

/// A generator that fails every call. Useful for testing chat error paths.
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, CoreError> {
        Err(CoreError::Delivery("generation backend unavailable".into()))
    }
}
