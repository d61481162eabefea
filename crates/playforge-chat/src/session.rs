//! Chat sessions: bounded history and prompt assembly.

use chrono::{DateTime, Utc};
use playforge_core::clock::Clock;
use playforge_core::error::CoreError;
use playforge_core::generate::{GenerationParams, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChatbotConfig;

/// Which side of the conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human participant.
    User,
    /// The bot.
    Bot,
}

/// One message in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender side.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
    /// The human participant's id, when known.
    pub user_id: Option<String>,
}

/// One bot's running conversation.
#[derive(Debug)]
pub struct ChatSession {
    config: ChatbotConfig,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// Creates an empty session for the given bot config.
    #[must_use]
    pub fn new(config: ChatbotConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
        }
    }

    /// Returns the recorded history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn system_context(&self) -> String {
        let game_context = self.config.game_context.as_ref().map_or_else(
            || "No active game".to_owned(),
            |ctx| serde_json::Value::Object(ctx.clone()).to_string(),
        );
        let custom = self
            .config
            .custom_instructions
            .as_deref()
            .unwrap_or("None");

        format!(
            "You are {name}, a {personality} assistant for a game platform.\n\
             \n\
             {system_prompt}\n\
             \n\
             Personality guidelines: {guideline}\n\
             \n\
             Current game context: {game_context}\n\
             \n\
             Additional instructions: {custom}\n",
            name = self.config.name,
            personality = self.config.personality.label(),
            system_prompt = self.config.system_prompt,
            guideline = self.config.personality.guideline(),
        )
    }

    fn build_prompt(&self, message: &str) -> String {
        let mut prompt = self.system_context();
        prompt.push_str("\nConversation:\n");

        let start = self.history.len().saturating_sub(self.config.context_memory);
        for entry in &self.history[start..] {
            let speaker = match entry.role {
                Role::User => "Human",
                Role::Bot => "Assistant",
            };
            prompt.push_str(speaker);
            prompt.push_str(": ");
            prompt.push_str(&entry.content);
            prompt.push('\n');
        }

        prompt.push_str("Human: ");
        prompt.push_str(message);
        prompt.push_str("\nAssistant:");
        prompt
    }

    /// Generates a response to `message` and records both sides in the
    /// history, which is then trimmed to twice the configured memory.
    ///
    /// # Errors
    ///
    /// Propagates the generator's error; on failure nothing is recorded.
    pub async fn respond(
        &mut self,
        generator: &dyn TextGenerator,
        clock: &dyn Clock,
        message: &str,
        user_id: Option<&str>,
    ) -> Result<String, CoreError> {
        let prompt = self.build_prompt(message);
        let params = GenerationParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = generator.generate(&prompt, &params).await?;
        debug!(bot = %self.config.name, history_len = self.history.len(), "chat response generated");

        self.history.push(ChatMessage {
            role: Role::User,
            content: message.to_owned(),
            timestamp: clock.now(),
            user_id: user_id.map(ToOwned::to_owned),
        });
        self.history.push(ChatMessage {
            role: Role::Bot,
            content: response.clone(),
            timestamp: clock.now(),
            user_id: None,
        });

        let cap = self.config.context_memory * 2;
        if self.history.len() > cap {
            self.history.drain(..self.history.len() - cap);
        }

        Ok(response)
    }
}
