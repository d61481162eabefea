//! Chatbot configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a bot speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    /// Warm and encouraging.
    Friendly,
    /// Precise and structured.
    Professional,
    /// Dramatic and immersive.
    GameMaster,
    /// Patient and educational.
    Mentor,
    /// Stays in a fixed character.
    Character,
}

impl Personality {
    /// Lowercase label used in prompt text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::GameMaster => "game_master",
            Self::Mentor => "mentor",
            Self::Character => "character",
        }
    }

    /// Guideline line injected into the system context.
    #[must_use]
    pub fn guideline(self) -> &'static str {
        match self {
            Self::Friendly => {
                "Be warm, encouraging, and supportive. Use casual language and show enthusiasm."
            }
            Self::Professional => {
                "Be precise, informative, and business-like. Provide structured responses."
            }
            Self::GameMaster => {
                "Be creative, dramatic, and immersive. Guide players through adventures with vivid descriptions."
            }
            Self::Mentor => {
                "Be patient, educational, and encouraging. Help users learn and improve their skills."
            }
            Self::Character => {
                "Stay in character based on your role. Be consistent with your character's personality and background."
            }
        }
    }
}

/// Static configuration for one bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// Display name of the bot.
    pub name: String,
    /// How the bot speaks.
    pub personality: Personality,
    /// Base system prompt.
    pub system_prompt: String,
    /// Number of exchanges remembered when building prompts.
    pub context_memory: usize,
    /// Sampling temperature passed to the generator.
    pub temperature: f64,
    /// Token cap passed to the generator.
    pub max_tokens: u32,
    /// Extra instructions appended to the system context.
    pub custom_instructions: Option<String>,
    /// Game state surfaced to the bot, if any.
    pub game_context: Option<Map<String, Value>>,
}

impl ChatbotConfig {
    /// Creates a config with the original defaults: ten messages of
    /// memory, temperature 0.7, 500 max tokens.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        personality: Personality,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            personality,
            system_prompt: system_prompt.into(),
            context_memory: 10,
            temperature: 0.7,
            max_tokens: 500,
            custom_instructions: None,
            game_context: None,
        }
    }
}
