//! Standing reaction wiring chat messages to the generation backend.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use playforge_chat::{ChatSession, ChatbotConfig, Personality};
use playforge_core::clock::Clock;
use playforge_core::error::CoreError;
use playforge_core::event::{ChatMessageReceivedPayload, EventPayload, GameEvent};
use playforge_core::generate::TextGenerator;
use playforge_core::handler::EventHandler;
use tokio::sync::Mutex;
use tracing::debug;

const SOURCE: &str = "chat_service";

const DEFAULT_SYSTEM_PROMPT: &str =
    "Help players and creators with their game. Keep responses engaging and concise.";

/// Responds to `chat.message_sent` events with generated text.
///
/// Sessions are created per bot on first contact; bots can be configured
/// ahead of time with [`configure_bot`](Self::configure_bot).
pub struct ChatMessageHandler {
    generator: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, Arc<Mutex<ChatSession>>>,
}

impl ChatMessageHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            generator,
            clock,
            sessions: DashMap::new(),
        }
    }

    /// Registers a bot with an explicit configuration, replacing any
    /// existing session for that bot.
    pub fn configure_bot(&self, bot_id: impl Into<String>, config: ChatbotConfig) {
        self.sessions
            .insert(bot_id.into(), Arc::new(Mutex::new(ChatSession::new(config))));
    }

    fn session(&self, bot_id: &str) -> Arc<Mutex<ChatSession>> {
        Arc::clone(
            &self
                .sessions
                .entry(bot_id.to_owned())
                .or_insert_with(|| {
                    let config = ChatbotConfig::new(
                        bot_id,
                        Personality::GameMaster,
                        DEFAULT_SYSTEM_PROMPT,
                    );
                    Arc::new(Mutex::new(ChatSession::new(config)))
                }),
        )
    }
}

#[async_trait]
impl EventHandler for ChatMessageHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::ChatMessageSent(payload) = &event.payload else {
            return Ok(Vec::new());
        };

        let session = self.session(&payload.bot_id);
        let response = session
            .lock()
            .await
            .respond(
                self.generator.as_ref(),
                self.clock.as_ref(),
                &payload.message,
                event.envelope.player_id.as_deref(),
            )
            .await?;
        debug!(bot_id = %payload.bot_id, "chat response produced");

        let mut follow_up = GameEvent::new(
            SOURCE,
            self.clock.now(),
            EventPayload::ChatMessageReceived(ChatMessageReceivedPayload {
                bot_id: payload.bot_id.clone(),
                message: payload.message.clone(),
                response,
            }),
        );
        if let Some(game_id) = &event.envelope.game_id {
            follow_up = follow_up.with_game_id(game_id.clone());
        }
        if let Some(player_id) = &event.envelope.player_id {
            follow_up = follow_up.with_player_id(player_id.clone());
        }
        Ok(vec![follow_up])
    }
}
