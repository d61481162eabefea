//! Service lifecycle: construct, wire, tear down.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use playforge_bus::{EventBus, SubscriptionHandle};
use playforge_core::clock::Clock;
use playforge_core::generate::TextGenerator;
use playforge_rules::{Rule, RuleEngine, RuleScope};
use playforge_state::StateManager;
use tracing::{debug, info};

use crate::chat_reactions::ChatMessageHandler;
use crate::rule_reactions::{AddRuleHandler, PlayerActionRulesHandler, StateChangeRulesHandler};
use crate::state_reactions::{GameCreatedHandler, PlayerActionStateHandler, SaveRequestHandler};

/// The default rules every deployment starts with.
fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "check_victory".to_owned(),
            condition: "score >= 100".to_owned(),
            action: "trigger_victory".to_owned(),
            priority: 10,
            enabled: true,
            scope: RuleScope::Global,
        },
        Rule {
            name: "check_health".to_owned(),
            condition: "health <= 0".to_owned(),
            action: "trigger_game_over".to_owned(),
            priority: 9,
            enabled: true,
            scope: RuleScope::Global,
        },
    ]
}

/// The standing subscriptions composing bus, state, rules, and chat into
/// the end-to-end coordination behavior.
///
/// Explicitly constructed at process start and injected where needed;
/// multiple coordinators over separate buses can coexist in one process
/// (each test gets its own).
pub struct Coordinator {
    bus: EventBus,
    subscriptions: Vec<SubscriptionHandle>,
    active_games: Arc<DashMap<String, String>>,
    chat: Arc<ChatMessageHandler>,
}

impl Coordinator {
    /// Seeds the default rules and registers every standing subscriber.
    #[must_use]
    pub fn start(
        bus: EventBus,
        state: Arc<StateManager>,
        rules: Arc<RwLock<RuleEngine>>,
        generator: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        {
            let mut engine = rules.write().expect("rule engine lock poisoned");
            for rule in default_rules() {
                let name = rule.name.clone();
                if engine.add_rule(rule).is_err() {
                    debug!(rule_name = %name, "default rule already present");
                }
            }
        }

        let active_games: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
        let chat = Arc::new(ChatMessageHandler::new(generator, Arc::clone(&clock)));

        let subscriptions = vec![
            bus.subscribe(
                "player.action",
                Arc::new(PlayerActionStateHandler::new(Arc::clone(&state))),
            ),
            bus.subscribe(
                "game.created",
                Arc::new(GameCreatedHandler::new(
                    Arc::clone(&state),
                    Arc::clone(&active_games),
                )),
            ),
            bus.subscribe(
                "state.save_request",
                Arc::new(SaveRequestHandler::new(
                    Arc::clone(&state),
                    Arc::clone(&clock),
                )),
            ),
            bus.subscribe(
                "state.changed",
                Arc::new(StateChangeRulesHandler::new(Arc::clone(&rules))),
            ),
            bus.subscribe(
                "player.action",
                Arc::new(PlayerActionRulesHandler::new(Arc::clone(&rules))),
            ),
            bus.subscribe("rules.add", Arc::new(AddRuleHandler::new(rules))),
            bus.subscribe(
                "chat.message_sent",
                Arc::clone(&chat) as Arc<dyn playforge_core::handler::EventHandler>,
            ),
        ];

        info!(
            subscriptions = subscriptions.len(),
            "coordination core started"
        );
        Self {
            bus,
            subscriptions,
            active_games,
            chat,
        }
    }

    /// The chat handler, for pre-configuring bots.
    #[must_use]
    pub fn chat(&self) -> &ChatMessageHandler {
        &self.chat
    }

    /// Ids of the games marked active by `game.created` events.
    #[must_use]
    pub fn active_games(&self) -> Vec<String> {
        self.active_games
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Unsubscribes every standing reaction and stops the bus, abandoning
    /// undelivered work. Persisted state is unaffected: updates commit
    /// fully or not at all.
    pub fn shutdown(self) {
        for handle in &self.subscriptions {
            self.bus.unsubscribe(handle);
        }
        self.bus.shutdown();
        info!("coordination core stopped");
    }
}
