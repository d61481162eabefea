//! Routes for rule registration.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use playforge_core::event::{EventPayload, GameEvent, RuleSpec};

use crate::error::ApiError;
use crate::state::AppState;

const SOURCE: &str = "api";

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct AddRuleRequest {
    /// The rule to register.
    pub rule: RuleSpec,
}

/// Response body returned after the rule event is published.
#[derive(Debug, Serialize)]
pub struct AddRuleResponse {
    /// Id of the published `rules.add` event.
    pub event_id: Uuid,
}

/// POST /
#[instrument(skip(state, request), fields(rule_name = %request.rule.name))]
async fn add_rule(
    State(state): State<AppState>,
    Json(request): Json<AddRuleRequest>,
) -> Result<Json<AddRuleResponse>, ApiError> {
    let game_id = request.rule.game_id.clone();
    let mut event = GameEvent::new(
        SOURCE,
        state.clock.now(),
        EventPayload::RuleAdd(request.rule),
    );
    if let Some(game_id) = game_id {
        event = event.with_game_id(game_id);
    }

    let event_id = event.envelope.event_id;
    info!(%event_id, "publishing rules.add");
    state.bus.publish(event)?;

    Ok(Json(AddRuleResponse { event_id }))
}

/// Returns the router for rule registration.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(add_rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::routes::test_support::app_state;

    #[tokio::test]
    async fn test_add_rule_returns_event_id() {
        // Arrange
        let app = router().with_state(app_state());
        let body = json!({
            "rule": {
                "name": "strong",
                "condition": "stats.strength >= 15",
                "action": "celebrate",
                "priority": 5,
            }
        });
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        // Act
        let response = app.oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        Uuid::parse_str(json["event_id"].as_str().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_rule_without_condition_returns_422() {
        // Arrange
        let app = router().with_state(app_state());
        let body = json!({"rule": {"name": "broken"}});
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        // Act
        let response = app.oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
