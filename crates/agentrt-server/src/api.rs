//! `POST /v1/turns` and `GET /v1/turns/{turn_id}` — the two contract
//! endpoints. Grounded on the gateway's `api/runs.rs` handler shape
//! (`State`/`Path` extractors, `serde_json::json!` response bodies,
//! 404-as-`Json` rather than a bare status code).

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use agentrt_domain::tool::Message;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    Router::new()
        .route("/v1/turns", post(start_turn))
        .route("/v1/turns/:turn_id", get(get_turn))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StartTurnRequest {
    pub user_message: Message,
    pub personality_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

async fn start_turn(State(state): State<AppState>, Json(req): Json<StartTurnRequest>) -> impl IntoResponse {
    match state
        .turn_manager
        .start_turn(req.user_message, req.personality_id, req.session_id, req.metadata, req.turn_id)
        .await
    {
        Ok((turn_id, trace_id)) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"turn_id": turn_id, "trace_id": trace_id})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"detail": e.to_string()})),
        )
            .into_response(),
    }
}

async fn get_turn(State(state): State<AppState>, Path(turn_id): Path<Uuid>) -> impl IntoResponse {
    match state.context.get_turn(turn_id).await {
        Some(turn) => Json(serde_json::json!(turn)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"detail": "turn not found"})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_turn_request_defaults_optional_fields() {
        let body = serde_json::json!({
            "personality_id": "default",
            "user_message": {"role": "user", "content": "hi"},
        });
        let req: StartTurnRequest = serde_json::from_value(body).unwrap();
        assert!(req.session_id.is_none());
        assert!(req.turn_id.is_none());
        assert!(req.metadata.is_empty());
        assert_eq!(req.user_message.content.text(), Some("hi"));
    }

    #[test]
    fn start_turn_request_parses_full_body() {
        let turn_id = Uuid::new_v4();
        let body = serde_json::json!({
            "user_message": {"role": "user", "content": "hi"},
            "personality_id": "default",
            "session_id": "s1",
            "turn_id": turn_id,
            "metadata": {"k": "v"},
        });
        let req: StartTurnRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.session_id.as_deref(), Some("s1"));
        assert_eq!(req.turn_id, Some(turn_id));
        assert_eq!(req.metadata.get("k").and_then(|v| v.as_str()), Some("v"));
    }
}
