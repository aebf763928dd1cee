//! HTTP surface: the webhook the chat platform posts updates to, plus a
//! health check on the same path.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::bot::QueryBot;
use crate::config::ConfigError;
use crate::platform::InboundEvent;

/// Shared, read-only state. Holds the configuration error instead of a bot
/// when startup validation failed, so every update is answered with 500.
pub struct AppState {
    bot: Result<QueryBot, ConfigError>,
}

impl AppState {
    pub fn new(bot: Result<QueryBot, ConfigError>) -> Self {
        Self { bot }
    }
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Failures reported to the webhook caller as 500.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("bot is not configured: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed webhook payload: {0}")]
    MalformedBody(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error!("Webhook request failed: {}", self);
        let error = match self {
            WebhookError::Config(_) => "Server misconfigured",
            WebhookError::MalformedBody(_) => "Internal error",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health).post(receive_update))
        .route("/api/bot", get(health).post(receive_update))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health { status: "running" })
}

async fn receive_update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Ack>, WebhookError> {
    let bot = state.bot.as_ref().map_err(|e| e.clone())?;

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    debug!("Webhook update received ({} bytes)", body.len());

    let outcome = bot.handle(InboundEvent::from_json(&payload)).await;
    debug!("Update handled: {}", outcome);

    Ok(Json(Ack { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{LookupError, Package};
    use crate::reply::{self, ReplyStyle};
    use crate::testing::{RecordingSender, StubLookup};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        lookup: Arc<StubLookup>,
        sender: Arc<RecordingSender>,
    }

    fn harness(lookup: StubLookup) -> Harness {
        let lookup = Arc::new(lookup);
        let sender = Arc::new(RecordingSender::default());
        let bot = QueryBot::new(lookup.clone(), sender.clone(), ReplyStyle::Plain);
        Harness {
            app: router(Arc::new(AppState::new(Ok(bot)))),
            lookup,
            sender,
        }
    }

    fn post(path: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn text_update(text: &str) -> String {
        json!({
            "update_id": 1001,
            "message": {
                "message_id": 5,
                "chat": { "id": 42, "type": "private" },
                "text": text
            }
        })
        .to_string()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_query_is_answered_and_acknowledged() {
        let h = harness(StubLookup::found(vec![Package {
            product: "SIM A".into(),
            price: 150000.0,
        }]));

        let (status, body) = send(&h.app, post("/api/bot", text_update("5 nhật bản"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(*h.lookup.keywords.lock().await, vec!["5 nhật bản".to_string()]);
        assert_eq!(h.sender.texts().await, vec!["SIM A: 150.000đ".to_string()]);
    }

    #[tokio::test]
    async fn test_root_path_is_also_the_webhook() {
        let h = harness(StubLookup::found(Vec::new()));
        let (status, _) = send(&h.app, post("/", text_update("hello"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.sender.texts().await, vec![reply::HELP_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn test_backend_down_still_acknowledged() {
        let h = harness(StubLookup::failing(LookupError::Transport(
            "connection refused".into(),
        )));

        let (status, body) = send(&h.app, post("/api/bot", text_update("5 úc"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(
            h.sender.texts().await,
            vec![reply::CONNECTION_ERROR_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_text_update_is_acknowledged_silently() {
        let h = harness(StubLookup::found(Vec::new()));
        let update = json!({
            "update_id": 1002,
            "my_chat_member": { "chat": { "id": 42 } }
        });

        let (status, _) = send(&h.app, post("/api/bot", update.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert!(h.sender.sent.lock().await.is_empty());
        assert!(h.lookup.keywords.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_is_server_error() {
        let app = router(Arc::new(AppState::new(Err(ConfigError::MissingBotToken))));

        let (status, body) = send(&app, post("/api/bot", text_update("5 nhật bản"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Server misconfigured" }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_server_error() {
        let h = harness(StubLookup::found(Vec::new()));

        let (status, body) = send(&h.app, post("/api/bot", "{\"message\":")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal error" }));
        assert!(h.sender.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_is_health_check() {
        let h = harness(StubLookup::found(Vec::new()));
        let request = Request::builder()
            .uri("/api/bot")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "running" }));
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let h = harness(StubLookup::found(Vec::new()));
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/bot")
            .body(Body::empty())
            .unwrap();

        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response
            .headers()
            .get(header::ALLOW)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(allow.contains("POST"));
        assert!(allow.contains("GET"));
        assert!(h.sender.sent.lock().await.is_empty());
    }
}
