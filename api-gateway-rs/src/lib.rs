use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use config_rs::BackendSettings;
use explainer::{ActionKind, ExplanationService, LlmError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize};
use sysmon_events::{Collection, Event, EventStore, MISSING_MESSAGE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod error;

pub use error::{ApiError, ErrorResponse, AI_FAILURE_MESSAGE};

pub const DEFAULT_PORT: u16 = 8282;

/// Largest accepted request body
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Explanation request body.
///
/// Both fields may be absent or null: a missing action explains with the generic
/// instruction and a missing log with a placeholder message.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default, deserialize_with = "nullable_action")]
    pub action: ActionKind,
    #[serde(default = "missing_log", deserialize_with = "nullable_log")]
    pub log: Event,
}

fn missing_log() -> Event {
    Event::with_message(MISSING_MESSAGE)
}

fn nullable_action<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActionKind, D::Error> {
    Ok(Option::<ActionKind>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_log<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Event, D::Error> {
    Ok(Option::<Event>::deserialize(deserializer)?.unwrap_or_else(missing_log))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllEventsResponse {
    pub benign: Vec<Event>,
    pub malicious: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionsResponse {
    pub collection: Collection,
    pub actions: Vec<ActionKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: u64,
    pub status: String,
}

/// Shared gateway state.
///
/// The explanation service is built on first use and kept for the life of the
/// process. A failed build is not cached, so setting the credential later recovers
/// without a restart.
pub struct AppState {
    store: EventStore,
    settings: BackendSettings,
    explainer: OnceCell<Arc<ExplanationService>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(store: EventStore, settings: BackendSettings) -> Self {
        Self {
            store,
            settings,
            explainer: OnceCell::new(),
            started_at: Instant::now(),
        }
    }

    /// State with an already constructed explanation service
    pub fn with_explainer(store: EventStore, explainer: Arc<ExplanationService>) -> Self {
        Self {
            store,
            settings: BackendSettings::default(),
            explainer: OnceCell::with_value(explainer),
            started_at: Instant::now(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EventStore::from_env(), BackendSettings::from_env())
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn backend_configured(&self) -> bool {
        self.explainer.get().is_some() || self.settings.has_credential()
    }

    fn explainer(&self) -> Result<Arc<ExplanationService>, LlmError> {
        self.explainer
            .get_or_try_init(|| ExplanationService::from_settings(&self.settings).map(Arc::new))
            .cloned()
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/api/logs", get(Self::all_logs_handler))
            .route("/api/logs/:collection", get(Self::logs_handler))
            .route("/api/actions/:collection", get(Self::actions_handler))
            .route("/api/ai/analyze", post(Self::analyze_handler))
            .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    async fn root_handler() -> impl IntoResponse {
        Json(serde_json::json!({
            "service": "Sysmon Sentinel API Gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "GET /health",
                "GET /api/logs",
                "GET /api/logs/{collection}",
                "GET /api/actions/{collection}",
                "POST /api/ai/analyze"
            ]
        }))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> Json<HealthResponse> {
        let configured = state.backend_configured();
        Json(HealthResponse {
            healthy: true,
            service_name: "api-gateway".to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            status: (if configured { "SERVING" } else { "DEGRADED" }).to_string(),
        })
    }

    async fn logs_handler(
        State(state): State<Arc<Self>>,
        Path(name): Path<String>,
    ) -> Result<Json<Vec<Event>>, ApiError> {
        let collection = name
            .parse::<Collection>()
            .map_err(|_| ApiError::UnknownCollection(name))?;
        let events = state.store.load(collection).await?;
        Ok(Json(events))
    }

    async fn all_logs_handler(
        State(state): State<Arc<Self>>,
    ) -> Result<Json<AllEventsResponse>, ApiError> {
        let (benign, malicious) = state.store.load_all().await?;
        Ok(Json(AllEventsResponse { benign, malicious }))
    }

    async fn actions_handler(Path(name): Path<String>) -> Result<Json<ActionsResponse>, ApiError> {
        let collection = name
            .parse::<Collection>()
            .map_err(|_| ApiError::UnknownCollection(name))?;
        Ok(Json(ActionsResponse {
            collection,
            actions: ActionKind::offered_for(collection).to_vec(),
        }))
    }

    async fn analyze_handler(
        State(state): State<Arc<Self>>,
        payload: Result<Json<AnalyzeRequest>, JsonRejection>,
    ) -> Result<Json<AnalyzeResponse>, ApiError> {
        let Json(AnalyzeRequest { action, mut log }) = payload?;
        if log.message.is_empty() {
            log.message = MISSING_MESSAGE.to_string();
        }
        let explainer = state.explainer()?;
        tracing::info!(
            "Analyze request: action={}, event={}, model={}",
            action,
            log.id,
            explainer.model()
        );

        let explanation = explainer.explain(&log, &action).await?;
        Ok(Json(AnalyzeResponse {
            result: explanation.text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use explainer::llm_client::{ChatChoice, CompletionMessage};
    use explainer::{ChatBackend, ChatCompletionRequest, ChatCompletionResponse};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Backend that records requests and replies from a fixed script
    struct ScriptedBackend {
        calls: AtomicUsize,
        requests: Mutex<Vec<ChatCompletionRequest>>,
        reply: fn() -> Result<ChatCompletionResponse, LlmError>,
    }

    impl ScriptedBackend {
        fn new(reply: fn() -> Result<ChatCompletionResponse, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            request: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            (self.reply)()
        }
    }

    fn answer() -> Result<ChatCompletionResponse, LlmError> {
        Ok(ChatCompletionResponse {
            choices: vec![ChatChoice {
                message: CompletionMessage {
                    role: Some("assistant".to_string()),
                    content: Some("Looks like routine logon activity.".to_string()),
                },
            }],
            usage: None,
        })
    }

    fn rejected() -> Result<ChatCompletionResponse, LlmError> {
        Err(LlmError::Authentication("401: Invalid API Key".to_string()))
    }

    fn logs_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("benign_events.csv"),
            "TimeCreated,Id,LevelDisplayName,Message\n\
             1/5/2024 9:00:00 AM,4624,Information,An account was successfully logged on.\n",
        )
        .unwrap();
        dir
    }

    fn router_with(dir: &TempDir, backend: Arc<ScriptedBackend>) -> Router {
        let service = ExplanationService::new(backend, "llama-3.1-8b-instant");
        Arc::new(AppState::with_explainer(EventStore::new(dir.path()), Arc::new(service)))
            .create_router()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn analyze(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ai/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_collection_returns_events() {
        let dir = logs_dir();
        let (status, body) =
            send(router_with(&dir, ScriptedBackend::new(answer)), get("/api/logs/benign")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "4624");
        assert_eq!(body[0]["process"], "Unknown");
        assert_eq!(body[0]["message"], "An account was successfully logged on.");
    }

    #[tokio::test]
    async fn test_missing_source_is_404() {
        let dir = logs_dir();
        let (status, body) =
            send(router_with(&dir, ScriptedBackend::new(answer)), get("/api/logs/malicious")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "malicious_events.csv not found");
    }

    #[tokio::test]
    async fn test_unknown_collection_is_404() {
        let dir = logs_dir();
        let (status, body) =
            send(router_with(&dir, ScriptedBackend::new(answer)), get("/api/logs/suspicious")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "suspicious not found");
    }

    #[tokio::test]
    async fn test_fetch_all_needs_both_sources() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let (status, _) = send(router_with(&dir, backend.clone()), get("/api/logs")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        fs::write(
            dir.path().join("malicious_events.csv"),
            "TimeCreated,Id,LevelDisplayName,Message\n",
        )
        .unwrap();
        let (status, body) = send(router_with(&dir, backend), get("/api/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["benign"].as_array().unwrap().len(), 1);
        assert!(body["malicious"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_actions_follow_collection_policy() {
        let dir = logs_dir();
        let (status, body) =
            send(router_with(&dir, ScriptedBackend::new(answer)), get("/api/actions/malicious")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["actions"], serde_json::json!(["why_malicious", "user_action"]));
    }

    #[tokio::test]
    async fn test_analyze_returns_result() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let (status, body) = send(
            router_with(&dir, backend.clone()),
            analyze(serde_json::json!({
                "action": "why_benign",
                "log": { "id": "4624", "message": "An account was successfully logged on." }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Looks like routine logon activity.");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].messages[1]
            .content
            .ends_with("An account was successfully logged on."));
    }

    #[tokio::test]
    async fn test_auth_failure_collapses_to_fixed_error() {
        let dir = logs_dir();
        let (status, body) = send(
            router_with(&dir, ScriptedBackend::new(rejected)),
            analyze(serde_json::json!({ "action": "why_malicious", "log": { "message": "x" } })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "AI processing failed" }));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_per_request() {
        let dir = logs_dir();
        let state = Arc::new(AppState::new(
            EventStore::new(dir.path()),
            BackendSettings::default(),
        ));

        let (status, body) = send(
            state.clone().create_router(),
            analyze(serde_json::json!({ "action": "user_action", "log": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], AI_FAILURE_MESSAGE);

        let (status, body) = send(state.create_router(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "DEGRADED");
    }

    #[tokio::test]
    async fn test_unknown_action_and_missing_log_still_explain() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let (status, _) = send(
            router_with(&dir, backend.clone()),
            analyze(serde_json::json!({ "action": "summarize" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(
            requests[0].messages[1].content,
            format!("Give a short explanation.\n\n{}", MISSING_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_missing_or_null_action_uses_generic_instruction() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let router = router_with(&dir, backend.clone());

        for body in [
            serde_json::json!({ "log": { "message": "Pipe created" } }),
            serde_json::json!({ "action": null, "log": { "message": "Pipe created" } }),
        ] {
            let (status, _) = send(router.clone(), analyze(body)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            assert_eq!(request.messages[1].content, "Give a short explanation.\n\nPipe created");
        }
    }

    #[tokio::test]
    async fn test_null_log_gets_placeholder_message() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let (status, body) = send(
            router_with(&dir, backend.clone()),
            analyze(serde_json::json!({ "action": "why_benign", "log": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Looks like routine logon activity.");

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].messages[1].content.ends_with(MISSING_MESSAGE));
    }

    #[tokio::test]
    async fn test_log_with_both_message_spellings_is_accepted() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let (status, _) = send(
            router_with(&dir, backend.clone()),
            analyze(serde_json::json!({
                "action": "why_malicious",
                "log": { "message": "canonical", "Message": "legacy" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].messages[1].content.ends_with("canonical"));
    }

    #[tokio::test]
    async fn test_concurrent_explanations_do_not_interfere() {
        let dir = logs_dir();
        let backend = ScriptedBackend::new(answer);
        let router = router_with(&dir, backend.clone());

        let first = send(
            router.clone(),
            analyze(serde_json::json!({ "action": "why_benign", "log": { "message": "a" } })),
        );
        let second = send(
            router,
            analyze(serde_json::json!({ "action": "when_malicious", "log": { "message": "b" } })),
        );
        let ((s1, _), (s2, _)) = tokio::join!(first, second);
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let dir = logs_dir();
        let request = Request::builder()
            .method("POST")
            .uri("/api/ai/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(router_with(&dir, ScriptedBackend::new(answer)), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
    }
}
