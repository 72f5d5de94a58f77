//! HTTP service.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/generate` | `{question, history}` → `{answer}` |
//! | `GET`  | `/health` | status, version and passage count |
//!
//! Failures answer `500 {"detail": "<message>"}`. A blank question is
//! rejected with 400 before any retrieval happens.

use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use sensai_core::{config::AppConfig, AppError, AppResult};
use sensai_retrieval::{ChatMessage, DocumentStore, ResponseOrchestrator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Run the HTTP service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Bind host (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        self.run(config)
            .await
            .map_err(|e| AppError::Other(format!("{:#}", e)))
    }

    async fn run(&self, config: AppConfig) -> anyhow::Result<()> {
        let host = self.host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = self.port.unwrap_or(config.server.port);
        let bind_addr = format!("{}:{}", host, port);

        config.ensure_sensai_dir()?;
        let store = sensai_retrieval::open_store(&config)?;
        let engine = Arc::new(sensai_retrieval::build_engine(&config, store.clone())?);
        let orchestrator = sensai_retrieval::build_orchestrator(&config, engine)?;

        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            store,
            timeout: Duration::from_secs(config.server.request_timeout_secs),
        };

        let app = router(state, cors_layer(&config.server.allowed_origins)?);

        tracing::info!(
            collection = %config.rag.collection,
            cascade = %config.rag.cascade,
            "SENSAI listening on http://{}",
            bind_addr
        );

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<ResponseOrchestrator>,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/generate", post(handle_generate))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// CORS restricted to `origins`; `*` allows any origin.
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin: {}", o)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any))
}

// ============ Error response ============

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// ============ POST /generate ============

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    question: String,

    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    answer: String,
}

async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let respond = state
        .orchestrator
        .respond(&request.question, &request.history);

    match tokio::time::timeout(state.timeout, respond).await {
        Ok(Ok(answer)) => Ok(Json(GenerateResponse { answer })),
        Ok(Err(e)) => {
            tracing::error!("Generation failed: {}", e);
            Err(ApiError::internal(e.to_string()))
        }
        Err(_) => {
            tracing::error!("Generation timed out after {:?}", state.timeout);
            Err(ApiError::internal(format!(
                "Request timed out after {}s",
                state.timeout.as_secs()
            )))
        }
    }
}

// ============ GET /health ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    store: String,
    passages: Option<usize>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let passages = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Health check could not count passages: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.name().to_string(),
        passages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensai_retrieval::embeddings::providers::TrigramProvider;
    use sensai_retrieval::{
        InMemoryStore, Passage, QueryAnalyzer, ResponseGenerator, RetrievalEngine, Taxonomy,
    };

    struct EchoGenerator {
        delay: Duration,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ResponseGenerator for EchoGenerator {
        async fn generate(&self, question: &str, context: &str, _history: &str) -> AppResult<String> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AppError::Llm("Ollama API error (500): model not found".to_string()));
            }
            Ok(format!("{} | {}", question, context.lines().next().unwrap_or("")))
        }
    }

    async fn state(generator: EchoGenerator, timeout: Duration) -> AppState {
        let store = Arc::new(InMemoryStore::new(Arc::new(TrigramProvider::new(64))));
        store
            .add(Passage::new("Théorème de Thalès", "maths_3ème.pdf"))
            .await
            .unwrap();

        let taxonomy = Arc::new(Taxonomy::builtin().unwrap());
        let engine = RetrievalEngine::new(store.clone(), QueryAnalyzer::new(taxonomy), 5);
        let orchestrator = ResponseOrchestrator::new(Arc::new(engine), Arc::new(generator));

        AppState {
            orchestrator: Arc::new(orchestrator),
            store,
            timeout,
        }
    }

    fn request(question: &str) -> Json<GenerateRequest> {
        Json(GenerateRequest {
            question: question.to_string(),
            history: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_generate_returns_answer() {
        let generator = EchoGenerator {
            delay: Duration::ZERO,
            fail: false,
        };
        let state = state(generator, Duration::from_secs(5)).await;

        let Json(response) = handle_generate(State(state), request("les théorèmes de maths en 3ème"))
            .await
            .unwrap();
        assert!(response.answer.starts_with("les théorèmes de maths en 3ème | ---Document 1: maths_3ème"));
    }

    #[tokio::test]
    async fn test_generate_failure_is_500_with_detail() {
        let generator = EchoGenerator {
            delay: Duration::ZERO,
            fail: true,
        };
        let state = state(generator, Duration::from_secs(5)).await;

        let error = handle_generate(State(state), request("bonjour")).await.unwrap_err();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.detail.contains("model not found"));
    }

    #[tokio::test]
    async fn test_generate_timeout_is_500() {
        let generator = EchoGenerator {
            delay: Duration::from_secs(5),
            fail: false,
        };
        let state = state(generator, Duration::from_millis(20)).await;

        let error = handle_generate(State(state), request("bonjour")).await.unwrap_err();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.detail.contains("timed out"));
    }

    #[tokio::test]
    async fn test_blank_question_is_400() {
        let generator = EchoGenerator {
            delay: Duration::ZERO,
            fail: false,
        };
        let state = state(generator, Duration::from_secs(5)).await;

        let error = handle_generate(State(state), request("   ")).await.unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_passages() {
        let generator = EchoGenerator {
            delay: Duration::ZERO,
            fail: false,
        };
        let Json(health) = handle_health(State(state(generator, Duration::from_secs(5)).await)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "memory");
        assert_eq!(health.passages, Some(1));
    }

    #[test]
    fn test_generate_request_history_defaults_to_empty() {
        let request: GenerateRequest = serde_json::from_str(r#"{"question": "bonjour"}"#).unwrap();
        assert!(request.history.is_empty());

        let request: GenerateRequest = serde_json::from_str(
            r#"{"question": "et ensuite ?", "history": [{"role": "user", "content": "salut"}]}"#,
        )
        .unwrap();
        assert_eq!(request.history[0].role, "user");
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_ok());
        assert!(cors_layer(&["*".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
