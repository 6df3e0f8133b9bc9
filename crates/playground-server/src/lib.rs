//! HTTP surface for the Plume playground.
//!
//! Exposes the compile-and-run pipeline and the saved-file store over a
//! small JSON API. The router is generic over a [`PlaygroundHandler`] so
//! the whole surface can be tested against a mock without a container
//! runtime, and every pipeline outcome maps to exactly one response shape:
//! output payload on success, `{ exitCode, output }` for user-code
//! failures, `{ error }` for infrastructure failures.

pub mod error;
pub mod handler;

pub use error::{Result, ServerError};
pub use handler::{PlaygroundHandler, PlaygroundService};

use axum::extract::{Json as AxumJson, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, options, post};
use axum::{middleware, Router};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use playground_core::config::MAX_CODE_LEN;
use playground_core::{ExecutionRequest, PipelineOutcome, SaveFileRequest};

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Configuration for the playground server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS (the browser editor is served from another origin)
    pub enable_cors: bool,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".parse().unwrap(),
            enable_cors: true,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared application state containing the handler and configuration.
#[derive(Clone)]
pub struct AppState<T: PlaygroundHandler + Clone> {
    pub playground: T,
    pub config: ServerConfig,
}

/// Handler for the /api/compile POST endpoint.
async fn compile_handler<T: PlaygroundHandler + Clone>(
    State(app_state): State<AppState<T>>,
    AxumJson(request): AxumJson<ExecutionRequest>,
) -> std::result::Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    log::info!("Received compile request");

    if request.code.len() > MAX_CODE_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Source exceeds the {} byte limit", MAX_CODE_LEN),
            })),
        ));
    }

    match app_state.playground.compile_and_run(request).await {
        Ok(PipelineOutcome::Success { output }) => Ok(Json(json!({ "output": output }))),
        Ok(PipelineOutcome::CompileFailure {
            exit_code,
            diagnostic,
        })
        | Ok(PipelineOutcome::RunFailure {
            exit_code,
            diagnostic,
        }) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "exitCode": exit_code,
                "output": diagnostic,
            })),
        )),
        Ok(PipelineOutcome::ArtifactMissing) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "exitCode": 1,
                "output": "File not found",
            })),
        )),
        Err(e) => {
            log::error!("Pipeline infrastructure failure: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Handler for the /api/save-file POST endpoint.
async fn save_file_handler<T: PlaygroundHandler + Clone>(
    State(app_state): State<AppState<T>>,
    AxumJson(request): AxumJson<SaveFileRequest>,
) -> std::result::Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    log::info!("Received save-file request");

    if request.code.len() > MAX_CODE_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Source exceeds the {} byte limit", MAX_CODE_LEN),
            })),
        ));
    }

    match app_state.playground.save_file(request).await {
        Ok(saved) => Ok(Json(json!({ "id": saved.id }))),
        Err(e) => {
            log::error!("Failed to save file: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Handler for the /api/file/{id} GET endpoint.
async fn get_file_handler<T: PlaygroundHandler + Clone>(
    State(app_state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    log::info!("Received get-file request for {}", id);

    match app_state.playground.load_file(&id).await {
        Ok(Some(saved)) => Ok(Json(
            serde_json::to_value(saved).unwrap_or_else(|_| json!({})),
        )),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "File not found" })),
        )),
        Err(e) => {
            log::error!("Failed to load file {}: {}", id, e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// The playground HTTP server.
pub struct PlaygroundServer<T: PlaygroundHandler + Clone> {
    playground: T,
    config: ServerConfig,
}

impl<T: PlaygroundHandler + Clone + Send + Sync + 'static> PlaygroundServer<T> {
    /// Create a new server with the given handler and default configuration.
    pub fn new(playground: T) -> Self {
        Self {
            playground,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(playground: T, config: ServerConfig) -> Self {
        Self { playground, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            playground: self.playground.clone(),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(HealthResponse {
                        status: "healthy".to_string(),
                        timestamp: chrono::Utc::now(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    })
                }),
            )
            .route("/api/compile", post(compile_handler::<T>))
            .route("/api/save-file", post(save_file_handler::<T>))
            .route("/api/file/{id}", get(get_file_handler::<T>))
            // CORS preflight
            .route("/api/compile", options(|| async { StatusCode::OK }))
            .route("/api/save-file", options(|| async { StatusCode::OK }))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>,
                 next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();
                    log::info!("Request {} {} {}", request_id, method, uri);

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    log::info!(
                        "Response {} {} completed in {:?}",
                        request_id,
                        response.status(),
                        duration
                    );
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }

    /// Start the server and listen for connections.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("Playground server starting on {}", self.config.bind_addr);
        log::info!("Compile endpoint: http://{}/api/compile", self.config.bind_addr);
        log::info!("Save endpoint: http://{}/api/save-file", self.config.bind_addr);
        log::info!("File endpoint: http://{}/api/file/{{id}}", self.config.bind_addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!(
            "Playground server starting on {} with graceful shutdown",
            self.config.bind_addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Playground server shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

/// Convenience constructor for the production wiring: a Docker stream
/// capture runner behind a [`PlaygroundService`].
pub fn production_service(
    config: playground_core::PlaygroundConfig,
) -> Result<PlaygroundService> {
    let runner = Arc::new(
        playground_core::DockerRunner::new(config.exchange_dir.clone(), config.platform.clone())
            .map_err(playground_core::PlaygroundError::from)?,
    );
    Ok(PlaygroundService::new(runner, config))
}

/// Wiring for relay-only hosts: the indirection runner persists exit
/// status through side files in the exchange directory.
pub fn relay_service(config: playground_core::PlaygroundConfig) -> PlaygroundService {
    let runner = Arc::new(playground_core::RelayRunner::new(
        config.exchange_dir.clone(),
        config.platform.clone(),
    ));
    PlaygroundService::new(runner, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use playground_core::{PipelineOutcome, PlaygroundError, RunnerError, SavedFile};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt; // for `oneshot`

    /// Scripted handler: returns whatever outcome it was built with and
    /// records saved files in memory.
    #[derive(Clone)]
    struct MockPlayground {
        outcome: Arc<Mutex<Option<std::result::Result<PipelineOutcome, String>>>>,
        saved: Arc<Mutex<Vec<SavedFile>>>,
    }

    impl MockPlayground {
        fn with_outcome(outcome: std::result::Result<PipelineOutcome, String>) -> Self {
            Self {
                outcome: Arc::new(Mutex::new(Some(outcome))),
                saved: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PlaygroundHandler for MockPlayground {
        async fn compile_and_run(
            &self,
            _request: ExecutionRequest,
        ) -> std::result::Result<PipelineOutcome, PlaygroundError> {
            match self.outcome.lock().unwrap().take().unwrap() {
                Ok(outcome) => Ok(outcome),
                Err(msg) => Err(PlaygroundError::RunnerError(RunnerError::RelayError(msg))),
            }
        }

        async fn save_file(
            &self,
            request: SaveFileRequest,
        ) -> std::result::Result<SavedFile, PlaygroundError> {
            let saved = SavedFile {
                id: request.id.unwrap_or_else(Uuid::new_v4),
                file_name: request.file_name.unwrap_or_else(|| "teal-otter".into()),
                code: request.code,
                last_modified: chrono::Utc::now().timestamp_millis(),
            };
            self.saved.lock().unwrap().push(saved.clone());
            Ok(saved)
        }

        async fn load_file(
            &self,
            id: &Uuid,
        ) -> std::result::Result<Option<SavedFile>, PlaygroundError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .iter()
                .find(|f| f.id == *id)
                .cloned())
        }
    }

    fn router_for(outcome: std::result::Result<PipelineOutcome, String>) -> Router {
        PlaygroundServer::new(MockPlayground::with_outcome(outcome)).build_router()
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn compile_success_returns_output_payload() {
        let router = router_for(Ok(PipelineOutcome::Success {
            output: "Hello, world!\n".into(),
        }));

        let (status, body) = post_json(
            router,
            "/api/compile",
            json!({ "code": "println(\"Hello, world!\")" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "Hello, world!\n");
    }

    #[tokio::test]
    async fn compile_failure_returns_exit_code_and_diagnostic() {
        let router = router_for(Ok(PipelineOutcome::CompileFailure {
            exit_code: 1,
            diagnostic: "syntax error at line 1".into(),
        }));

        let (status, body) = post_json(router, "/api/compile", json!({ "code": "prinln(" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["exitCode"], 1);
        assert!(!body["output"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn artifact_missing_returns_fixed_message() {
        let router = router_for(Ok(PipelineOutcome::ArtifactMissing));

        let (status, body) = post_json(router, "/api/compile", json!({ "code": "x" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["output"], "File not found");
    }

    #[tokio::test]
    async fn infrastructure_failure_returns_bad_gateway() {
        let router = router_for(Err("daemon unreachable".into()));

        let (status, body) = post_json(router, "/api/compile", json!({ "code": "x" })).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("daemon unreachable"));
    }

    #[tokio::test]
    async fn oversized_source_is_rejected_before_the_pipeline() {
        let router = router_for(Ok(PipelineOutcome::Success {
            output: String::new(),
        }));

        let huge = "x".repeat(MAX_CODE_LEN + 1);
        let (status, _body) = post_json(router, "/api/compile", json!({ "code": huge })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let mock = MockPlayground::with_outcome(Ok(PipelineOutcome::ArtifactMissing));
        let router = PlaygroundServer::new(mock).build_router();

        let (status, body) = post_json(
            router.clone(),
            "/api/save-file",
            json!({ "code": "println(1)", "fileName": "demo.plm" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_str().unwrap().to_string();

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/file/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let saved: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(saved["fileName"], "demo.plm");
        assert_eq!(saved["code"], "println(1)");
    }

    #[tokio::test]
    async fn unknown_file_returns_not_found() {
        let router = router_for(Ok(PipelineOutcome::ArtifactMissing));

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/file/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "File not found");
    }
}
