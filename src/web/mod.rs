pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{scene::ClassLabel, utils::error::ClassifyError, Config, Result, SceneClassifier};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// Shared handler state. The classifier is built once per process.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<SceneClassifier>,
    pub config: Config,
}

impl AppState {
    pub fn new(classifier: SceneClassifier, config: Config) -> Self {
        Self {
            classifier: Arc::new(classifier),
            config,
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let classifier = SceneClassifier::from_config(&config);

    // A model that cannot be loaded must keep the service from taking traffic.
    tokio::task::block_in_place(|| classifier.warm_up())?;

    let state = AppState::new(classifier, config.clone());
    let app = create_app(state);

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifyError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict      - Multipart image upload");
    tracing::info!("  POST /api/classify - JSON base64 upload");
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  GET  /api/info     - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifyError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Server failed: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;
    let max_request_size = server_config.max_request_size;
    let request_timeout = Duration::from_secs(server_config.request_timeout);

    Router::new()
        .route("/predict", post(handlers::predict_upload_handler))
        .route("/api/classify", post(handlers::classify_json_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    if let Some(error) = state.classifier.fatal_error() {
        return Err(error);
    }
    if !state.classifier.is_ready() {
        return Err(ClassifyError::ModelLoad("model not loaded yet".to_string()));
    }

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let labels: Vec<&str> = ClassLabel::ALL.iter().map(|l| l.name()).collect();

    Json(json!({
        "service": "Scene Classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "classes": labels,
        "model": state.classifier.model_stats(),
        "limits": {
            "max_request_size": state.config.server_config.max_request_size,
            "allowed_extensions": crate::image::loader::ALLOWED_EXTENSIONS,
        }
    }))
}
