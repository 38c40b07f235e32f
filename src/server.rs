//! HTTP surface.
//!
//! Endpoints:
//! - `POST /search` - image (multipart field `file`) or text (`?text=`) search
//! - `GET  /health` - per-mode load status

pub mod error;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::header;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{LensConfig, SearchConfig};
use crate::encoder::QueryInput;
use crate::error::Result;
use crate::registry::ModeState;
use crate::service::{SearchHit, SearchRequest, SearchService};

pub use self::error::{ApiError, ErrorBody};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub defaults: Arc<SearchConfig>,
}

/// Query string of `POST /search`. Missing values fall back to `[search]` defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub text: Option<String>,
    pub index_type: Option<String>,
    pub threshold: Option<f32>,
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct ModeHealth {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub modes: BTreeMap<String, ModeHealth>,
}

/// Build the router with all endpoints.
pub fn router(service: SearchService, config: &LensConfig) -> Router {
    let state = AppState {
        service: Arc::new(service),
        defaults: Arc::new(config.search.clone()),
    };

    let router = Router::new()
        .route("/search", post(search))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.server.cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Bind `[server]` host and port and serve until Ctrl-C.
pub async fn serve(service: SearchService, config: &LensConfig) -> Result<()> {
    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, router(service, config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn search(
    State(state): State<AppState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
    request: Request,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let file = read_upload(request, &state).await?;
    let query = QueryInput::from_parts(file, params.text)?;

    let request = SearchRequest {
        query,
        mode: params
            .index_type
            .unwrap_or_else(|| state.defaults.default_mode.clone()),
        threshold: params.threshold.unwrap_or(state.defaults.default_threshold),
        top_k: params.top_k.unwrap_or(state.defaults.default_top_k),
    };
    tracing::debug!(
        mode = %request.mode,
        kind = request.query.kind(),
        top_k = request.top_k,
        threshold = request.threshold,
        "search request"
    );

    let outcome = state.service.search(request).await?;
    if !outcome.failed_chunks.is_empty() {
        tracing::warn!(
            failed_chunks = outcome.failed_chunks.len(),
            "returning results with incomplete metadata"
        );
    }

    Ok(Json(SearchResponse {
        results: outcome.hits,
    }))
}

/// Read the `file` field of a multipart body. Other bodies carry no upload.
async fn read_upload(
    request: Request,
    state: &AppState,
) -> std::result::Result<Option<Vec<u8>>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));
    if !is_multipart {
        return Ok(None);
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file = Some(bytes.to_vec());
        }
    }
    Ok(file)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.service.registry();
    let modes = registry
        .modes()
        .map(|(name, mode_state)| {
            let health = match mode_state {
                ModeState::Loaded(index) => ModeHealth {
                    loaded: true,
                    vectors: Some(index.index().len()),
                    dimension: Some(index.index().dimension()),
                    reason: None,
                },
                ModeState::Absent { reason } => ModeHealth {
                    loaded: false,
                    vectors: None,
                    dimension: None,
                    reason: Some(reason.clone()),
                },
            };
            (name.to_string(), health)
        })
        .collect();

    Json(HealthResponse {
        status: if registry.loaded_count() > 0 {
            "ok"
        } else {
            "degraded"
        },
        version: crate::VERSION,
        modes,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::embedding::embedder::{EmbedInput, EmbedInputType, Embedder};
    use crate::encoder::QueryEncoder;
    use crate::index::{FlatIndex, IdMap, Metric};
    use crate::metadata::MetadataResolver;
    use crate::metadata::MetadataRecord;
    use crate::metadata::memory::MemoryMetadataStore;
    use crate::registry::{IndexMode, IndexRegistry, ModeIndex};
    use crate::vector::Vector;

    /// Maps every text to the first axis.
    #[derive(Debug)]
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, _input: &EmbedInput<'_>) -> crate::error::Result<Vector> {
            Ok(Vector::new(vec![3.0, 0.0]))
        }

        fn supported_input_types(&self) -> Vec<EmbedInputType> {
            vec![EmbedInputType::Text, EmbedInputType::Image]
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    fn app() -> Router {
        let index = FlatIndex::from_raw(
            2,
            Metric::InnerProduct,
            vec![1.0, 0.0, 0.0, 1.0, 0.8, 0.6],
        )
        .unwrap();
        let id_map = IdMap::new(vec!["x".into(), "y".into(), "z".into()]);
        let registry = IndexRegistry::from_indexes([
            ModeIndex::new(IndexMode::new("color"), index, id_map).unwrap(),
        ])
        .with_absent("structure", "not found");

        let store = MemoryMetadataStore::new([
            MetadataRecord::new("x").with_image_url("https://cdn/x.jpg"),
            MetadataRecord::new("z"),
        ]);
        let service = SearchService::new(
            Arc::new(registry),
            QueryEncoder::new(Arc::new(AxisEmbedder), 1),
            MetadataResolver::new(Arc::new(store)),
        );
        router(service, &LensConfig::default())
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_missing_input_is_bad_request() {
        let (status, body) = call("/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"error": "Either 'file' or 'text' must be provided."})
        );
    }

    #[tokio::test]
    async fn test_unknown_mode_is_bad_request() {
        let (status, body) = call("/search?text=boot&index_type=nonexistent").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("nonexistent"));

        let (status, _) = call("/search?text=boot&index_type=structure").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_string() {
        let (status, body) = call("/search?text=boot&threshold=high").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_text_search_results() {
        let (status, body) = call("/search?text=boot&threshold=0.5").await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        // y scores 0.0 and is filtered; z has no image url.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["image_id"], "x");
        assert_eq!(results[0]["score"], 1.0);
        assert_eq!(results[0]["image_path"], "https://cdn/x.jpg");
        assert_eq!(results[1]["image_id"], "z");
        assert_eq!(results[1]["score"], 0.8);
        assert_eq!(results[1]["image_path"], "N/A");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["modes"]["color"]["loaded"], true);
        assert_eq!(json["modes"]["color"]["vectors"], 3);
        assert_eq!(json["modes"]["structure"]["loaded"], false);
        assert_eq!(json["modes"]["structure"]["reason"], "not found");
    }
}
