//! The trigger endpoint.
//!
//! `POST /start-analysis/:id` validates that the analysis exists and has a
//! stored file, then spawns the pipeline and answers immediately: the
//! contract is "accepted", not "completed". There is no cancellation once a
//! run is spawned. CORS is permissive; the caller is a browser frontend.

use crate::{config::AppContext, pipeline};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start-analysis/:id", post(handle_start))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(ctx)
}

async fn handle_start(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match ctx.records.analysis(&id).await {
        Ok(analysis) if !analysis.storage_path().trim().is_empty() => {
            tracing::info!(id = %id, "analysis accepted");
            tokio::spawn(pipeline::run_analysis(ctx.clone(), id));
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "message": "analysis started" })),
            ))
        }
        Ok(_) => Err(not_found(format!("analysis {id} has no stored file"))),
        Err(copytrace_core::Error::NotFound(_)) => Err(not_found(format!("analysis {id} not found"))),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "analysis lookup failed");
            Err(internal(e.to_string()))
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn serve(ctx: Arc<AppContext>, host: &str, port: u16) -> std::io::Result<()> {
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "copytrace listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use copytrace_core::{
        Analysis, AnalysisUpdate, BlobStore, ContentFetcher, Error, MatchRecord,
        NotificationRecord, RecordStore, Result, SearchHit, SearchProvider, SimilarityScorer,
    };
    use std::net::SocketAddr;

    /// Just enough store to answer lookups; the spawned pipeline run is not
    /// under test here and fails harmlessly against the inert collaborators.
    struct LookupStore {
        row: Option<Analysis>,
    }

    #[async_trait::async_trait]
    impl RecordStore for LookupStore {
        async fn analysis(&self, id: &str) -> Result<Analysis> {
            self.row
                .clone()
                .ok_or_else(|| Error::NotFound(format!("analysis {id}")))
        }

        async fn update_analysis(&self, _id: &str, _update: &AnalysisUpdate) -> Result<()> {
            Ok(())
        }

        async fn insert_match(&self, _rec: &MatchRecord) -> Result<()> {
            Ok(())
        }

        async fn insert_notification(&self, _rec: &NotificationRecord) -> Result<()> {
            Ok(())
        }
    }

    struct InertBlobs;

    #[async_trait::async_trait]
    impl BlobStore for InertBlobs {
        async fn download(&self, path: &str) -> Result<Vec<u8>> {
            Err(Error::Storage(format!("no blob at {path}")))
        }

        async fn upload(&self, _path: &str, _bytes: Vec<u8>, _ct: &str) -> Result<()> {
            Ok(())
        }
    }

    struct InertSearch;

    #[async_trait::async_trait]
    impl SearchProvider for InertSearch {
        fn name(&self) -> &'static str {
            "inert"
        }

        async fn search(&self, _q: &str, _n: usize) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    struct InertFetcher;

    #[async_trait::async_trait]
    impl ContentFetcher for InertFetcher {
        async fn page_text(&self, _url: &str) -> String {
            String::new()
        }
    }

    struct InertScorer;

    #[async_trait::async_trait]
    impl SimilarityScorer for InertScorer {
        async fn score(&self, _s: &str, _c: &str) -> f64 {
            0.0
        }
    }

    fn context(row: Option<Analysis>) -> Arc<AppContext> {
        Arc::new(AppContext {
            records: Arc::new(LookupStore { row }),
            blobs: Arc::new(InertBlobs),
            search: Arc::new(InertSearch),
            fetcher: Arc::new(InertFetcher),
            scorer: Arc::new(InertScorer),
        })
    }

    async fn serve_router(ctx: Arc<AppContext>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(ctx)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn known_analysis_is_accepted_immediately() {
        let addr = serve_router(context(Some(Analysis {
            id: "an-1".to_string(),
            file_path: Some("uploads/an-1.pdf".to_string()),
            file_name: None,
            user_id: None,
        })))
        .await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/start-analysis/an-1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 202);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "analysis started");
    }

    #[tokio::test]
    async fn unknown_analysis_is_a_404() {
        let addr = serve_router(context(None)).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/start-analysis/ghost"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn analysis_without_a_stored_file_is_a_404() {
        let addr = serve_router(context(Some(Analysis {
            id: "an-2".to_string(),
            file_path: Some("  ".to_string()),
            file_name: None,
            user_id: None,
        })))
        .await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/start-analysis/an-2"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn analysis_with_a_null_file_path_is_a_404() {
        let addr = serve_router(context(Some(Analysis {
            id: "an-3".to_string(),
            file_path: None,
            file_name: None,
            user_id: None,
        })))
        .await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/start-analysis/an-3"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("no stored file"));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let addr = serve_router(context(None)).await;

        let resp = reqwest::Client::new()
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
