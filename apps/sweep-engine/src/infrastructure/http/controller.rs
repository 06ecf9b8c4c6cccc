//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the sweep orchestrator.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{debug, warn};

use crate::error::SweepError;
use crate::sweep::{SweepOrchestrator, SweepRequest, TrialRunner};

use super::response::{ApiErrorResponse, CancelSweepResponse, HealthResponse, SubmitSweepResponse};

/// Application state shared across handlers.
pub struct AppState<R: TrialRunner> {
    /// Sweep orchestrator.
    pub orchestrator: Arc<SweepOrchestrator<R>>,
    /// Application version.
    pub version: String,
}

impl<R: TrialRunner> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<R: TrialRunner + 'static>(state: AppState<R>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/sweeps", post(submit_sweep))
        .route("/api/v1/sweeps/{task_id}/progress", get(get_progress))
        .route("/api/v1/sweeps/{task_id}/results", get(get_results))
        .route("/api/v1/sweeps/{task_id}/cancel", post(cancel_sweep))
        .with_state(state)
}

/// Status code for an orchestrator error.
const fn status_for(err: &SweepError) -> StatusCode {
    match err {
        SweepError::InvalidStrategyId(_)
        | SweepError::InvalidRange { .. }
        | SweepError::EmptyGrid
        | SweepError::InvalidWorkerCount(_) => StatusCode::BAD_REQUEST,
        SweepError::StrategyNotFound(_)
        | SweepError::EntryPointMissing { .. }
        | SweepError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        SweepError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        SweepError::ScratchSetup { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map an orchestrator error to a status code and error body.
fn error_response(err: &SweepError) -> Response {
    if err.is_client_error() {
        debug!(code = err.code(), error = %err, "Rejected sweep request");
    } else {
        warn!(code = err.code(), error = %err, "Sweep request failed");
    }

    (
        status_for(err),
        Json(ApiErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint.
async fn health_check<R: TrialRunner + 'static>(
    State(state): State<AppState<R>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

/// Submit a sweep.
async fn submit_sweep<R: TrialRunner + 'static>(
    State(state): State<AppState<R>>,
    Json(request): Json<SweepRequest>,
) -> Response {
    match state.orchestrator.submit(request) {
        Ok(task_id) => {
            (StatusCode::ACCEPTED, Json(SubmitSweepResponse { task_id })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Live progress of a sweep.
async fn get_progress<R: TrialRunner + 'static>(
    State(state): State<AppState<R>>,
    Path(task_id): Path<String>,
) -> Response {
    match state.orchestrator.progress(&task_id) {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Ranked results of a sweep.
async fn get_results<R: TrialRunner + 'static>(
    State(state): State<AppState<R>>,
    Path(task_id): Path<String>,
) -> Response {
    match state.orchestrator.results(&task_id) {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Soft-cancel a sweep.
async fn cancel_sweep<R: TrialRunner + 'static>(
    State(state): State<AppState<R>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let cancelled = state.orchestrator.cancel(&task_id);
    Json(CancelSweepResponse { cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::sweep::trial::MockTrialRunner;
    use crate::sweep::{SweepSettings, TaskRegistry};

    fn create_test_state(strategies_root: &std::path::Path) -> AppState<MockTrialRunner> {
        let settings = SweepSettings {
            strategies_root: strategies_root.to_path_buf(),
            scratch_root: strategies_root.join("scratch"),
            entry_point: "main.py".to_string(),
            default_worker_count: 2,
        };
        AppState {
            orchestrator: Arc::new(SweepOrchestrator::new(
                Arc::new(TaskRegistry::new()),
                Arc::new(MockTrialRunner::new()),
                settings,
            )),
            version: "1.0.0-test".to_string(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["version"], "1.0.0-test");
    }

    #[tokio::test]
    async fn submit_unknown_strategy_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

        let body = serde_json::json!({
            "strategyId": "missing",
            "paramRanges": {"fast": {"start": 5, "end": 10, "step": 5, "type": "int"}}
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sweeps")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "STRATEGY_NOT_FOUND");
        assert!(json["message"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn submit_empty_grid_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sma")).unwrap();
        std::fs::write(dir.path().join("sma").join("main.py"), "pass\n").unwrap();
        let app = create_router(create_test_state(dir.path()));

        let body = serde_json::json!({
            "strategyId": "sma",
            "paramRanges": {"fast": {"start": 10, "end": 5, "step": 1, "type": "int"}}
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sweeps")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "EMPTY_GRID");
    }

    #[tokio::test]
    async fn progress_of_unknown_task_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sweeps/nope/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn cancel_unknown_task_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sweeps/nope/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["cancelled"], false);
    }

    #[test]
    fn client_errors_map_to_4xx() {
        let errors = [
            SweepError::InvalidStrategyId("../x".to_string()),
            SweepError::StrategyNotFound("x".to_string()),
            SweepError::EntryPointMissing {
                workspace: "/s/x".to_string(),
                entry_point: "main.py".to_string(),
            },
            SweepError::InvalidRange {
                name: "fast".to_string(),
                message: "step must be positive".to_string(),
            },
            SweepError::EmptyGrid,
            SweepError::InvalidWorkerCount(0),
            SweepError::ScratchSetup {
                path: "/tmp/x".to_string(),
                source: std::io::Error::other("denied"),
            },
            SweepError::Shutdown,
            SweepError::TaskNotFound("t".to_string()),
        ];

        for err in &errors {
            assert_eq!(
                status_for(err).is_client_error(),
                err.is_client_error(),
                "{}",
                err.code()
            );
        }
    }
}
