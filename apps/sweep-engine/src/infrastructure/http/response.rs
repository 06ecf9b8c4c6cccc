//! HTTP response DTOs.

use serde::{Deserialize, Serialize};

/// Response from sweep submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSweepResponse {
    /// Id of the accepted sweep.
    pub task_id: String,
}

/// Response from sweep cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSweepResponse {
    /// Whether the sweep was running and is now cancelled.
    pub cancelled: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error code.
    pub error: String,
    /// Error message.
    pub message: String,
}
