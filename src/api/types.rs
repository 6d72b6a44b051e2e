//! Wire types for the avatar generation backend.
//!
//! The backend is inconsistent about field casing: the status endpoint may
//! answer in camelCase (`currentStage`) or snake_case (`current_stage`), and
//! the animation asset sometimes arrives as `animationData`. Aliases accept
//! both, while serialization always uses the camelCase form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON `config` part sent alongside the photo in the upload multipart body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfig {
    /// Server-side pipeline variant.
    pub pipeline: String,
    /// Output quality tier (e.g. "high").
    pub quality: String,
    /// Animation set to bake into the avatar.
    pub animations: Vec<String>,
    /// Model container format (e.g. "glb").
    pub target_format: String,
    pub unity_compatible: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pipeline: "rendernet_pike".to_string(),
            quality: "high".to_string(),
            animations: vec![
                "breathing".to_string(),
                "blinking".to_string(),
                "micro_motions".to_string(),
                "idle_poses".to_string(),
            ],
            target_format: "glb".to_string(),
            unity_compatible: true,
        }
    }
}

/// Response of `POST /api/v1/process-avatar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(alias = "job_id")]
    pub job_id: String,
    /// Backend estimate of the processing time, in seconds.
    #[serde(default, alias = "estimated_time")]
    pub estimated_time: u64,
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /api/v1/status/{jobId}`, before any interpretation.
///
/// `current_stage` is kept as a raw string so unknown stage names never fail
/// decoding; see [`resolve`](crate::pipeline::resolve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatusResponse {
    #[serde(rename = "jobId", alias = "job_id", default)]
    pub job_id: String,
    #[serde(rename = "currentStage", alias = "current_stage", default)]
    pub current_stage: String,
    /// Missing or `null` counts as no progress reported.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(rename = "isCompleted", alias = "is_completed", default)]
    pub is_completed: bool,
    #[serde(default)]
    pub assets: Option<GeneratedAssets>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RawStatusResponse {
    /// A non-terminal status report.
    pub fn in_progress(job_id: &str, stage: &str, progress: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            current_stage: stage.to_string(),
            progress: Some(progress),
            is_completed: false,
            assets: None,
            error: None,
        }
    }

    /// A successful terminal status report carrying the assets.
    pub fn completed(job_id: &str, assets: GeneratedAssets) -> Self {
        Self {
            job_id: job_id.to_string(),
            current_stage: "completed".to_string(),
            progress: Some(1.0),
            is_completed: true,
            assets: Some(assets),
            error: None,
        }
    }

    /// A status report in which the backend signals a failure.
    pub fn failed(job_id: &str, stage: &str, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            current_stage: stage.to_string(),
            progress: None,
            is_completed: true,
            assets: None,
            error: Some(message.to_string()),
        }
    }
}

/// Descriptor of a finished avatar. URLs are absolute and fetched by the
/// renderer, never by this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAssets {
    #[serde(rename = "modelURL")]
    pub model_url: String,
    #[serde(rename = "textureURL")]
    pub texture_url: String,
    #[serde(rename = "animationDataURL", alias = "animationData")]
    pub animation_data_url: String,
    #[serde(default)]
    pub metadata: AssetMetadata,
}

/// Descriptors passed through verbatim to the scene handoff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    #[serde(default)]
    pub facial_features: Value,
    #[serde(default)]
    pub body_measurements: Value,
    #[serde(default)]
    pub animation_config: Value,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
