//! Observable pipeline state and the aggregator that folds status responses
//! into it.
//!
//! [`apply`] is pure: it seeds every computation from the previously
//! published state, so reordered or stale responses never move the stage or
//! the progress backwards.

use serde::Serialize;

use super::stage::{PipelineStage, resolve};
use crate::api::{GeneratedAssets, RawStatusResponse};
use crate::error::{PipelineError, TransportError};

/// Snapshot published to the consumer.
///
/// Invariants: `assets` is only present when `stage` is
/// [`PipelineStage::Completed`] and there is no error; a state carrying an
/// error is terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    stage: PipelineStage,
    progress: f64,
    assets: Option<GeneratedAssets>,
    error: Option<PipelineError>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::initial()
    }
}

impl PipelineState {
    /// `{Idle, 0.0}`, the seed for a freshly submitted job.
    pub fn initial() -> Self {
        Self {
            stage: PipelineStage::Idle,
            progress: 0.0,
            assets: None,
            error: None,
        }
    }

    fn completed(assets: GeneratedAssets) -> Self {
        Self {
            stage: PipelineStage::Completed,
            progress: 1.0,
            assets: Some(assets),
            error: None,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn assets(&self) -> Option<&GeneratedAssets> {
        self.assets.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// No further states follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || self.stage == PipelineStage::Completed
    }

    /// Terminal copy of this state carrying `error`. Stage and progress are
    /// kept as they are.
    pub fn fail(&self, error: PipelineError) -> Self {
        Self {
            stage: self.stage,
            progress: self.progress,
            assets: None,
            error: Some(error),
        }
    }
}

fn clamp_progress(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Merge one status response into the previously published state.
pub fn apply(previous: &PipelineState, response: &RawStatusResponse) -> PipelineState {
    if previous.is_terminal() {
        return previous.clone();
    }

    // `completed` only counts together with `isCompleted` and assets below.
    let stage = match resolve(&response.current_stage) {
        Some(PipelineStage::Completed) | None => previous.stage,
        Some(stage) => stage.max(previous.stage),
    };
    let progress = previous.progress.max(clamp_progress(response.progress.unwrap_or(0.0)));

    if let Some(message) = response.error.as_deref().filter(|m| !m.trim().is_empty()) {
        return previous.fail(PipelineError::ServerReported(message.to_string()));
    }

    if response.is_completed {
        return match &response.assets {
            Some(assets) => PipelineState::completed(assets.clone()),
            None => previous.fail(PipelineError::UploadFailed(TransportError::InvalidResponse(
                "job reported completed without assets".to_string(),
            ))),
        };
    }

    PipelineState {
        stage,
        progress,
        assets: None,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AssetMetadata;

    fn assets() -> GeneratedAssets {
        GeneratedAssets {
            model_url: "https://cdn.example/model.glb".into(),
            texture_url: "https://cdn.example/texture.jpg".into(),
            animation_data_url: "https://cdn.example/animations.json".into(),
            metadata: AssetMetadata::default(),
        }
    }

    fn at(stage: &str, progress: f64) -> RawStatusResponse {
        RawStatusResponse::in_progress("job-1", stage, progress)
    }

    #[test]
    fn in_progress_response_updates_stage_and_progress() {
        let next = apply(&PipelineState::initial(), &at("segmentation", 0.2));
        assert_eq!(next.stage(), PipelineStage::Segmentation);
        assert_eq!(next.progress(), 0.2);
        assert!(!next.is_terminal());
    }

    #[test]
    fn progress_never_decreases_under_reordering() {
        let responses = [
            at("segmentation", 0.2),
            at("mesh_generation", 0.5),
            at("depth_analysis", 0.3),
            at("segmentation", 0.1),
            at("mesh_generation", 0.5),
            at("texture_mapping", 0.7),
            at("uploading", 0.0),
            at("rigging", 0.8),
        ];
        let mut state = PipelineState::initial();
        let mut seen = vec![];
        for response in &responses {
            state = apply(&state, response);
            seen.push((state.stage(), state.progress()));
        }
        for pair in seen.windows(2) {
            assert!(pair[1].1 >= pair[0].1, "progress regressed: {pair:?}");
            assert!(pair[1].0 >= pair[0].0, "stage regressed: {pair:?}");
        }
        assert_eq!(state.stage(), PipelineStage::Rigging);
        assert_eq!(state.progress(), 0.8);
    }

    #[test]
    fn stale_response_keeps_higher_progress() {
        let state = apply(&PipelineState::initial(), &at("mesh_generation", 0.5));
        let state = apply(&state, &at("segmentation", 0.1));
        assert_eq!(state.progress(), 0.5);
        assert_eq!(state.stage(), PipelineStage::MeshGeneration);
    }

    #[test]
    fn unknown_stage_keeps_previous_stage() {
        let state = apply(&PipelineState::initial(), &at("texture_mapping", 0.7));
        let state = apply(&state, &at("unknown_stage_xyz", 0.75));
        assert_eq!(state.stage(), PipelineStage::TextureMapping);
        assert_eq!(state.progress(), 0.75);
        assert!(state.error().is_none());
    }

    #[test]
    fn unknown_stage_on_first_poll_stays_idle_not_error() {
        let state = apply(&PipelineState::initial(), &at("warming_up", 0.05));
        assert_eq!(state.stage(), PipelineStage::Idle);
        assert_eq!(state.progress(), 0.05);
        assert!(!state.is_terminal());
    }

    #[test]
    fn missing_progress_keeps_previous_progress() {
        let state = apply(&PipelineState::initial(), &at("depth_analysis", 0.4));
        let mut response = at("mesh_generation", 0.0);
        response.progress = None;

        let state = apply(&state, &response);
        assert_eq!(state.stage(), PipelineStage::MeshGeneration);
        assert_eq!(state.progress(), 0.4);
    }

    #[test]
    fn progress_is_clamped() {
        let state = apply(&PipelineState::initial(), &at("segmentation", -3.0));
        assert_eq!(state.progress(), 0.0);
        let state = apply(&state, &at("rigging", 7.5));
        assert_eq!(state.progress(), 1.0);
        assert!(!state.is_terminal());
    }

    #[test]
    fn server_error_is_terminal_and_keeps_progress() {
        let state = apply(&PipelineState::initial(), &at("depth_analysis", 0.3));
        let response = RawStatusResponse::failed("job-1", "mesh_generation", "out of GPU memory");
        let state = apply(&state, &response);
        assert!(state.is_terminal());
        assert_eq!(
            state.error(),
            Some(&PipelineError::ServerReported("out of GPU memory".into()))
        );
        assert_eq!(state.stage(), PipelineStage::DepthAnalysis);
        assert_eq!(state.progress(), 0.3);
        assert!(state.assets().is_none());
    }

    #[test]
    fn blank_error_string_is_ignored() {
        let mut response = at("rigging", 0.8);
        response.error = Some("  ".into());
        let state = apply(&PipelineState::initial(), &response);
        assert!(state.error().is_none());
        assert_eq!(state.stage(), PipelineStage::Rigging);
    }

    #[test]
    fn completed_with_assets_is_terminal_success() {
        let state = apply(&PipelineState::initial(), &at("finalizing", 0.95));
        let state = apply(&state, &RawStatusResponse::completed("job-1", assets()));
        assert!(state.is_terminal());
        assert_eq!(state.stage(), PipelineStage::Completed);
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.assets(), Some(&assets()));
        assert!(state.error().is_none());
    }

    #[test]
    fn completed_without_assets_is_an_error() {
        let mut response = RawStatusResponse::completed("job-1", assets());
        response.assets = None;
        let state = apply(&PipelineState::initial(), &response);
        assert!(state.is_terminal());
        assert!(state.assets().is_none());
        assert!(matches!(
            state.error(),
            Some(PipelineError::UploadFailed(TransportError::InvalidResponse(_)))
        ));
        assert_ne!(state.stage(), PipelineStage::Completed);
    }

    #[test]
    fn completed_stage_name_without_flag_is_not_success() {
        let state = apply(&PipelineState::initial(), &at("animation", 0.9));
        let state = apply(&state, &at("completed", 1.0));
        assert_eq!(state.stage(), PipelineStage::Animation);
        assert!(!state.is_terminal());
    }

    #[test]
    fn terminal_state_absorbs_further_responses() {
        let done = apply(
            &PipelineState::initial(),
            &RawStatusResponse::completed("job-1", assets()),
        );
        let after = apply(&done, &at("segmentation", 0.2));
        assert_eq!(after, done);

        let failed = PipelineState::initial().fail(PipelineError::Timeout);
        let after = apply(&failed, &RawStatusResponse::completed("job-1", assets()));
        assert_eq!(after, failed);
    }

    #[test]
    fn fail_keeps_stage_and_progress() {
        let state = apply(&PipelineState::initial(), &at("rigging", 0.8));
        let cancelled = state.fail(PipelineError::Cancelled);
        assert_eq!(cancelled.stage(), PipelineStage::Rigging);
        assert_eq!(cancelled.progress(), 0.8);
        assert_eq!(cancelled.error(), Some(&PipelineError::Cancelled));
    }
}
