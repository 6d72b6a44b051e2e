use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side processing phases, in pipeline order.
///
/// The ordering is only used to keep published progress from moving
/// backwards; it never drives behavior on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Uploading,
    Segmentation,
    DepthAnalysis,
    MeshGeneration,
    TextureMapping,
    Rigging,
    Animation,
    Finalizing,
    Completed,
}

impl PipelineStage {
    /// Every stage, in pipeline order.
    pub const ALL: [PipelineStage; 10] = [
        PipelineStage::Idle,
        PipelineStage::Uploading,
        PipelineStage::Segmentation,
        PipelineStage::DepthAnalysis,
        PipelineStage::MeshGeneration,
        PipelineStage::TextureMapping,
        PipelineStage::Rigging,
        PipelineStage::Animation,
        PipelineStage::Finalizing,
        PipelineStage::Completed,
    ];

    /// Zero-based index in [`PipelineStage::ALL`].
    pub fn position(self) -> usize {
        self as usize
    }

    /// The canonical name the backend uses for this stage.
    pub fn wire_name(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Segmentation => "segmentation",
            PipelineStage::DepthAnalysis => "depth_analysis",
            PipelineStage::MeshGeneration => "mesh_generation",
            PipelineStage::TextureMapping => "texture_mapping",
            PipelineStage::Rigging => "rigging",
            PipelineStage::Animation => "animation",
            PipelineStage::Finalizing => "finalizing",
            PipelineStage::Completed => "completed",
        }
    }

    /// Short human-readable label.
    pub fn description(self) -> &'static str {
        match self {
            PipelineStage::Idle => "Waiting to start",
            PipelineStage::Uploading => "Uploading photo",
            PipelineStage::Segmentation => "Separating person from background",
            PipelineStage::DepthAnalysis => "Estimating depth",
            PipelineStage::MeshGeneration => "Building 3D mesh",
            PipelineStage::TextureMapping => "Generating textures",
            PipelineStage::Rigging => "Adding facial blendshapes",
            PipelineStage::Animation => "Adding breathing and micro-motions",
            PipelineStage::Finalizing => "Preparing model for the 3D engine",
            PipelineStage::Completed => "Ready",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.wire_name())
    }
}

/// Map a server-reported stage name to a local stage.
///
/// Matching is case-sensitive. Unknown names yield `None`; callers keep the
/// previously known stage instead of falling back to `Idle`.
pub fn resolve(raw: &str) -> Option<PipelineStage> {
    match raw {
        // The backend names the finalizing step after its export target.
        "unity_prep" => Some(PipelineStage::Finalizing),
        _ => PipelineStage::ALL
            .into_iter()
            .find(|stage| stage.wire_name() == raw),
    }
}
