//! Client for a remote photo-to-avatar generation pipeline.
//!
//! Uploads a photo, polls the backend while it runs its multi-stage job,
//! folds status reports into a monotonic [`PipelineState`](pipeline::PipelineState)
//! and hands the finished [`GeneratedAssets`] to a renderer.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scene;

pub use api::{AvatarClient, AvatarTransport, GeneratedAssets};
pub use error::PipelineError;
