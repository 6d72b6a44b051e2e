//! Handoff of finished assets to a 3D renderer.
//!
//! The pipeline never depends on a concrete engine: the renderer is injected
//! through [`AvatarRenderer`], and lifecycle callbacks come back as
//! [`SceneEvent`]s on a channel the UI subscribes to on its own.

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::info;

use crate::api::GeneratedAssets;

/// Commands the pipeline issues to a renderer.
pub trait AvatarRenderer {
    fn load_avatar(&mut self, model_url: &str, texture_url: &str);
    fn configure_animation(&mut self, animation_config: &Value);
    fn set_environment(&mut self, environment: &Value);
}

/// Lifecycle callbacks emitted by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    ModelLoaded,
    LoadProgress(f32),
    SceneReady(String),
}

/// Dispatches a completed asset descriptor to a renderer.
pub struct SceneHandoff<R> {
    renderer: R,
    environment: String,
}

impl<R: AvatarRenderer> SceneHandoff<R> {
    pub fn new(renderer: R, environment: &str) -> Self {
        Self {
            renderer,
            environment: environment.to_string(),
        }
    }

    /// Set up the scene and load the avatar with its animation config.
    /// Metadata is passed through untouched.
    pub fn present(&mut self, assets: &GeneratedAssets) {
        self.renderer
            .set_environment(&json!({ "preset": self.environment }));
        self.renderer
            .load_avatar(&assets.model_url, &assets.texture_url);
        self.renderer
            .configure_animation(&assets.metadata.animation_config);
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

/// Headless renderer that logs each command and reports the scene as ready.
pub struct LogRenderer {
    events: mpsc::UnboundedSender<SceneEvent>,
    preset: String,
}

impl LogRenderer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SceneEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                preset: String::new(),
            },
            rx,
        )
    }

    fn emit(&self, event: SceneEvent) {
        let _ = self.events.send(event);
    }
}

impl AvatarRenderer for LogRenderer {
    fn load_avatar(&mut self, model_url: &str, texture_url: &str) {
        info!(model_url, texture_url, "loading avatar");
        self.emit(SceneEvent::LoadProgress(1.0));
        self.emit(SceneEvent::ModelLoaded);
    }

    fn configure_animation(&mut self, animation_config: &Value) {
        info!(%animation_config, "configuring animation");
        self.emit(SceneEvent::SceneReady(self.preset.clone()));
    }

    fn set_environment(&mut self, environment: &Value) {
        info!(%environment, "setting environment");
        self.preset = environment["preset"].as_str().unwrap_or_default().to_string();
    }
}
