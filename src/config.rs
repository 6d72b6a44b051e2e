//! Client configuration loaded from `mirrorworld.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! The `MIRRORWORLD_BASE_URL` environment variable takes precedence over the
//! file for the backend address.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::api::ProcessingConfig;
use crate::pipeline::{PollConfig, RetryConfig};

const CONFIG_FILE: &str = "mirrorworld.toml";
const BASE_URL_ENV: &str = "MIRRORWORLD_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Backend root, without the `/api/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wall-clock budget for polling a single job.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive transient poll failures tolerated. Zero disables retries.
    #[serde(default)]
    pub max_transient_failures: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_quality")]
    pub quality: String,

    #[serde(default = "default_animations")]
    pub animations: Vec<String>,

    #[serde(default = "default_target_format")]
    pub target_format: String,

    /// Scene preset handed to the renderer.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_quality() -> String {
    ProcessingConfig::default().quality
}

fn default_animations() -> Vec<String> {
    ProcessingConfig::default().animations
}

fn default_target_format() -> String {
    ProcessingConfig::default().target_format
}

fn default_environment() -> String {
    "studio".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            max_transient_failures: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_image_bytes: default_max_image_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            quality: default_quality(),
            animations: default_animations(),
            target_format: default_target_format(),
            environment: default_environment(),
        }
    }
}

impl MirrorConfig {
    /// Load `mirrorworld.toml` from the current directory, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;

        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.is_empty()
        {
            config.base_url = url;
        }

        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<MirrorConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryConfig {
                max_retries: self.max_transient_failures,
                base_delay_ms: self.retry_base_delay_ms,
            },
        }
    }

    pub fn processing_config(&self) -> ProcessingConfig {
        ProcessingConfig {
            quality: self.quality.clone(),
            animations: self.animations.clone(),
            target_format: self.target_format.clone(),
            ..ProcessingConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = MirrorConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.poll_interval_ms, 1500);
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_transient_failures, 0);
        assert_eq!(config.environment, "studio");
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            base_url = "https://avatars.example"
            max_transient_failures = 3
            animations = ["breathing"]
        "#;
        let config: MirrorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://avatars.example");
        assert_eq!(config.max_transient_failures, 3);
        assert_eq!(config.animations, vec!["breathing".to_string()]);
        assert_eq!(config.poll_interval_ms, 1500);
        assert_eq!(config.target_format, "glb");
    }

    #[test]
    fn poll_config_reflects_fields() {
        let config = MirrorConfig {
            poll_interval_ms: 250,
            timeout_secs: 30,
            max_transient_failures: 2,
            retry_base_delay_ms: 400,
            ..MirrorConfig::default()
        };
        let poll = config.poll_config();
        assert_eq!(poll.interval, Duration::from_millis(250));
        assert_eq!(poll.timeout, Duration::from_secs(30));
        assert_eq!(poll.retry.max_retries, 2);
        assert_eq!(poll.retry.delay_for_attempt(2), 800);
    }

    #[test]
    fn processing_config_keeps_pipeline_defaults() {
        let config = MirrorConfig {
            quality: "draft".into(),
            ..MirrorConfig::default()
        };
        let processing = config.processing_config();
        assert_eq!(processing.quality, "draft");
        assert_eq!(processing.pipeline, "rendernet_pike");
        assert!(processing.unity_compatible);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MirrorConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "timeout_secs = 45\nenvironment = \"beach\"\n").unwrap();
        let config = MirrorConfig::load_from(&path).unwrap();
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.environment, "beach");
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(MirrorConfig::load_from(&path).is_err());
    }
}
