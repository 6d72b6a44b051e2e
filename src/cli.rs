//! Command line interface, built on clap.
//!
//! Subcommands [`Command`] (generate, health, stages) plus global flags that
//! override `mirrorworld.toml` for one run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mirrorworld::config::MirrorConfig;

/// MirrorWorld: turn a photo into an animated 3D avatar.
#[derive(Debug, Parser)]
#[command(name = "mirrorworld", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend root URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Give up polling after this many seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Delay between status requests, in milliseconds.
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Consecutive transient poll failures to tolerate.
    #[arg(long, global = true)]
    pub max_transient_failures: Option<u32>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a photo and wait for the generated avatar.
    Generate {
        /// Path to a JPEG or PNG photo.
        photo: PathBuf,
    },

    /// Check that the backend is reachable.
    Health,

    /// List the pipeline stages in order.
    Stages,
}

impl Cli {
    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut MirrorConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(n) = self.max_transient_failures {
            config.max_transient_failures = n;
        }
    }
}

/// Content type for a photo, inferred from its extension.
pub fn content_type_for(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}
