pub mod client;
pub mod types;

pub use client::{AvatarClient, AvatarTransport, validate_image};
pub use types::{
    AssetMetadata, GeneratedAssets, HealthStatus, ProcessingConfig, RawStatusResponse, Submission,
};
