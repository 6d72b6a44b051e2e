use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use tracing::debug;

use super::types::{HealthStatus, ProcessingConfig, RawStatusResponse, Submission};
use crate::config::MirrorConfig;
use crate::error::{ImageRejection, PipelineError, TransportError};

const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// The two network operations the pipeline needs.
///
/// Implementations make a single attempt per call. Retries, backoff and
/// timeouts belong to the [`JobOrchestrator`](crate::pipeline::JobOrchestrator).
#[allow(async_fn_in_trait)]
pub trait AvatarTransport {
    /// Upload a photo and submit a generation job.
    async fn upload(&self, image: &[u8], content_type: &str)
    -> Result<Submission, PipelineError>;

    /// Fetch the current status of a job once.
    async fn poll_status(&self, job_id: &str) -> Result<RawStatusResponse, PipelineError>;
}

impl<T: AvatarTransport> AvatarTransport for &T {
    async fn upload(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Submission, PipelineError> {
        (**self).upload(image, content_type).await
    }

    async fn poll_status(&self, job_id: &str) -> Result<RawStatusResponse, PipelineError> {
        (**self).poll_status(job_id).await
    }
}

/// Reject images that cannot be uploaded, before touching the network.
pub fn validate_image(
    image: &[u8],
    content_type: &str,
    max_bytes: usize,
) -> Result<(), PipelineError> {
    if image.is_empty() {
        return Err(PipelineError::ImageEncodingFailed(ImageRejection::Empty));
    }
    if image.len() > max_bytes {
        return Err(PipelineError::ImageEncodingFailed(ImageRejection::TooLarge {
            size: image.len(),
            limit: max_bytes,
        }));
    }
    if !content_type.starts_with("image/") {
        return Err(PipelineError::ImageEncodingFailed(
            ImageRejection::UnsupportedContentType(content_type.to_string()),
        ));
    }
    Ok(())
}

/// HTTP client for the avatar generation backend.
pub struct AvatarClient {
    client: Client,
    base_url: Url,
    processing: ProcessingConfig,
    max_image_bytes: usize,
}

impl AvatarClient {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::build(
            base_url,
            Duration::from_secs(10),
            Duration::from_secs(60),
            ProcessingConfig::default(),
            DEFAULT_MAX_IMAGE_BYTES,
        )
    }

    pub fn from_config(config: &MirrorConfig) -> Result<Self, TransportError> {
        Self::build(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
            config.processing_config(),
            config.max_image_bytes,
        )
    }

    fn build(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
        processing: ProcessingConfig,
        max_image_bytes: usize,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid base URL {base_url:?}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }
        Ok(Self {
            client,
            base_url,
            processing,
            max_image_bytes,
        })
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        let base = self.base_url.as_str();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidRequest(format!("{base} cannot be a base URL")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Query the backend health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, PipelineError> {
        let url = self.endpoint(&["health"])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransportError::from)?;
        let response = ensure_success(response).await?;
        let health = response
            .json::<HealthStatus>()
            .await
            .map_err(TransportError::from)?;
        Ok(health)
    }

    fn form(&self, image: &[u8], content_type: &str) -> Result<Form, PipelineError> {
        let file_name = match content_type {
            "image/png" => "photo.png",
            _ => "photo.jpg",
        };
        let photo = Part::bytes(image.to_vec())
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|_| {
                PipelineError::ImageEncodingFailed(ImageRejection::UnsupportedContentType(
                    content_type.to_string(),
                ))
            })?;
        let config = serde_json::to_string(&self.processing)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Form::new().part("photo", photo).text("config", config))
    }
}

impl AvatarTransport for AvatarClient {
    async fn upload(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Submission, PipelineError> {
        validate_image(image, content_type, self.max_image_bytes)?;
        let form = self.form(image, content_type)?;

        let url = self.endpoint(&["api", "v1", "process-avatar"])?;
        debug!(%url, bytes = image.len(), "uploading photo");
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from)?;
        let response = ensure_success(response).await?;

        let submission = response
            .json::<Submission>()
            .await
            .map_err(TransportError::from)?;
        if submission.job_id.trim().is_empty() {
            return Err(TransportError::InvalidResponse("empty jobId".to_string()).into());
        }
        Ok(submission)
    }

    async fn poll_status(&self, job_id: &str) -> Result<RawStatusResponse, PipelineError> {
        let url = self.endpoint(&["api", "v1", "status", job_id])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransportError::from)?;
        let response = ensure_success(response).await?;
        let status = response
            .json::<RawStatusResponse>()
            .await
            .map_err(TransportError::from)?;
        Ok(status)
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_image() {
        let err = validate_image(&[], "image/jpeg", 10).unwrap_err();
        assert_eq!(err, PipelineError::ImageEncodingFailed(ImageRejection::Empty));
    }

    #[test]
    fn validate_rejects_oversized_image() {
        let err = validate_image(&[0u8; 11], "image/jpeg", 10).unwrap_err();
        assert_eq!(
            err,
            PipelineError::ImageEncodingFailed(ImageRejection::TooLarge { size: 11, limit: 10 })
        );
    }

    #[test]
    fn validate_rejects_non_image_content_type() {
        let err = validate_image(&[1, 2, 3], "text/plain", 10).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ImageEncodingFailed(ImageRejection::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn validate_accepts_image_at_limit() {
        assert!(validate_image(&[0u8; 10], "image/jpeg", 10).is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = AvatarClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn job_id_is_a_single_escaped_path_segment() {
        let client = AvatarClient::new("http://localhost:5000/").unwrap();
        for (job_id, expected) in [
            ("job-1", "/api/v1/status/job-1"),
            ("job#7", "/api/v1/status/job%237"),
            ("job?7", "/api/v1/status/job%3F7"),
            ("a/b", "/api/v1/status/a%2Fb"),
        ] {
            let url = client.endpoint(&["api", "v1", "status", job_id]).unwrap();
            assert_eq!(url.path(), expected);
            assert_eq!(url.query(), None);
            assert_eq!(url.fragment(), None);
        }
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = AvatarClient::new("https://gateway.example/avatars/").unwrap();
        let url = client.endpoint(&["health"]).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example/avatars/health");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            AvatarClient::new("not a url"),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn from_config_uses_configured_base_url() {
        let config = MirrorConfig {
            base_url: "https://avatars.example".to_string(),
            ..MirrorConfig::default()
        };
        let client = AvatarClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "https://avatars.example");
        assert_eq!(client.max_image_bytes, config.max_image_bytes);
    }
}
