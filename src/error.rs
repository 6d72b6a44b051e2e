//! Error taxonomy for the avatar pipeline client.
//!
//! [`PipelineError`] is the tag the consumer receives in a terminal
//! [`PipelineState`](crate::pipeline::PipelineState). It is `Clone` and
//! `PartialEq` so it can travel inside published states, which is why
//! transport causes are flattened to strings in [`TransportError`] instead of
//! wrapping `reqwest::Error` directly.

use serde::Serialize;
use thiserror::Error;

/// Terminal failure of a job, surfaced exactly once to the consumer.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "cause")]
pub enum PipelineError {
    /// The image was rejected locally before any network call.
    #[error("image encoding failed: {0}")]
    ImageEncodingFailed(ImageRejection),

    /// A call to the backend failed at the transport or protocol level.
    /// Covers the upload as well as status polls.
    #[error("upload failed: {0}")]
    UploadFailed(TransportError),

    /// The wall-clock budget ran out while polling.
    #[error("timed out waiting for avatar generation")]
    Timeout,

    /// The backend reported a failure in a status payload.
    #[error("server reported failure: {0}")]
    ServerReported(String),

    /// The caller cancelled the job.
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether a poll that failed with this error may be retried under the
    /// bounded transient-failure tolerance.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::UploadFailed(cause) => cause.is_transient(),
            _ => false,
        }
    }
}

/// Why a call to the backend failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum TransportError {
    /// Connection, DNS or request-timeout failure below HTTP.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    /// The body could not be decoded or violates the protocol contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request body could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::InvalidResponse(_) | TransportError::InvalidRequest(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        PipelineError::UploadFailed(err)
    }
}

/// Reasons an image is refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ImageRejection {
    #[error("image is empty")]
    Empty,

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_failed_display_includes_cause() {
        let err = PipelineError::UploadFailed(TransportError::Status {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(err.to_string(), "upload failed: HTTP status 500: boom");
    }

    #[test]
    fn image_rejection_display() {
        let err = PipelineError::ImageEncodingFailed(ImageRejection::TooLarge {
            size: 20,
            limit: 10,
        });
        assert_eq!(
            err.to_string(),
            "image encoding failed: image is 20 bytes, limit is 10"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(PipelineError::UploadFailed(TransportError::Network("reset".into())).is_transient());
        assert!(
            PipelineError::UploadFailed(TransportError::Status {
                status: 503,
                message: String::new(),
            })
            .is_transient()
        );
        assert!(
            PipelineError::UploadFailed(TransportError::Status {
                status: 429,
                message: String::new(),
            })
            .is_transient()
        );
        assert!(
            !PipelineError::UploadFailed(TransportError::Status {
                status: 404,
                message: String::new(),
            })
            .is_transient()
        );
        assert!(
            !PipelineError::UploadFailed(TransportError::InvalidResponse("bad".into()))
                .is_transient()
        );
        assert!(!PipelineError::Timeout.is_transient());
        assert!(!PipelineError::ServerReported("oops".into()).is_transient());
        assert!(!PipelineError::Cancelled.is_transient());
    }

    #[test]
    fn transport_error_converts_to_upload_failed() {
        let err: PipelineError = TransportError::InvalidResponse("missing jobId".into()).into();
        assert!(matches!(
            err,
            PipelineError::UploadFailed(TransportError::InvalidResponse(_))
        ));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(PipelineError::ServerReported("gpu lost".into())).unwrap();
        assert_eq!(json["kind"], "ServerReported");
        assert_eq!(json["cause"], "gpu lost");

        let json = serde_json::to_value(PipelineError::Timeout).unwrap();
        assert_eq!(json["kind"], "Timeout");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
