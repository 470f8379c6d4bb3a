use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the classification pipeline and its HTTP wrapper.
///
/// Payloads are plain strings so a model load failure can be cached and
/// handed to every later caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model output has {actual} classes, expected {expected}")]
    LabelMismatch { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    UnknownInference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ClassifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::UnsupportedImage(_) => StatusCode::BAD_REQUEST,
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::UnsupportedImage(_) => "UNSUPPORTED_IMAGE",
            ClassifyError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ClassifyError::LabelMismatch { .. } => "LABEL_MISMATCH",
            ClassifyError::UnknownInference(_) => "UNKNOWN_INFERENCE_ERROR",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors that leave the service unable to serve until an operator
    /// replaces the model artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClassifyError::ModelLoad(_) | ClassifyError::LabelMismatch { .. }
        )
    }

    /// Message safe to show to an end user. Faults that originate inside
    /// the runtime or the server are reduced to a generic sentence.
    pub fn public_message(&self) -> String {
        match self {
            ClassifyError::UnknownInference(_) | ClassifyError::Internal(_) => {
                "Unable to process the image".to_string()
            }
            ClassifyError::ModelLoad(_) => "Model is unavailable".to_string(),
            ClassifyError::LabelMismatch { .. } => "Model is misconfigured".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<image::ImageError> for ClassifyError {
    fn from(err: image::ImageError) -> Self {
        use image::ImageError;
        match err {
            ImageError::Parameter(_) | ImageError::Encoding(_) => {
                ClassifyError::UnknownInference(err.to_string())
            }
            // Decoding, unsupported formats, limits and truncated streams
            _ => ClassifyError::UnsupportedImage(err.to_string()),
        }
    }
}

impl From<ort::Error> for ClassifyError {
    fn from(err: ort::Error) -> Self {
        ClassifyError::UnknownInference(format!("ONNX Runtime: {err}"))
    }
}

impl From<base64::DecodeError> for ClassifyError {
    fn from(err: base64::DecodeError) -> Self {
        ClassifyError::InvalidInput(format!("Base64 decode error: {err}"))
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.public_message(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(
            ClassifyError::UnsupportedImage("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClassifyError::ModelLoad("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ClassifyError::LabelMismatch { expected: 6, actual: 5 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ClassifyError::UnknownInference("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_inference_hides_detail() {
        let err = ClassifyError::UnknownInference("segfault in kernel 0x7f".into());
        assert_eq!(err.public_message(), "Unable to process the image");
        assert!(err.to_string().contains("0x7f"));
    }

    #[test]
    fn fatal_errors() {
        assert!(ClassifyError::ModelLoad("gone".into()).is_fatal());
        assert!(ClassifyError::LabelMismatch { expected: 6, actual: 10 }.is_fatal());
        assert!(!ClassifyError::UnsupportedImage("bad".into()).is_fatal());
        assert!(!ClassifyError::UnknownInference("oops".into()).is_fatal());
    }

    #[tokio::test]
    async fn error_body_envelope() {
        use http_body_util::BodyExt;

        let response = ClassifyError::UnsupportedImage("not a png".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_IMAGE");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn decode_errors_are_user_fixable() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert!(matches!(
            ClassifyError::from(err),
            ClassifyError::UnsupportedImage(_)
        ));
    }
}
