use crate::{
    image::ImageLoader,
    scene::ClassificationResult,
    utils::error::ClassifyError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// JSON request body (base64 mode)
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64 image data, optionally a `data:` URL
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    #[serde(flatten)]
    pub result: ClassificationResult,
    /// Confidence formatted for display, e.g. `87.3%`
    pub confidence_text: String,
    /// Seconds spent in the classifier
    pub processing_time: f32,
}

/// Multipart upload: field `file` (or `image`) carrying the image.
pub async fn predict_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassificationResponse>>> {
    tracing::info!("Processing upload request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifyError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" | "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    return Err(ClassifyError::InvalidInput("No file selected".to_string()));
                }
                if !ImageLoader::is_allowed_filename(&filename) {
                    return Err(ClassifyError::UnsupportedFormat(format!(
                        "Invalid file type: {}",
                        filename
                    )));
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifyError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifyError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file '{}': {} bytes", filename, data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| ClassifyError::InvalidInput("No file uploaded".to_string()))?;

    let response = run_classifier(&state, image_data.to_vec()).await?;

    tracing::info!(
        "Upload classification completed: request_id={}, label={}, time={:.3}s",
        request_id,
        response.result.label,
        response.processing_time
    );

    Ok(Json(ApiResponse::success(response, request_id)))
}

/// JSON upload with a base64-encoded image.
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassificationResponse>>> {
    tracing::info!("Processing JSON request: request_id={}", request_id);

    let bytes = ImageLoader::decode_base64(
        &request.image,
        state.config.server_config.max_request_size,
    )?;

    let response = run_classifier(&state, bytes).await?;

    tracing::info!(
        "JSON classification completed: request_id={}, label={}, time={:.3}s",
        request_id,
        response.result.label,
        response.processing_time
    );

    Ok(Json(ApiResponse::success(response, request_id)))
}

/// Inference is CPU bound and synchronous, so it runs on the blocking pool.
async fn run_classifier(state: &AppState, bytes: Vec<u8>) -> Result<ClassificationResponse> {
    let classifier = Arc::clone(&state.classifier);
    let start = Instant::now();

    let result = tokio::task::spawn_blocking(move || classifier.classify(&bytes))
        .await
        .map_err(|e| ClassifyError::Internal(format!("Classification task failed: {}", e)))??;

    Ok(ClassificationResponse {
        confidence_text: result.confidence_display(),
        result,
        processing_time: start.elapsed().as_secs_f32(),
    })
}
