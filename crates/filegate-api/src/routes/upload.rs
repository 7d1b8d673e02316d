use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use filegate_core::{AppState, DetectedType, UploadedFile, Verdict};
use serde::Serialize;

use crate::error::ApiError;

/// Multipart form field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Allowance for multipart boundaries and part headers on top of the
/// payload cap.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Detected {
    Known(DetectedType),
    Unknown(&'static str),
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub detected: Detected,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_as: Option<String>,
}

impl UploadResponse {
    fn from_verdict(verdict: &Verdict, file: Option<(&str, u64)>, stored_as: Option<String>) -> Self {
        Self {
            ok: verdict.safe(),
            verdict: if verdict.safe() { "SAFE" } else { "UNSAFE" },
            filename: file.map(|(name, _)| name.to_string()),
            size: file.map(|(_, size)| size),
            detected: verdict
                .detected_type()
                .cloned()
                .map(Detected::Known)
                .unwrap_or(Detected::Unknown("unknown")),
            reasons: verdict.reasons().to_vec(),
            stored_as,
        }
    }

    fn too_large(limit: u64) -> Self {
        let verdict = Verdict::rejected(format!("file too large (max {} bytes)", limit));
        Self::from_verdict(&verdict, None, None)
    }
}

enum Received {
    File(UploadedFile),
    Missing,
    TooLarge,
}

async fn read_file_field(multipart: &mut Multipart, limit: u64) -> Result<Received, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // The body limit can trip while skipping other fields
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Ok(Received::TooLarge),
            Err(e) => return Err(multipart_error(e)),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Ok(Received::TooLarge),
            Err(e) => return Err(multipart_error(e)),
        };
        if bytes.len() as u64 > limit {
            return Ok(Received::TooLarge);
        }
        return Ok(Received::File(UploadedFile {
            name,
            declared_size: bytes.len() as u64,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(Received::Missing)
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}

pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let limit = state.max_upload_size;

    // Reject early when the declared body cannot fit
    if let Some(content_length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if content_length > limit.saturating_add(MULTIPART_OVERHEAD) {
            tracing::info!("Rejected upload with Content-Length {}", content_length);
            return Ok((StatusCode::PAYLOAD_TOO_LARGE, Json(UploadResponse::too_large(limit))));
        }
    }

    let file = match read_file_field(&mut multipart, limit).await {
        Ok(Received::File(file)) => Some(file),
        Ok(Received::Missing) => None,
        Ok(Received::TooLarge) => {
            tracing::info!("Rejected upload larger than {} bytes", limit);
            return Ok((StatusCode::PAYLOAD_TOO_LARGE, Json(UploadResponse::too_large(limit))));
        }
        Err(e) => return Err(e),
    };

    let gate = state.gate.clone();
    let store = state.store.clone();
    let (file, verdict, stored) = tokio::task::spawn_blocking(move || {
        let verdict = gate.evaluate(file.as_ref());
        let stored = match (&file, verdict.safe()) {
            (Some(file), true) => store.persist(&file.name, &file.bytes).map(Some),
            _ => Ok(None),
        };
        (file, verdict, stored)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("upload evaluation panicked: {}", e)))?;

    let stored_as = stored.map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
    let response = UploadResponse::from_verdict(
        &verdict,
        file.as_ref().map(|f| (f.name.as_str(), f.declared_size)),
        stored_as,
    );

    Ok((StatusCode::OK, Json(response)))
}
