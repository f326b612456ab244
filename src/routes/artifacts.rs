use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::docgen::docx::DOCX_CONTENT_TYPE;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Serves generated artifacts at `/public/pv/<document-id>.<ext>`. The
/// filename must be exactly a UUID plus a known extension, which also rules
/// out any path traversal.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<impl IntoResponse> {
    let (stem, extension) = filename
        .rsplit_once('.')
        .ok_or_else(AppError::not_found)?;
    if Uuid::parse_str(stem).is_err() {
        return Err(AppError::not_found());
    }
    let content_type = match extension {
        "docx" => DOCX_CONTENT_TYPE,
        "pdf" => "application/pdf",
        _ => return Err(AppError::not_found()),
    };

    let key = format!("pv/{filename}");
    let bytes = state
        .artifacts
        .get(&key)
        .await
        .map_err(|_| AppError::not_found())?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok((headers, bytes))
}
