use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    artifact_store::ArtifactName,
    error::ApiError,
    models::{JobLookup, UploadResponse},
    AppState,
};

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true, "timestamp": Utc::now() }))
}

pub async fn upload_deck(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::invalid(format!("Malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string).unwrap_or_default();
        if original_name.is_empty() {
            return Err(ApiError::invalid("Empty filename"));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::invalid(format!("Unreadable file part: {err}")))?;

        let uid = Uuid::new_v4();
        let name = ArtifactName::for_upload(&original_name, Utc::now(), uid);
        let stored = state.store.store_upload(&name, &bytes).await?;

        info!(
            uid = %uid,
            original = %original_name,
            artifact = %stored.display(),
            size_bytes = bytes.len(),
            "Deck accepted for explanation"
        );

        return Ok(Json(UploadResponse {
            uid: uid.to_string(),
        }));
    }

    Err(ApiError::invalid("No file attached"))
}

pub async fn deck_status(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = state.store.lookup(&uid).await?;
    if matches!(lookup, JobLookup::NotFound) {
        return Err(ApiError::NotFound);
    }
    Ok(Json(lookup.to_response()))
}
