use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};
use uuid::Uuid;

use hearth_catalog::property::PropertyImage;

use crate::error::AppError;
use crate::middleware::auth::AgentAuth;
use crate::properties::owned_property;
use crate::response::{message_only, success_with_message, ApiResponse};
use crate::state::AppState;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/properties/{id}/images", post(upload_image))
        .route("/properties/{id}/images/{image_id}", delete(delete_image))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/properties/{id}/images
/// Multipart upload of one or more listing photos. Files land under the
/// uploads directory and are served back at `/uploads/...`. The first
/// photo of a listing becomes its primary image.
async fn upload_image(
    State(state): State<AppState>,
    AgentAuth(claims): AgentAuth,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<PropertyImage>>>, AppError> {
    owned_property(&state, &claims, id).await?;

    let existing = state.properties.images(id).await?;
    let mut count = existing.len() as u32;
    let mut saved = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed upload: {e}")))?
    {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::Validation(format!(
                "unsupported file type: {file_name}"
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("upload failed: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("empty file".into()));
        }
        if bytes.len() > state.uploads.max_bytes {
            return Err(AppError::Validation("file exceeds the size limit".into()));
        }

        if count >= state.rules.max_images_per_property {
            return Err(AppError::Validation(format!(
                "a listing can have at most {} images",
                state.rules.max_images_per_property
            )));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4().simple(), extension);
        let dir = std::path::Path::new(&state.uploads.dir)
            .join("properties")
            .join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        tokio::fs::write(dir.join(&stored_name), &bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let url = format!("/uploads/properties/{}/{}", id, stored_name);
        let is_primary = count == 0;
        let image = state.properties.add_image(id, &url, is_primary).await?;

        count += 1;
        saved.push(image);
    }

    if saved.is_empty() {
        return Err(AppError::Validation("no files in upload".into()));
    }

    Ok(success_with_message(saved, "images uploaded"))
}

/// DELETE /v1/properties/{id}/images/{image_id}
async fn delete_image(
    State(state): State<AppState>,
    AgentAuth(claims): AgentAuth,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    owned_property(&state, &claims, id).await?;

    // Drop the row; the file itself is left for out-of-band cleanup so a
    // slow delete cannot 500 after the database change.
    state.properties.remove_image(id, image_id).await?;

    Ok(message_only("image removed"))
}
