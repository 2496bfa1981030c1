//! Catalog image upload.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::middleware::RequireDevops;
use crate::services::UploadForm;
use crate::services::uploads::UploadedFile;
use crate::state::AppState;

/// Collect the multipart fields without touching the filesystem.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let malformed = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                form.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("entity_type") => form.entity_type = Some(field.text().await.map_err(malformed)?),
            Some("entity_id") => form.entity_id = Some(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }
    Ok(form)
}

/// POST /upload-image
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    _devops: RequireDevops,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_form(multipart).await?;
    let catalog = CatalogRepository::new(state.catalog_pool());
    let image_url = state.images().upload(&catalog, form).await?;

    Ok(Json(json!({
        "success": true,
        "image_url": image_url,
    })))
}
