//! Catalog image uploads.
//!
//! Files land in `<upload folder>/<entity_type>/<uuid><ext>` and are served
//! back under `/media/<entity_type>/<file>`. The request is fully validated
//! before the filesystem is touched.
//!
//! Images are shrunk to fit 800x800, flattened to RGB and re-encoded in
//! their own format. Anything that fails to decode is stored as received.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use belgrano_tickets_core::EntityType;

use crate::db::{CatalogRepository, RepositoryError};

/// Accepted image extensions, lowercase with the leading dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Longest side kept for stored images, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 800;

const JPEG_QUALITY: u8 = 85;

/// Upload failures. Display strings are returned to the client.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,

    #[error("Invalid or missing entity_type")]
    InvalidEntityType,

    #[error("Invalid or missing entity_id")]
    InvalidEntityId,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("Invalid file type")]
    InvalidFileType,

    #[error("Failed to update entity with image")]
    EntityNotUpdated,

    #[error("file storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UploadError {
    /// Whether the client sent a bad request (as opposed to a server fault).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NoFilePart
                | Self::InvalidEntityType
                | Self::InvalidEntityId
                | Self::NoSelectedFile
                | Self::InvalidFileType
        )
    }
}

/// The file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name; only its extension is used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw multipart fields, as received.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// A request that passed every check.
#[derive(Debug)]
pub struct ValidUpload {
    pub entity: EntityType,
    pub entity_id: i64,
    /// Lowercased extension including the dot.
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Lowercased, allowed extension of `filename`, if any.
#[must_use]
pub fn allowed_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| allowed.strip_prefix('.') == Some(ext.as_str()))
}

impl UploadForm {
    /// Check the fields in the order clients have always seen errors
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an `UploadError`.
    pub fn validate(self) -> Result<ValidUpload, UploadError> {
        let file = self.file.ok_or(UploadError::NoFilePart)?;

        let entity: EntityType = self
            .entity_type
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or(UploadError::InvalidEntityType)?;

        let entity_id = self
            .entity_id
            .as_deref()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(UploadError::InvalidEntityId)?;

        if file.filename.is_empty() {
            return Err(UploadError::NoSelectedFile);
        }
        let extension = allowed_extension(&file.filename).ok_or(UploadError::InvalidFileType)?;

        Ok(ValidUpload {
            entity,
            entity_id,
            extension,
            bytes: file.bytes,
        })
    }
}

/// Resize and re-encode an uploaded image.
///
/// Returns the input unchanged when it cannot be decoded or re-encoded.
/// CPU bound; call it from a blocking task.
#[must_use]
pub fn optimize_image(bytes: Vec<u8>) -> Vec<u8> {
    match reencode(&bytes) {
        Ok(optimized) => optimized,
        Err(e) => {
            debug!(error = %e, "Storing image as received");
            bytes
        }
    }
}

fn reencode(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let format = image::guess_format(bytes)?;
    let mut img = image::load_from_memory_with_format(bytes, format)?;

    if img.color().has_alpha() {
        img = DynamicImage::ImageRgb8(img.to_rgb8());
    }
    if img.width() > MAX_IMAGE_SIDE || img.height() > MAX_IMAGE_SIDE {
        img = img.resize(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE, FilterType::Lanczos3);
    }

    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
        }
        ImageFormat::Png => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                PngFilter::Adaptive,
            ))?;
        }
        other => img.write_to(&mut Cursor::new(&mut out), other)?,
    }
    Ok(out)
}

/// Directory tree holding uploaded images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for one entity type.
    #[must_use]
    pub fn dir(&self, entity: EntityType) -> PathBuf {
        self.root.join(entity.as_str())
    }

    /// Validate, store, and link an image to its catalog row.
    ///
    /// Returns the public URL. If no row matches, the stored file is removed
    /// again.
    ///
    /// # Errors
    ///
    /// Returns a client-facing `UploadError` for invalid requests,
    /// `UploadError::EntityNotUpdated` when no row matched, and
    /// `UploadError::Io`/`Repository` for server faults.
    pub async fn upload(
        &self,
        catalog: &CatalogRepository<'_>,
        form: UploadForm,
    ) -> Result<String, UploadError> {
        let upload = form.validate()?;
        let bytes = tokio::task::spawn_blocking(move || optimize_image(upload.bytes)).await?;

        let filename = format!("{}{}", Uuid::new_v4(), upload.extension);
        let dir = self.dir(upload.entity);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;

        let url = format!("/media/{}/{filename}", upload.entity);
        let updated = match catalog
            .set_image_url(upload.entity, upload.entity_id, &url)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.discard(&path).await;
                return Err(e.into());
            }
        };
        if !updated {
            self.discard(&path).await;
            return Err(UploadError::EntityNotUpdated);
        }

        info!(entity = %upload.entity, entity_id = upload.entity_id, %url, "Image uploaded");
        Ok(url)
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            error!(path = %path.display(), error = %e, "Error cleaning up uploaded file");
        }
    }
}
