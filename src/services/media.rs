use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::dto::ImageUpload;

pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;
pub const MIN_IMAGE_SIDE: u32 = 100;

/// Stockage opaque des fichiers média. Renvoie le chemin relatif enregistré
/// sur le compte.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, folder: &str, extension: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Fichiers posés sous MEDIA_ROOT/<folder>/<uuid>.<ext>
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, folder: &str, extension: &str, bytes: Vec<u8>) -> Result<String> {
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create media folder: {}", e)))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&file_name), bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write media file: {}", e)))?;

        Ok(format!("{}/{}", folder, file_name))
    }
}

#[derive(Debug)]
pub struct ValidatedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Type MIME image, contenu base64 valide, <= 1 Mo, >= 100x100 px
pub fn validate_image(field: &str, upload: &ImageUpload) -> Result<ValidatedImage> {
    if !upload.content_type.trim().to_lowercase().starts_with("image/") {
        return Err(AppError::field(field, "File must be an image."));
    }

    // Accepte aussi les data URLs ("data:image/png;base64,....")
    let payload = match upload.data.split_once("base64,") {
        Some((_, data)) => data,
        None => upload.data.as_str(),
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::field(field, "Image data is not valid base64."))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::field(field, "Image file size must be under 1 MB."));
    }

    let not_an_image = || AppError::field(field, "Upload a valid image.");
    let reader = image::io::Reader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|_| not_an_image())?;

    let extension = match reader.format() {
        Some(ImageFormat::Png) => "png",
        Some(ImageFormat::Jpeg) => "jpg",
        Some(ImageFormat::Gif) => "gif",
        Some(ImageFormat::WebP) => "webp",
        _ => return Err(not_an_image()),
    };

    let (width, height) = reader.into_dimensions().map_err(|_| not_an_image())?;
    if width < MIN_IMAGE_SIDE || height < MIN_IMAGE_SIDE {
        return Err(AppError::field(
            field,
            "Image dimensions must be at least 100x100 px.",
        ));
    }

    Ok(ValidatedImage { bytes, extension })
}

#[cfg(test)]
pub(crate) fn png_upload(width: u32, height: u32) -> ImageUpload {
    use image::{DynamicImage, ImageOutputFormat, RgbImage};

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .unwrap();

    ImageUpload {
        content_type: "image/png".to_string(),
        data: STANDARD.encode(buffer.into_inner()),
    }
}
