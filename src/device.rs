//! Camera, picker and device-gallery seams.

use crate::codec;
use crate::error::{Result, ScanError};
use crate::types::RawImage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source of new images: a camera shutter or a photo-library picker.
#[async_trait]
pub trait ImageAcquirer: Send + Sync {
    async fn acquire_image(&self) -> Result<RawImage>;
}

/// Device media store that keeps a copy of every capture.
#[async_trait]
pub trait DeviceGallery: Send + Sync {
    async fn persist(&self, bytes: &[u8]) -> Result<PathBuf>;
}

/// Picker over an already chosen file on disk.
pub struct FileAcquirer {
    path: PathBuf,
}

impl FileAcquirer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileAcquirer { path: path.into() }
    }
}

#[async_trait]
impl ImageAcquirer for FileAcquirer {
    async fn acquire_image(&self) -> Result<RawImage> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| {
            ScanError::Acquisition(format!("Could not open {}: {}", self.path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(ScanError::Acquisition(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        Ok(RawImage::File(self.path.clone()))
    }
}

/// Album directory standing in for the device photo library.
pub struct DirectoryGallery {
    dir: PathBuf,
}

impl DirectoryGallery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryGallery { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn extension_for(bytes: &[u8]) -> &'static str {
    match codec::sniff_mime(bytes) {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

#[async_trait]
impl DeviceGallery for DirectoryGallery {
    async fn persist(&self, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ScanError::Acquisition(format!("Could not create album {}: {}", self.dir.display(), e))
        })?;
        let path = self
            .dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), extension_for(bytes)));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ScanError::Acquisition(format!("Could not save image to gallery: {}", e))
        })?;
        info!(path = %path.display(), "capture saved to device gallery");
        Ok(path)
    }
}
