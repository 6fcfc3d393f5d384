//! Source image checks done before the compressor sees a file

use crate::models::error::{CompressError, InputError};
use image::{ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Upload formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl SourceFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Png => "png",
            SourceFormat::Jpeg => "jpg",
            SourceFormat::Gif => "gif",
            SourceFormat::WebP => "webp",
        }
    }

    /// basisu cannot read WebP, so those are converted to PNG first.
    pub fn needs_transcode(self) -> bool {
        self == SourceFormat::WebP
    }
}

/// Detects the format from leading bytes, ignoring whatever the file name claims.
pub fn detect_format(header: &[u8]) -> Result<SourceFormat, InputError> {
    match image::guess_format(header) {
        Ok(ImageFormat::Png) => Ok(SourceFormat::Png),
        Ok(ImageFormat::Jpeg) => Ok(SourceFormat::Jpeg),
        Ok(ImageFormat::Gif) => Ok(SourceFormat::Gif),
        Ok(ImageFormat::WebP) => Ok(SourceFormat::WebP),
        _ => Err(InputError::UnsupportedFormat),
    }
}

pub async fn detect_file_format(path: &Path) -> Result<SourceFormat, CompressError> {
    let mut file = fs::File::open(path).await?;
    let mut header = Vec::with_capacity(32);
    (&mut file).take(32).read_to_end(&mut header).await?;
    Ok(detect_format(&header)?)
}

/// Width and height from the image header, without decoding pixels.
pub async fn dimensions(path: &Path) -> Result<(u32, u32), CompressError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> image::ImageResult<(u32, u32)> {
        ImageReader::open(&path)?.with_guessed_format()?.into_dimensions()
    })
    .await
    .map_err(|e| std::io::Error::other(format!("Task join error: {}", e)))?
    .map_err(|e| InputError::UndecodableImage(e.to_string()).into())
}

/// The compressor rejects blocks that do not tile the image exactly.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), InputError> {
    if width % 4 == 0 && height % 4 == 0 {
        Ok(())
    } else {
        Err(InputError::InvalidDimensions { width, height })
    }
}

pub async fn transcode_to_png(source: &Path, target: &Path) -> Result<(), CompressError> {
    let (source, target): (PathBuf, PathBuf) = (source.to_path_buf(), target.to_path_buf());
    info!(source = %source.display(), target = %target.display(), "Transcoding to PNG");
    tokio::task::spawn_blocking(move || -> image::ImageResult<()> {
        let img = ImageReader::open(&source)?.with_guessed_format()?.decode()?;
        img.save_with_format(&target, ImageFormat::Png)
    })
    .await
    .map_err(|e| std::io::Error::other(format!("Task join error: {}", e)))?
    .map_err(|e| InputError::UndecodableImage(e.to_string()).into())
}
