/// Image decode/encode at the edges of the pipeline
///
/// Decoding produces a packed RGBA8 `SourceImage`; encoding takes the
/// `Frame` read back from the screen framebuffer. Codec work is blocking,
/// so the async variants move it onto tokio's blocking pool.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{FilterError, Result};
use crate::state::data::{Frame, SourceImage};

/// Extensions offered in the open dialog
pub const OPEN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Extensions offered in the save dialog
pub const SAVE_EXTENSIONS: &[&str] = &["png", "bmp", "jpg", "tif"];

/// Decode any supported image file into RGBA8
pub fn load_image(path: &Path) -> Result<SourceImage> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    info!(path = %path.display(), width, height, "image decoded");
    SourceImage::new(width, height, rgba.into_raw())
}

/// Encode a rendered frame; the format follows the file extension
pub fn save_frame(path: &Path, frame: &Frame) -> Result<()> {
    let buffer = image::RgbaImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| FilterError::invalid("frame buffer does not match its dimensions"))?;

    // JPEG has no alpha channel
    let is_jpeg = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);
    if is_jpeg {
        image::DynamicImage::ImageRgba8(buffer).to_rgb8().save(path)?;
    } else {
        buffer.save(path)?;
    }

    info!(path = %path.display(), width = frame.width, height = frame.height, "frame saved");
    Ok(())
}

/// `load_image` on the blocking pool
pub async fn load_image_async(path: PathBuf) -> std::result::Result<SourceImage, String> {
    tokio::task::spawn_blocking(move || load_image(&path).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// `save_frame` on the blocking pool, returning the written path
pub async fn save_frame_async(path: PathBuf, frame: Frame) -> std::result::Result<PathBuf, String> {
    tokio::task::spawn_blocking(move || {
        save_frame(&path, &frame)
            .map(|_| path)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

/// Timestamped default name for the save dialog
pub fn default_save_name() -> String {
    format!("filtered_{}.png", Local::now().format("%Y%m%d_%H%M%S"))
}
