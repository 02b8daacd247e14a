/// Display bitmaps for the viewer
/// Decodes the image and downscales it so the long edge fits the screen
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

/// Decoded RGBA8 pixels ready for an iced image handle
#[derive(Clone)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for PreviewImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Load a preview for the viewer
/// Runs the decode on the blocking pool so the UI stays responsive
pub async fn load_preview_async(path: PathBuf, max_edge: u32) -> Result<PreviewImage, String> {
    tokio::task::spawn_blocking(move || load_preview(&path, max_edge))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())
}

/// Decode `path` and shrink it so neither side exceeds `max_edge`.
/// Images already small enough keep their size.
pub fn load_preview(path: &Path, max_edge: u32) -> Result<PreviewImage, image::ImageError> {
    let img = image::open(path)?;

    let img = if img.width() > max_edge || img.height() > max_edge {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    } else {
        img
    };

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::debug!("📸 Decoded preview {}x{}: {}", width, height, path.display());

    Ok(PreviewImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
