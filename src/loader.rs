//! Reading and decoding the user's image file.

use crate::error::{Error, Result};
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The raw file as selected by the user, uploaded unchanged on submit.
#[derive(Clone, Debug)]
pub struct ImageFile {
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string()
    }

    pub fn mime_type(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .ok()
            .or_else(|| ImageFormat::from_path(&self.path).ok())
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }
}

/// A decoded image ready to be laid out.
pub struct LoadedImage {
    pub file: ImageFile,
    pub native: [u32; 2],
    pub pixels: RgbaImage,
}

impl LoadedImage {
    /// Downscale the display copy so its long side is at most `max_side`.
    /// `native` keeps the file's real size.
    pub fn limit_pixels(mut self, max_side: u32) -> Self {
        let (w, h) = self.pixels.dimensions();
        let longest = w.max(h);
        if longest > max_side {
            let scale = max_side as f32 / longest as f32;
            let nw = ((w as f32 * scale).round() as u32).max(1);
            let nh = ((h as f32 * scale).round() as u32).max(1);
            log::debug!("Display copy of {} reduced to {nw}x{nh}", self.file.file_name());
            self.pixels = image::imageops::thumbnail(&self.pixels, nw, nh);
        }
        self
    }
}

pub fn read(path: &Path) -> Result<ImageFile> {
    let bytes = std::fs::read(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(e),
    })?;
    log::info!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(ImageFile {
        path: path.to_path_buf(),
        bytes: bytes.into(),
    })
}

pub fn decode(file: ImageFile) -> Result<LoadedImage> {
    let img = image::load_from_memory(&file.bytes).map_err(|source| Error::ImageLoad {
        path: file.path.clone(),
        source,
    })?;
    let native = check_dimensions(img.width(), img.height())?;
    log::info!(
        "Decoded {}: natural size {}x{}",
        file.path.display(),
        native[0],
        native[1]
    );
    Ok(LoadedImage {
        file,
        native,
        pixels: img.to_rgba8(),
    })
}

pub fn load(path: &Path) -> Result<LoadedImage> {
    decode(read(path)?)
}

/// Both natural dimensions must be nonzero.
pub fn check_dimensions(width: u32, height: u32) -> Result<[u32; 2]> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidImage { width, height });
    }
    Ok([width, height])
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([200, 180, 40, 255]),
    ));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
