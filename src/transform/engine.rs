/// The pixel-transform capability
///
/// The pipeline only knows the [`TransformEngine`] trait. [`ImageEngine`] is
/// the stock implementation, built on the `image` crate; it decodes whatever
/// format it is given and always encodes the result as PNG.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::catalog::Filter;
use crate::error::TransformError;

/// Something that can run a catalog filter over encoded image bytes
pub trait TransformEngine: Send + Sync {
    /// One-time setup, run before the first `apply`
    fn init(&self) -> Result<(), TransformError> {
        Ok(())
    }

    /// Apply `filter` to `bytes`, returning newly encoded bytes
    fn apply(&self, bytes: &[u8], filter: &Filter) -> Result<Vec<u8>, TransformError>;
}

/// `image`-crate backed engine
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TransformEngine for ImageEngine {
    /// Make sure the PNG encoder every filter relies on actually works
    fn init(&self) -> Result<(), TransformError> {
        let probe = DynamicImage::new_rgba8(1, 1);
        encode_png(&probe).map_err(|e| TransformError::Init(e.to_string()))?;
        log::info!("🎨 Image engine ready");
        Ok(())
    }

    fn apply(&self, bytes: &[u8], filter: &Filter) -> Result<Vec<u8>, TransformError> {
        let failed = |reason: String| TransformError::Failed {
            filter: filter.name().to_string(),
            reason,
        };

        filter.validate()?;

        let img = image::load_from_memory(bytes)
            .map_err(|e| failed(format!("cannot decode input: {}", e)))?;

        let output = match *filter {
            Filter::Resize { width, height } => img.resize(width, height, FilterType::Lanczos3),
            Filter::Grayscale => img.grayscale(),
            Filter::Blur { sigma } => img.blur(sigma),
        };

        encode_png(&output).map_err(|e| failed(format!("cannot encode output: {}", e)))
    }
}

fn encode_png(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
