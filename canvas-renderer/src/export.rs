//! Export of a rendered raster surface to PNG, JPEG or a data URI, and of a
//! single image cropped to a requested size.

use std::str::FromStr;

use base64::Engine;
use canvas_core::kurbo::Rect;
use canvas_core::{cover_fit, FitRequest};
use image::ImageEncoder;
use tiny_skia::Pixmap;

use crate::backend::PixmapSurface;
use crate::error::{RenderResult, SurfaceError};
use crate::resolver::ResolvedImage;
use crate::surface::{DrawingSurface, SurfaceSize};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// PNG image.
    Png,
    /// JPEG image, flattened onto the configured background.
    Jpeg,
}

impl ExportFormat {
    /// Guess the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// MIME type of the encoded output.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim())
            .ok_or_else(|| SurfaceError::Encode(format!("unsupported export format {s:?}")))
    }
}

/// Configuration for export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Background color as RGBA bytes, used where the surface is transparent
    /// and the format has no alpha channel.
    pub background: [u8; 4],
    /// JPEG quality 1-100 (default: 85).
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            background: [255, 255, 255, 255],
            jpeg_quality: 85,
        }
    }
}

/// Encodes a raster surface's pixels.
#[derive(Debug, Clone, Default)]
pub struct PixmapExporter {
    config: ExportConfig,
}

impl PixmapExporter {
    /// Create a new exporter with the given configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// Export to the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn export(&self, pixmap: &Pixmap, format: ExportFormat) -> RenderResult<Vec<u8>> {
        match format {
            ExportFormat::Png => self.to_png(pixmap),
            ExportFormat::Jpeg => self.to_jpeg(pixmap),
        }
    }

    /// Encode as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    #[allow(clippy::unused_self)]
    pub fn to_png(&self, pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
        let png = pixmap
            .encode_png()
            .map_err(|e| SurfaceError::Encode(format!("PNG encoding failed: {e}")))?;
        tracing::debug!(
            "Encoded {}x{} PNG ({} bytes)",
            pixmap.width(),
            pixmap.height(),
            png.len()
        );
        Ok(png)
    }

    /// Encode as JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_jpeg(&self, pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
        let (width, height) = (pixmap.width(), pixmap.height());
        let rgb = flatten(pixmap, self.config.background);

        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
        encoder
            .write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)
            .map_err(|e| SurfaceError::Encode(format!("JPEG encoding failed: {e}")))?;

        let jpeg = buf.into_inner();
        tracing::debug!("Encoded {}x{} JPEG ({} bytes)", width, height, jpeg.len());
        Ok(jpeg)
    }

    /// Encode in `format` and wrap as a base64 `data:` URI.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_data_uri(&self, pixmap: &Pixmap, format: ExportFormat) -> RenderResult<String> {
        let bytes = self.export(pixmap, format)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{};base64,{encoded}", format.mime()))
    }

    /// Crop `image` to `request` with [`crop_image`] and encode it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cropped size cannot be allocated or encoding fails.
    pub fn export_cropped(
        &self,
        image: &ResolvedImage,
        request: &FitRequest,
        format: ExportFormat,
    ) -> RenderResult<Vec<u8>> {
        self.export(&crop_image(image, request)?, format)
    }

    /// Crop `image` to `request` and wrap the encoding as a `data:` URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the cropped size cannot be allocated or encoding fails.
    pub fn cropped_data_uri(
        &self,
        image: &ResolvedImage,
        request: &FitRequest,
        format: ExportFormat,
    ) -> RenderResult<String> {
        self.to_data_uri(&crop_image(image, request)?, format)
    }
}

/// Crop and scale `image` to the size `request` asks for, with the same cover
/// semantics image items are drawn with.
///
/// Fractional destination sizes round to whole pixels, at least one.
///
/// # Errors
///
/// Returns an error if the resulting size exceeds the raster limits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn crop_image(image: &ResolvedImage, request: &FitRequest) -> RenderResult<Pixmap> {
    let fit = cover_fit(request, image.natural_size());
    let size = SurfaceSize::new(
        fit.dest.width.round().max(1.0) as u32,
        fit.dest.height.round().max(1.0) as u32,
    );
    let dest = Rect::new(0.0, 0.0, f64::from(size.width), f64::from(size.height));

    let mut surface = PixmapSurface::new(size)?;
    surface.draw_region(image, fit.source, dest)?;
    tracing::debug!(
        "Cropped {}x{} image to {}x{}",
        image.width(),
        image.height(),
        size.width,
        size.height
    );
    Ok(surface.into_pixmap())
}

/// Composite premultiplied RGBA over an opaque background, dropping alpha.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn flatten(pixmap: &Pixmap, background: [u8; 4]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixmap.data().len() / 4 * 3);
    for pixel in pixmap.data().chunks_exact(4) {
        let inv = 1.0 - f32::from(pixel[3]) / 255.0;
        for (&c, &bg) in pixel[..3].iter().zip(&background[..3]) {
            let value = f32::from(bg).mul_add(inv, f32::from(c));
            rgb.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}
