//! Image source resolution.
//!
//! Turns an [`ImageSource`] into decoded RGBA pixels. Sources can be raw
//! bytes, `data:` URIs, `http(s)://` URLs, `file://` URLs or filesystem paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use canvas_core::kurbo::Size;
use canvas_core::ImageSource;
use image::RgbaImage;

use crate::error::{LoadError, LoadResult};

/// Detected encoding of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame).
    Gif,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // GIF87a / GIF89a
        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Unknown => "unknown",
        }
    }
}

/// Decoded pixels of one image, valid for a single render pass.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// Straight-alpha RGBA pixels.
    pub pixels: RgbaImage,
    /// Format the pixels were decoded from.
    pub format: ImageFormat,
}

impl ResolvedImage {
    /// Wrap already-decoded pixels.
    #[must_use]
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            format: ImageFormat::Unknown,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Natural size used by the fit calculator.
    #[must_use]
    pub fn natural_size(&self) -> Size {
        Size::new(f64::from(self.width()), f64::from(self.height()))
    }
}

/// Turns image sources into pixels.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Resolve `source` to decoded pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or decoded.
    async fn resolve(&self, source: &ImageSource) -> LoadResult<ResolvedImage>;
}

/// Configuration for [`DefaultImageResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory relative paths are resolved against.
    pub base_dir: Option<PathBuf>,
    /// Timeout for remote fetches.
    pub http_timeout: Duration,
    /// User agent sent with remote fetches.
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            http_timeout: Duration::from_secs(30),
            user_agent: format!("canvas-renderer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Resolver for bytes, data URIs, URLs and local files.
///
/// Decoding runs on the blocking thread pool; the encoded bytes are moved
/// into the worker and dropped there whether or not decoding succeeds.
#[derive(Debug, Clone)]
pub struct DefaultImageResolver {
    config: ResolverConfig,
    client: reqwest::Client,
}

impl DefaultImageResolver {
    /// Create a resolver with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: ResolverConfig) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LoadError::Fetch {
                url: String::new(),
                message: format!("HTTP client unavailable: {e}"),
            })?;
        Ok(Self { config, client })
    }

    /// Create a resolver with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_defaults() -> LoadResult<Self> {
        Self::new(ResolverConfig::default())
    }

    /// Get the resolver configuration.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    async fn resolve_reference(&self, reference: &str) -> LoadResult<ResolvedImage> {
        if reference.starts_with("data:") {
            let bytes = parse_data_uri(reference)?;
            return decode_blocking(bytes).await;
        }

        match url::Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let bytes = self.fetch(&url).await?;
                decode_blocking(bytes).await
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| LoadError::Io {
                    path: reference.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a local file URL",
                    ),
                })?;
                self.read_file(&path).await
            }
            // Bare paths, including Windows drive letters that parse as a scheme.
            _ => self.read_file(&self.local_path(reference)).await,
        }
    }

    async fn fetch(&self, url: &url::Url) -> LoadResult<Vec<u8>> {
        tracing::debug!("Fetching image {}", url);
        let fetch_err = |e: reqwest::Error| LoadError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_err)?;
        let bytes = response.bytes().await.map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }

    async fn read_file(&self, path: &Path) -> LoadResult<ResolvedImage> {
        tracing::debug!("Reading image {}", path.display());
        let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        decode_blocking(bytes).await
    }

    fn local_path(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match &self.config.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ImageResolver for DefaultImageResolver {
    async fn resolve(&self, source: &ImageSource) -> LoadResult<ResolvedImage> {
        let resolved = match source {
            ImageSource::Blob(bytes) => decode_blocking(bytes.clone()).await,
            ImageSource::Reference(reference) => self.resolve_reference(reference).await,
        }?;
        tracing::trace!(
            "Resolved {} to {}x{} {}",
            source.describe(),
            resolved.width(),
            resolved.height(),
            resolved.format.as_str()
        );
        Ok(resolved)
    }
}

/// Decode encoded image bytes on the blocking thread pool.
///
/// # Errors
///
/// Returns an error if decoding fails or the worker is cancelled.
pub async fn decode_blocking(bytes: Vec<u8>) -> LoadResult<ResolvedImage> {
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|e| LoadError::Worker(e.to_string()))?
}

/// Decode encoded image bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image or have no pixels.
pub fn decode_bytes(data: &[u8]) -> LoadResult<ResolvedImage> {
    let format = ImageFormat::from_magic_bytes(data);

    let img = image::load_from_memory(data).map_err(|e| LoadError::Decode(e.to_string()))?;
    let pixels = img.to_rgba8();
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::EmptyImage { width, height });
    }

    Ok(ResolvedImage { pixels, format })
}

/// Extract the payload of a data URI.
///
/// Supports base64 (`data:image/png;base64,iVBOR...`) and percent-encoded
/// payloads.
///
/// # Errors
///
/// Returns an error if the URI is malformed.
pub fn parse_data_uri(uri: &str) -> LoadResult<Vec<u8>> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::InvalidDataUri("missing data: prefix".to_string()))?;

    let (metadata, encoded_data) = uri_data
        .split_once(',')
        .ok_or_else(|| LoadError::InvalidDataUri("missing comma".to_string()))?;

    if metadata.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| LoadError::InvalidDataUri(format!("bad base64: {e}")))
    } else {
        percent_decode(encoded_data)
    }
}

fn percent_decode(input: &str) -> LoadResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| LoadError::InvalidDataUri("invalid percent encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red pixel
    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([0, 128, 255, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    fn resolver(base_dir: Option<PathBuf>) -> DefaultImageResolver {
        DefaultImageResolver::new(ResolverConfig {
            base_dir,
            ..ResolverConfig::default()
        })
        .expect("resolver")
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_magic_bytes(b"ab"), ImageFormat::Unknown);
    }

    #[test]
    fn test_data_uri_parsing() {
        let bytes = parse_data_uri(&format!("data:image/png;base64,{PNG_BASE64}")).expect("uri");
        let image = decode_bytes(&bytes).expect("decode");
        assert_eq!((image.width(), image.height()), (1, 1));
        assert_eq!(image.format, ImageFormat::Png);
    }

    #[test]
    fn test_percent_encoded_data_uri() {
        let bytes = parse_data_uri("data:text/plain,a%20b%2Cc").expect("uri");
        assert_eq!(bytes, b"a b,c");
        let bytes = parse_data_uri("data:,caf%C3%A9").expect("uri");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), "café");
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(matches!(
            parse_data_uri("not a data uri"),
            Err(LoadError::InvalidDataUri(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png"),
            Err(LoadError::InvalidDataUri(_))
        ));
        assert!(matches!(
            parse_data_uri("data:,%zz"),
            Err(LoadError::InvalidDataUri(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png;base64,@@@"),
            Err(LoadError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_bytes(b"definitely not an image"),
            Err(LoadError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_blob() {
        let source = ImageSource::Blob(png_bytes(3, 2));
        let image = resolver(None).resolve(&source).await.expect("resolve");
        assert_eq!(image.natural_size(), Size::new(3.0, 2.0));
        assert_eq!(image.pixels.get_pixel(0, 0).0, [0, 128, 255, 255]);
    }

    #[tokio::test]
    async fn test_resolve_relative_path_against_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("tile.png"), png_bytes(4, 4)).expect("write");

        let resolver = resolver(Some(dir.path().to_path_buf()));
        let image = resolver
            .resolve(&ImageSource::from("tile.png"))
            .await
            .expect("resolve");
        assert_eq!(image.width(), 4);

        let url = url::Url::from_file_path(dir.path().join("tile.png")).expect("file url");
        let image = resolver
            .resolve(&ImageSource::from(url.as_str()))
            .await
            .expect("resolve file url");
        assert_eq!(image.height(), 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolver(Some(dir.path().to_path_buf()))
            .resolve(&ImageSource::from("missing.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
