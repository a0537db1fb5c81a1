//! Renderer error types.

use canvas_core::CanvasError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for image loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for drawing surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Errors that can occur while turning an image source into pixels.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Remote fetch failed.
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Transport or status message.
        message: String,
    },

    /// Local file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed `data:` URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Decoded image has zero width or height.
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// Blocking decode worker failed to complete.
    #[error("Decode worker failed: {0}")]
    Worker(String),
}

/// Errors reported by a drawing surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The surface has no usable 2D context.
    #[error("Drawing context unavailable")]
    ContextUnavailable,

    /// Requested surface size cannot be allocated.
    #[error("Invalid surface dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// CSS color could not be parsed.
    #[error("Invalid color {0:?}")]
    Color(String),

    /// Surface contents could not be encoded.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// A draw call failed.
    #[error("Draw failed: {0}")]
    Draw(String),
}

/// Errors that can occur during a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The surface could not be prepared; the pass was aborted.
    #[error("Drawing context unavailable")]
    ContextUnavailable,

    /// Image loading failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Surface operation failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// Item configuration was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] CanvasError),
}

impl RenderError {
    /// Whether this error aborts the whole pass rather than one item.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContextUnavailable | Self::Surface(SurfaceError::ContextUnavailable)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_errors_are_fatal() {
        assert!(RenderError::ContextUnavailable.is_fatal());
        assert!(RenderError::from(SurfaceError::ContextUnavailable).is_fatal());
        assert!(!RenderError::from(SurfaceError::Draw("x".into())).is_fatal());
        assert!(!RenderError::from(LoadError::Decode("bad".into())).is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = RenderError::from(LoadError::EmptyImage {
            width: 0,
            height: 4,
        });
        assert_eq!(err.to_string(), "Image has no pixels (0x4)");
        let err = LoadError::Fetch {
            url: "https://example.com/a.png".into(),
            message: "404 Not Found".into(),
        };
        assert!(err.to_string().contains("404"));
    }
}
