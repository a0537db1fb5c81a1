//! The drawing surface capability set consumed by the render pipeline.

use std::ops::{Deref, DerefMut};

use canvas_core::kurbo::{Affine, Rect};
use canvas_core::{ClipShape, FontSpec, TextAlign};
use serde::{Deserialize, Serialize};

use crate::error::SurfaceResult;
use crate::resolver::ResolvedImage;

/// Pixel dimensions of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceSize {
    /// Create a size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either side is zero.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A raster target with a 2D drawing context.
///
/// State-changing calls (`translate`, `rotate`, `clip`, `set_*`) affect
/// every later draw until the matching [`restore`](Self::restore).
pub trait DrawingSurface {
    /// Current pixel size.
    fn size(&self) -> SurfaceSize;

    /// Resize the surface, discarding its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be allocated.
    fn resize(&mut self, size: SurfaceSize) -> SurfaceResult<()>;

    /// Clear to transparent, optionally resizing first, and reset drawing state.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::ContextUnavailable`](crate::SurfaceError::ContextUnavailable)
    /// if the surface has no usable context.
    fn clear(&mut self, size: Option<SurfaceSize>) -> SurfaceResult<()>;

    /// Push the drawing state.
    fn save(&mut self);

    /// Pop the drawing state. Unbalanced calls are ignored.
    fn restore(&mut self);

    /// Translate the current transform.
    fn translate(&mut self, dx: f64, dy: f64);

    /// Rotate the current transform by `radians`.
    fn rotate(&mut self, radians: f64);

    /// Replace the current transform.
    fn set_transform(&mut self, transform: Affine);

    /// Current transform.
    fn transform(&self) -> Affine;

    /// Set the global alpha in `[0, 1]`.
    fn set_global_alpha(&mut self, alpha: f64);

    /// Set the CSS filter string applied to later image draws.
    fn set_filter(&mut self, filter: &str);

    /// Intersect the current clip with `shape`, in current transform space.
    fn clip(&mut self, shape: &ClipShape);

    /// Draw the `src` region of `image` scaled into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the draw fails.
    fn draw_region(&mut self, image: &ResolvedImage, src: Rect, dest: Rect) -> SurfaceResult<()>;

    /// Set the font used by text calls.
    fn set_font(&mut self, font: &FontSpec);

    /// Set the CSS fill color for text.
    ///
    /// # Errors
    ///
    /// Returns an error if the color cannot be parsed.
    fn set_fill_color(&mut self, color: &str) -> SurfaceResult<()>;

    /// Set the horizontal text alignment.
    fn set_text_align(&mut self, align: TextAlign);

    /// Advance width of `text` in the current font.
    fn measure_text(&mut self, text: &str) -> f64;

    /// Fill `text` anchored at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the draw fails.
    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> SurfaceResult<()>;
}

/// Scoped surface state.
///
/// Saves on creation and restores on drop, so every exit path of a draw
/// sequence, including `?` and panics unwinding through it, leaves the
/// surface state as it was.
pub struct SavedState<'a, S: DrawingSurface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: DrawingSurface + ?Sized> SavedState<'a, S> {
    /// Save `surface` state until the guard is dropped.
    #[must_use]
    pub fn new(surface: &'a mut S) -> Self {
        surface.save();
        Self { surface }
    }
}

impl<S: DrawingSurface + ?Sized> Deref for SavedState<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: DrawingSurface + ?Sized> DerefMut for SavedState<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: DrawingSurface + ?Sized> Drop for SavedState<'_, S> {
    fn drop(&mut self) {
        self.surface.restore();
    }
}
