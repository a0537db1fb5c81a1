//! Recording surface: logs every drawing call instead of rasterizing.
//!
//! Used for dry runs and for asserting the exact call sequence a render pass
//! produces.

use std::fmt;

use canvas_core::kurbo::{Affine, Rect};
use canvas_core::{ClipShape, FontSpec, TextAlign};

use crate::error::{SurfaceError, SurfaceResult};
use crate::resolver::ResolvedImage;
use crate::surface::{DrawingSurface, SurfaceSize};

/// Advance per character, as a fraction of the font size.
const CHAR_ADVANCE: f64 = 0.5;

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Surface cleared at the given size.
    Clear(SurfaceSize),
    /// Surface resized.
    Resize(SurfaceSize),
    /// State pushed.
    Save,
    /// State popped.
    Restore,
    /// Transform translated.
    Translate {
        /// Horizontal offset.
        dx: f64,
        /// Vertical offset.
        dy: f64,
    },
    /// Transform rotated.
    Rotate(f64),
    /// Transform replaced.
    SetTransform(Affine),
    /// Global alpha changed.
    SetGlobalAlpha(f64),
    /// Filter changed.
    SetFilter(String),
    /// Clip intersected.
    Clip(ClipShape),
    /// Image region drawn, with the state in effect at the time.
    DrawRegion {
        /// Source crop in image pixels.
        src: Rect,
        /// Destination in local coordinates.
        dest: Rect,
        /// Transform in effect.
        transform: Affine,
        /// Global alpha in effect.
        alpha: f64,
        /// Filter in effect.
        filter: String,
        /// Number of active clip shapes.
        clips: usize,
    },
    /// Font changed.
    SetFont(String),
    /// Fill color changed.
    SetFillColor(String),
    /// Text alignment changed.
    SetTextAlign(TextAlign),
    /// Text filled.
    FillText {
        /// Text drawn.
        text: String,
        /// Local x.
        x: f64,
        /// Local y.
        y: f64,
        /// Transform in effect.
        transform: Affine,
    },
}

impl DrawOp {
    /// Whether this op puts pixels on the surface.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawRegion { .. } | Self::FillText { .. })
    }
}

fn fmt_rect(r: &Rect) -> String {
    format!("{} {} {} {}", r.x0, r.y0, r.width(), r.height())
}

impl fmt::Display for DrawOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear(size) => write!(f, "clear {}x{}", size.width, size.height),
            Self::Resize(size) => write!(f, "resize {}x{}", size.width, size.height),
            Self::Save => f.write_str("save"),
            Self::Restore => f.write_str("restore"),
            Self::Translate { dx, dy } => write!(f, "translate {dx} {dy}"),
            Self::Rotate(radians) => write!(f, "rotate {radians}"),
            Self::SetTransform(t) => write!(f, "setTransform {:?}", t.as_coeffs()),
            Self::SetGlobalAlpha(alpha) => write!(f, "globalAlpha {alpha}"),
            Self::SetFilter(filter) => write!(f, "filter {filter:?}"),
            Self::Clip(ClipShape::RoundedRect(rr)) => write!(
                f,
                "clip roundRect {} r={}",
                fmt_rect(&rr.rect()),
                rr.radii().top_left
            ),
            Self::Clip(shape @ ClipShape::Ellipse(_)) => {
                write!(f, "clip ellipse {}", fmt_rect(&shape.bounds()))
            }
            Self::DrawRegion { src, dest, .. } => {
                write!(f, "drawImage src={} dest={}", fmt_rect(src), fmt_rect(dest))
            }
            Self::SetFont(font) => write!(f, "font {font:?}"),
            Self::SetFillColor(color) => write!(f, "fillStyle {color:?}"),
            Self::SetTextAlign(align) => write!(f, "textAlign {}", align.as_str()),
            Self::FillText { text, x, y, .. } => write!(f, "fillText {text:?} {x} {y}"),
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedState {
    transform: Affine,
    alpha: f64,
    filter: String,
    clips: usize,
    font_size: f64,
}

impl Default for RecordedState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            filter: "none".to_string(),
            clips: 0,
            font_size: FontSpec::default().size,
        }
    }
}

/// Surface that records calls and tracks state without rasterizing.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    size: SurfaceSize,
    ops: Vec<DrawOp>,
    state: RecordedState,
    stack: Vec<RecordedState>,
    unavailable: bool,
    fail_draws: bool,
}

impl RecordingSurface {
    /// Create a recording surface of the given size.
    #[must_use]
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            ops: Vec::new(),
            state: RecordedState::default(),
            stack: Vec::new(),
            unavailable: false,
            fail_draws: false,
        }
    }

    /// Recorded calls.
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Take the recorded calls, leaving the log empty.
    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Recorded calls that put pixels on the surface.
    #[must_use]
    pub fn draws(&self) -> impl Iterator<Item = &DrawOp> {
        self.ops.iter().filter(|op| op.is_draw())
    }

    /// Current save depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Current global alpha.
    #[must_use]
    pub fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    /// Current filter string.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.state.filter
    }

    /// Number of clip shapes in effect.
    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.state.clips
    }

    /// Make `clear` fail with [`SurfaceError::ContextUnavailable`].
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Make every image and text draw fail.
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }

    fn check_draw(&self, what: &str) -> SurfaceResult<()> {
        if self.fail_draws {
            return Err(SurfaceError::Draw(format!("{what} rejected by recording surface")));
        }
        Ok(())
    }
}

impl DrawingSurface for RecordingSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) -> SurfaceResult<()> {
        if size.is_empty() {
            return Err(SurfaceError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        self.size = size;
        self.state = RecordedState::default();
        self.stack.clear();
        self.ops.push(DrawOp::Resize(size));
        Ok(())
    }

    fn clear(&mut self, size: Option<SurfaceSize>) -> SurfaceResult<()> {
        if self.unavailable {
            return Err(SurfaceError::ContextUnavailable);
        }
        if let Some(size) = size.filter(|s| *s != self.size) {
            self.resize(size)?;
        }
        self.state = RecordedState::default();
        self.stack.clear();
        self.ops.push(DrawOp::Clear(self.size));
        Ok(())
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        self.ops.push(DrawOp::Restore);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.state.transform *= Affine::translate((dx, dy));
        self.ops.push(DrawOp::Translate { dx, dy });
    }

    fn rotate(&mut self, radians: f64) {
        self.state.transform *= Affine::rotate(radians);
        self.ops.push(DrawOp::Rotate(radians));
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
        self.ops.push(DrawOp::SetTransform(transform));
    }

    fn transform(&self) -> Affine {
        self.state.transform
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha;
        self.ops.push(DrawOp::SetGlobalAlpha(alpha));
    }

    fn set_filter(&mut self, filter: &str) {
        self.state.filter = filter.to_string();
        self.ops.push(DrawOp::SetFilter(filter.to_string()));
    }

    fn clip(&mut self, shape: &ClipShape) {
        self.state.clips += 1;
        self.ops.push(DrawOp::Clip(*shape));
    }

    fn draw_region(&mut self, _image: &ResolvedImage, src: Rect, dest: Rect) -> SurfaceResult<()> {
        self.check_draw("drawImage")?;
        self.ops.push(DrawOp::DrawRegion {
            src,
            dest,
            transform: self.state.transform,
            alpha: self.state.alpha,
            filter: self.state.filter.clone(),
            clips: self.state.clips,
        });
        Ok(())
    }

    fn set_font(&mut self, font: &FontSpec) {
        self.state.font_size = font.size;
        self.ops.push(DrawOp::SetFont(font.to_string()));
    }

    fn set_fill_color(&mut self, color: &str) -> SurfaceResult<()> {
        self.ops.push(DrawOp::SetFillColor(color.to_string()));
        Ok(())
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.ops.push(DrawOp::SetTextAlign(align));
    }

    #[allow(clippy::cast_precision_loss)]
    fn measure_text(&mut self, text: &str) -> f64 {
        text.chars().count() as f64 * self.state.font_size * CHAR_ADVANCE
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> SurfaceResult<()> {
        self.check_draw("fillText")?;
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            transform: self.state.transform,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_stack() {
        let mut surface = RecordingSurface::new(SurfaceSize::new(100, 100));
        surface.save();
        surface.translate(10.0, 0.0);
        surface.set_filter("blur(2px)");
        surface.save();
        surface.set_global_alpha(0.25);
        surface.restore();
        assert!((surface.global_alpha() - 1.0).abs() < f64::EPSILON);
        assert_eq!(surface.filter(), "blur(2px)");
        surface.restore();
        assert_eq!(surface.filter(), "none");
        assert_eq!(surface.transform(), Affine::IDENTITY);

        // Unbalanced restore is ignored.
        surface.restore();
        assert_eq!(surface.depth(), 0);
    }

    #[test]
    fn test_clear_resets_state_and_resizes() {
        let mut surface = RecordingSurface::new(SurfaceSize::new(100, 100));
        surface.save();
        surface.rotate(1.0);
        surface
            .clear(Some(SurfaceSize::new(40, 30)))
            .expect("clear");
        assert_eq!(surface.size(), SurfaceSize::new(40, 30));
        assert_eq!(surface.depth(), 0);
        assert_eq!(surface.transform(), Affine::IDENTITY);
        assert_eq!(surface.ops().last(), Some(&DrawOp::Clear(SurfaceSize::new(40, 30))));
    }

    #[test]
    fn test_unavailable_context() {
        let mut surface = RecordingSurface::new(SurfaceSize::new(10, 10));
        surface.set_unavailable(true);
        assert!(matches!(
            surface.clear(None),
            Err(SurfaceError::ContextUnavailable)
        ));
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn test_measure_text_uses_font_size() {
        let mut surface = RecordingSurface::new(SurfaceSize::new(10, 10));
        surface.set_font(&FontSpec {
            size: 20.0,
            ..FontSpec::default()
        });
        assert!((surface.measure_text("abc") - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        assert_eq!(DrawOp::Translate { dx: 1.0, dy: 2.5 }.to_string(), "translate 1 2.5");
        assert_eq!(
            DrawOp::FillText {
                text: "A".into(),
                x: 0.0,
                y: 0.0,
                transform: Affine::IDENTITY
            }
            .to_string(),
            "fillText \"A\" 0 0"
        );
    }
}
