//! Cover-fit geometry: destination size and centered source crop.
//!
//! The image is scaled uniformly so it covers the destination rectangle, and
//! the overflow on the longer axis is cropped symmetrically from the source.

use kurbo::{Rect, Size};

use crate::error::{CanvasError, CanvasResult};
use crate::item::Dimension;

/// Sizing inputs of an image item.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitRequest {
    /// Requested width.
    pub width: Dimension,
    /// Requested height.
    pub height: Dimension,
    /// Target width/height ratio.
    pub aspect_ratio: Option<f64>,
}

impl FitRequest {
    /// Check the request against its valid domain.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidConfig`] for a non-positive or non-finite
    /// aspect ratio, or a negative or non-finite fixed dimension.
    pub fn validate(&self) -> CanvasResult<()> {
        if let Some(ratio) = self.aspect_ratio {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(CanvasError::InvalidConfig(format!(
                    "aspect ratio must be positive, got {ratio}"
                )));
            }
        }
        for (axis, dim) in [("width", self.width), ("height", self.height)] {
            if let Dimension::Fixed(v) = dim {
                if !v.is_finite() || v < 0.0 {
                    return Err(CanvasError::InvalidConfig(format!(
                        "{axis} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Result of the cover-fit calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    /// Destination size in surface units.
    pub dest: Size,
    /// Source crop rectangle in image pixels.
    pub source: Rect,
}

impl CoverFit {
    /// Natural size, no crop.
    #[must_use]
    pub fn identity(natural: Size) -> Self {
        Self {
            dest: natural,
            source: Rect::from_origin_size((0.0, 0.0), natural),
        }
    }

    /// Destination rectangle anchored at `(x, y)`.
    #[must_use]
    pub fn dest_rect(&self, x: f64, y: f64) -> Rect {
        Rect::from_origin_size((x, y), self.dest)
    }
}

/// Compute destination size and source crop with cover semantics.
///
/// Invalid requests and degenerate natural sizes fall back to
/// [`CoverFit::identity`].
#[must_use]
pub fn cover_fit(request: &FitRequest, natural: Size) -> CoverFit {
    if !(natural.width.is_finite()
        && natural.height.is_finite()
        && natural.width > 0.0
        && natural.height > 0.0)
    {
        tracing::warn!(
            "Image has degenerate natural size {}x{}, drawing without crop",
            natural.width,
            natural.height
        );
        return CoverFit::identity(natural);
    }
    if let Err(e) = request.validate() {
        tracing::warn!("{e}; drawing at natural size without crop");
        return CoverFit::identity(natural);
    }

    let (nw, nh) = (natural.width, natural.height);
    match (request.width.fixed(), request.height.fixed(), request.aspect_ratio) {
        (None, None, Some(ratio)) => {
            let source = crop_to_ratio(natural, ratio);
            CoverFit {
                dest: source.size(),
                source,
            }
        }
        (Some(w), None, Some(ratio)) => {
            let dw = positive_or(w, nw);
            let dh = positive_or(dw / ratio, nh);
            CoverFit {
                dest: Size::new(dw, dh),
                source: crop_to_ratio(natural, ratio),
            }
        }
        (None, Some(h), Some(ratio)) => {
            let dh = positive_or(h, nh);
            let dw = positive_or(dh * ratio, nw);
            CoverFit {
                dest: Size::new(dw, dh),
                source: crop_to_ratio(natural, ratio),
            }
        }
        (Some(w), Some(h), _) => {
            let dw = positive_or(w, nw);
            let dh = positive_or(h, nh);
            CoverFit {
                dest: Size::new(dw, dh),
                source: crop_to_ratio(natural, dw / dh),
            }
        }
        // One side fixed without a ratio: keep the natural proportions.
        (Some(w), None, None) => {
            let dw = positive_or(w, nw);
            CoverFit {
                dest: Size::new(dw, nh * dw / nw),
                source: Rect::from_origin_size((0.0, 0.0), natural),
            }
        }
        (None, Some(h), None) => {
            let dh = positive_or(h, nh);
            CoverFit {
                dest: Size::new(nw * dh / nh, dh),
                source: Rect::from_origin_size((0.0, 0.0), natural),
            }
        }
        (None, None, None) => CoverFit::identity(natural),
    }
}

/// Largest centered sub-rectangle of `natural` with the given ratio.
fn crop_to_ratio(natural: Size, ratio: f64) -> Rect {
    let (nw, nh) = (natural.width, natural.height);
    if nw / nh > ratio {
        let sw = positive_or(nh * ratio, nw).min(nw);
        Rect::from_origin_size(((nw - sw) / 2.0, 0.0), (sw, nh))
    } else {
        let sh = positive_or(nw / ratio, nh).min(nh);
        Rect::from_origin_size((0.0, (nh - sh) / 2.0), (nw, sh))
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: Dimension, height: Dimension, aspect_ratio: Option<f64>) -> FitRequest {
        FitRequest {
            width,
            height,
            aspect_ratio,
        }
    }

    fn assert_rect(actual: Rect, x: f64, y: f64, w: f64, h: f64) {
        let eps = 1e-9;
        assert!(
            (actual.x0 - x).abs() < eps
                && (actual.y0 - y).abs() < eps
                && (actual.width() - w).abs() < eps
                && (actual.height() - h).abs() < eps,
            "expected ({x}, {y}, {w}, {h}), got {actual:?}"
        );
    }

    #[test]
    fn test_fixed_size_is_exact_for_any_source() {
        let req = request(Dimension::Fixed(120.0), Dimension::Fixed(80.0), Some(3.0));
        for natural in [
            Size::new(4000.0, 100.0),
            Size::new(10.0, 900.0),
            Size::new(120.0, 80.0),
            Size::new(1.0, 1.0),
        ] {
            let fit = cover_fit(&req, natural);
            assert_eq!(fit.dest, Size::new(120.0, 80.0));
        }
    }

    #[test]
    fn test_fixed_size_crops_wide_source_horizontally() {
        let req = request(Dimension::Fixed(100.0), Dimension::Fixed(100.0), None);
        let fit = cover_fit(&req, Size::new(400.0, 200.0));
        assert_rect(fit.source, 100.0, 0.0, 200.0, 200.0);
    }

    #[test]
    fn test_fixed_size_crops_tall_source_vertically() {
        let req = request(Dimension::Fixed(200.0), Dimension::Fixed(100.0), None);
        let fit = cover_fit(&req, Size::new(300.0, 300.0));
        assert_rect(fit.source, 0.0, 75.0, 300.0, 150.0);
    }

    #[test]
    fn test_auto_with_aspect_ratio_crops_natural() {
        let req = request(Dimension::Auto, Dimension::Auto, Some(1.0));
        let fit = cover_fit(&req, Size::new(300.0, 200.0));
        assert_rect(fit.source, 50.0, 0.0, 200.0, 200.0);
        assert_eq!(fit.dest, Size::new(200.0, 200.0));

        let req = request(Dimension::Auto, Dimension::Auto, Some(2.0));
        let fit = cover_fit(&req, Size::new(300.0, 300.0));
        assert_rect(fit.source, 0.0, 75.0, 300.0, 150.0);
        assert_eq!(fit.dest, Size::new(300.0, 150.0));
    }

    #[test]
    fn test_width_with_aspect_ratio() {
        let req = request(Dimension::Fixed(160.0), Dimension::Auto, Some(16.0 / 9.0));
        let fit = cover_fit(&req, Size::new(1000.0, 1000.0));
        assert!((fit.dest.height - 90.0).abs() < 1e-9);
        assert!((fit.source.width() - 1000.0).abs() < 1e-9);
        assert!((fit.source.height() - 562.5).abs() < 1e-9);
    }

    #[test]
    fn test_height_with_aspect_ratio() {
        let req = request(Dimension::Auto, Dimension::Fixed(50.0), Some(2.0));
        let fit = cover_fit(&req, Size::new(100.0, 100.0));
        assert_eq!(fit.dest, Size::new(100.0, 50.0));
        assert_rect(fit.source, 0.0, 25.0, 100.0, 50.0);
    }

    #[test]
    fn test_no_sizing_is_identity() {
        let fit = cover_fit(&FitRequest::default(), Size::new(640.0, 480.0));
        assert_eq!(fit, CoverFit::identity(Size::new(640.0, 480.0)));
    }

    #[test]
    fn test_single_side_keeps_proportions() {
        let req = request(Dimension::Fixed(320.0), Dimension::Auto, None);
        let fit = cover_fit(&req, Size::new(640.0, 480.0));
        assert_eq!(fit.dest, Size::new(320.0, 240.0));
        assert_rect(fit.source, 0.0, 0.0, 640.0, 480.0);
    }

    #[test]
    fn test_zero_aspect_ratio_is_identity() {
        let req = request(Dimension::Fixed(50.0), Dimension::Fixed(50.0), Some(0.0));
        assert!(req.validate().is_err());
        let fit = cover_fit(&req, Size::new(300.0, 200.0));
        assert_eq!(fit, CoverFit::identity(Size::new(300.0, 200.0)));
    }

    #[test]
    fn test_negative_dimension_is_identity() {
        let req = request(Dimension::Fixed(-10.0), Dimension::Auto, None);
        assert!(req.validate().is_err());
        let fit = cover_fit(&req, Size::new(30.0, 20.0));
        assert_eq!(fit, CoverFit::identity(Size::new(30.0, 20.0)));
    }

    #[test]
    fn test_zero_dimension_uses_natural() {
        let req = request(Dimension::Fixed(0.0), Dimension::Fixed(100.0), None);
        let fit = cover_fit(&req, Size::new(200.0, 50.0));
        assert_eq!(fit.dest, Size::new(200.0, 100.0));
        assert!(fit.source.width() > 0.0 && fit.source.height() > 0.0);
    }

    #[test]
    fn test_zero_natural_size_does_not_divide() {
        let req = request(Dimension::Fixed(10.0), Dimension::Fixed(10.0), Some(1.0));
        let fit = cover_fit(&req, Size::new(0.0, 0.0));
        assert_eq!(fit.dest, Size::ZERO);
    }
}
