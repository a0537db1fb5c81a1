//! Clip regions derived from an image's border radius.

use std::fmt;
use std::str::FromStr;

use kurbo::{BezPath, Ellipse, Rect, RoundedRect, RoundedRectRadii, Shape};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::CanvasError;

/// Flattening tolerance used when converting clip shapes to paths.
pub const PATH_TOLERANCE: f64 = 0.1;

/// Corner rounding of an image item.
///
/// Serialized as a number (surface units) or a string such as `"12px"` or `"50%"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderRadius {
    /// Radius in surface units.
    Px(f64),
    /// Percentage of `min(width, height)` of the destination rectangle.
    Percent(f64),
}

impl BorderRadius {
    /// Resolve to surface units against the destination rectangle.
    #[must_use]
    pub fn resolve(self, dest: Rect) -> f64 {
        match self {
            Self::Px(px) => px,
            Self::Percent(pct) => pct / 100.0 * dest.width().min(dest.height()),
        }
    }
}

impl FromStr for BorderRadius {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = if let Some(pct) = trimmed.strip_suffix('%') {
            pct.trim().parse::<f64>().map(Self::Percent)
        } else {
            trimmed
                .strip_suffix("px")
                .unwrap_or(trimmed)
                .trim()
                .parse::<f64>()
                .map(Self::Px)
        };
        parsed.map_err(|_| CanvasError::InvalidBorderRadius(s.to_string()))
    }
}

impl fmt::Display for BorderRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(v) => write!(f, "{v}px"),
            Self::Percent(v) => write!(f, "{v}%"),
        }
    }
}

impl Serialize for BorderRadius {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Px(v) => serializer.serialize_f64(*v),
            Self::Percent(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for BorderRadius {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Self::Px(v)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// A clip region in surface space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipShape {
    /// Rectangle with rounded corners.
    RoundedRect(RoundedRect),
    /// Ellipse inscribed in the destination rectangle.
    Ellipse(Ellipse),
}

impl ClipShape {
    /// Rounded rectangle with individual corner radii.
    #[must_use]
    pub fn rounded_with_corners(rect: Rect, radii: RoundedRectRadii) -> Self {
        Self::RoundedRect(RoundedRect::from_rect(rect, radii))
    }

    /// Outline as a Bézier path.
    #[must_use]
    pub fn to_path(&self) -> BezPath {
        match self {
            Self::RoundedRect(r) => r.to_path(PATH_TOLERANCE),
            Self::Ellipse(e) => e.to_path(PATH_TOLERANCE),
        }
    }

    /// Axis-aligned bounds.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::RoundedRect(r) => r.bounding_box(),
            Self::Ellipse(e) => e.bounding_box(),
        }
    }
}

/// Build the clip region for an image drawn into `dest`.
///
/// Returns `None` when no clipping is needed. A radius of at least half the
/// shorter side yields the inscribed ellipse (a circle for square rectangles).
#[must_use]
pub fn build_clip(radius: Option<BorderRadius>, dest: Rect) -> Option<ClipShape> {
    let resolved = radius?.resolve(dest);
    if !resolved.is_finite() || resolved <= 0.0 {
        return None;
    }

    let half_min = dest.width().min(dest.height()) / 2.0;
    if resolved >= half_min {
        Some(ClipShape::Ellipse(Ellipse::from_rect(dest)))
    } else {
        Some(ClipShape::rounded_with_corners(
            dest,
            RoundedRectRadii::from_single_radius(resolved),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_border_radius() {
        assert_eq!("12px".parse::<BorderRadius>().unwrap(), BorderRadius::Px(12.0));
        assert_eq!("8".parse::<BorderRadius>().unwrap(), BorderRadius::Px(8.0));
        assert_eq!(
            " 50% ".parse::<BorderRadius>().unwrap(),
            BorderRadius::Percent(50.0)
        );
        assert!("round".parse::<BorderRadius>().is_err());
    }

    #[test]
    fn test_percent_resolves_against_shorter_side() {
        let dest = Rect::new(0.0, 0.0, 200.0, 100.0);
        assert!((BorderRadius::Percent(10.0).resolve(dest) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_unset_or_zero_radius_has_no_clip() {
        let dest = Rect::new(0.0, 0.0, 50.0, 50.0);
        assert!(build_clip(None, dest).is_none());
        assert!(build_clip(Some(BorderRadius::Px(0.0)), dest).is_none());
        assert!(build_clip(Some(BorderRadius::Px(-4.0)), dest).is_none());
    }

    #[test]
    fn test_small_radius_builds_rounded_rect() {
        let dest = Rect::new(10.0, 20.0, 110.0, 70.0);
        let Some(ClipShape::RoundedRect(rr)) = build_clip(Some(BorderRadius::Px(8.0)), dest)
        else {
            panic!("expected rounded rect");
        };
        assert_eq!(rr.rect(), dest);
        let radii = rr.radii();
        assert!((radii.top_left - 8.0).abs() < 1e-9);
        assert!((radii.bottom_right - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_radius_is_inscribed_circle() {
        let dest = Rect::new(0.0, 0.0, 100.0, 100.0);
        let Some(ClipShape::Ellipse(e)) = build_clip(Some(BorderRadius::Percent(50.0)), dest)
        else {
            panic!("expected ellipse");
        };
        assert_eq!(e.center(), dest.center());
        let radii = e.radii();
        assert!((radii.x - 50.0).abs() < 1e-9);
        assert!((radii.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_radius_on_rectangle_is_inscribed_ellipse() {
        let dest = Rect::new(0.0, 0.0, 300.0, 100.0);
        let clip = build_clip(Some(BorderRadius::Px(500.0)), dest).expect("clip");
        assert_eq!(clip, ClipShape::Ellipse(Ellipse::from_rect(dest)));
        let bounds = clip.bounds();
        assert!((bounds.width() - 300.0).abs() < 1e-6);
        assert!((bounds.height() - 100.0).abs() < 1e-6);
    }
}
