//! Curved text layout: glyph placement along a circular arc.

use std::f64::consts::PI;
use std::fmt;

use kurbo::Point;

use crate::item::{FontStyle, FontWeight};

/// Largest accepted curve strength.
pub const MAX_CURVE_STRENGTH: f64 = 50.0;

/// Font description handed to the drawing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Size in surface units.
    pub size: f64,
    /// Family name or generic family (`sans-serif`, `serif`, `monospace`).
    pub family: String,
    /// Weight.
    pub weight: FontWeight,
    /// Style.
    pub style: FontStyle,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            size: 16.0,
            family: "sans-serif".to_string(),
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
        }
    }
}

impl fmt::Display for FontSpec {
    /// CSS shorthand, e.g. `italic bold 24px serif`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}px {}",
            self.style.as_str(),
            self.weight.as_str(),
            self.size,
            self.family
        )
    }
}

/// Radius and angular extent of a text arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcParams {
    /// Distance from the anchor to each glyph.
    pub radius: f64,
    /// Total angle covered by the text, in radians.
    pub total_arc: f64,
}

impl ArcParams {
    /// Derive the arc from the surface reference width and a curve strength.
    ///
    /// The strength is clamped to `[0, 50]`. At 50 the radius is half the
    /// reference width and the text spans a quarter turn.
    #[must_use]
    pub fn new(reference_width: f64, curve_strength: f64) -> Self {
        let strength = if curve_strength.is_finite() {
            curve_strength.clamp(0.0, MAX_CURVE_STRENGTH)
        } else {
            0.0
        };
        Self {
            radius: (reference_width / 2.0) * (strength / MAX_CURVE_STRENGTH),
            total_arc: (strength / 100.0) * PI,
        }
    }
}

/// Where and how one glyph is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPlacement {
    /// The character.
    pub glyph: char,
    /// Glyph anchor in surface space.
    pub position: Point,
    /// Angle of the glyph on the arc, in radians.
    pub angle: f64,
    /// Measured advance including letter spacing.
    pub advance: f64,
}

impl GlyphPlacement {
    /// Rotation to apply so the baseline is tangent to the arc.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        -self.angle
    }
}

/// Lay out `text` along the arc centered on `anchor`.
///
/// Each character is measured on its own with `measure`; `letter_spacing` is
/// added to every advance. With a zero arc every glyph lands on the anchor.
pub fn layout_curved_text(
    text: &str,
    anchor: Point,
    arc: ArcParams,
    letter_spacing: f64,
    mut measure: impl FnMut(&str) -> f64,
) -> Vec<GlyphPlacement> {
    let spacing = if letter_spacing.is_finite() {
        letter_spacing
    } else {
        0.0
    };
    let mut buf = [0u8; 4];
    let advances: Vec<(char, f64)> = text
        .chars()
        .map(|ch| {
            let width = measure(ch.encode_utf8(&mut buf));
            let width = if width.is_finite() { width } else { 0.0 };
            (ch, (width + spacing).max(0.0))
        })
        .collect();

    let total_width: f64 = advances.iter().map(|(_, w)| w).sum();
    let scale = if total_width > 0.0 && arc.total_arc != 0.0 {
        arc.total_arc / total_width
    } else {
        0.0
    };

    let mut current = -arc.total_arc / 2.0;
    advances
        .into_iter()
        .map(|(glyph, advance)| {
            let glyph_angle = advance * scale;
            let angle = current + glyph_angle / 2.0;
            current += glyph_angle;
            GlyphPlacement {
                glyph,
                position: Point::new(
                    anchor.x + angle.sin() * arc.radius,
                    anchor.y + angle.cos() * arc.radius,
                ),
                angle,
                advance,
            }
        })
        .collect()
}
