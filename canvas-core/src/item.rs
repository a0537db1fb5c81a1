//! Canvas items - the declarative input of a render pass.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::clip::BorderRadius;
use crate::fit::FitRequest;
use crate::text_layout::FontSpec;

/// Identity of a canvas item, numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    Name(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

/// Requested size along one axis of an image.
///
/// Serialized as a plain number or the string `"auto"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
    /// Explicit size in surface units.
    Fixed(f64),
    /// Derived from the natural image size and the aspect ratio.
    #[default]
    Auto,
}

impl Dimension {
    /// The fixed value, if any.
    #[must_use]
    pub fn fixed(self) -> Option<f64> {
        match self {
            Self::Fixed(v) => Some(v),
            Self::Auto => None,
        }
    }

    /// Whether this dimension is `auto`.
    #[must_use]
    pub fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fixed(v) => serializer.serialize_f64(*v),
            Self::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Self::Fixed(v)),
            Raw::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("auto") {
                    return Ok(Self::Auto);
                }
                s.trim_end_matches("px")
                    .trim()
                    .parse::<f64>()
                    .map(Self::Fixed)
                    .map_err(|_| de::Error::custom(format!("invalid dimension: {s:?}")))
            }
        }
    }
}

/// Where an image item's pixels come from.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    /// A data URI, `http(s)://` URL, `file://` URL or filesystem path.
    Reference(String),
    /// Encoded image bytes held in memory.
    Blob(Vec<u8>),
}

impl ImageSource {
    /// Short human-readable description for logs and reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Reference(r) if r.starts_with("data:") => {
                let head: String = r.chars().take(32).collect();
                format!("{head}... ({} bytes)", r.len())
            }
            Self::Reference(r) => r.clone(),
            Self::Blob(bytes) => format!("blob ({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(_) => f.debug_tuple("Reference").field(&self.describe()).finish(),
            Self::Blob(bytes) => f.debug_tuple("Blob").field(&bytes.len()).finish(),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Blob(bytes)
    }
}

impl From<&str> for ImageSource {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

/// Horizontal text alignment around the glyph anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Anchor at the left edge of the glyph.
    Left,
    /// Anchor at the glyph center.
    #[default]
    Center,
    /// Anchor at the right edge of the glyph.
    Right,
}

impl TextAlign {
    /// CSS keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Font weight keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular weight (400).
    #[default]
    Normal,
    /// Bold weight (700).
    Bold,
    /// Heavier than bold (900).
    Bolder,
    /// Lighter than normal (300).
    Lighter,
}

impl FontWeight {
    /// CSS keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Bold => "bold",
            Self::Bolder => "bolder",
            Self::Lighter => "lighter",
        }
    }

    /// Numeric weight. `bolder`/`lighter` are resolved against a normal parent.
    #[must_use]
    pub fn numeric(self) -> u16 {
        match self {
            Self::Normal => 400,
            Self::Bold => 700,
            Self::Bolder => 900,
            Self::Lighter => 300,
        }
    }
}

/// Font style keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic.
    Italic,
}

impl FontStyle {
    /// CSS keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
        }
    }
}

/// Clamp an opacity value to `[0, 1]`. NaN means fully opaque.
#[must_use]
pub fn clamp_opacity(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Image item configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    /// Image reference or bytes.
    #[serde(alias = "image")]
    pub source: ImageSource,
    /// Requested width.
    #[serde(default)]
    pub width: Dimension,
    /// Requested height.
    #[serde(default)]
    pub height: Dimension,
    /// Corner rounding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<BorderRadius>,
    /// Opacity multiplier; clamped when compositing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Rotation around the item center, in degrees.
    #[serde(default, alias = "rotation")]
    pub rotation_degrees: f64,
    /// Filter string handed to the surface verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Target width/height ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
}

impl ImageItem {
    /// Create an image item with natural sizing and no effects.
    #[must_use]
    pub fn new(source: impl Into<ImageSource>) -> Self {
        Self {
            source: source.into(),
            width: Dimension::Auto,
            height: Dimension::Auto,
            border_radius: None,
            opacity: None,
            rotation_degrees: 0.0,
            filter: None,
            aspect_ratio: None,
        }
    }

    /// Set the requested size.
    #[must_use]
    pub fn with_size(mut self, width: Dimension, height: Dimension) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the aspect ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    /// Set the border radius.
    #[must_use]
    pub fn with_border_radius(mut self, radius: BorderRadius) -> Self {
        self.border_radius = Some(radius);
        self
    }

    /// Set the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Set the rotation in degrees.
    #[must_use]
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    /// Set the filter string.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Opacity clamped to `[0, 1]`; unset means opaque.
    #[must_use]
    pub fn effective_opacity(&self) -> f64 {
        self.opacity.map_or(1.0, clamp_opacity)
    }

    /// Sizing inputs for the cover-fit calculator.
    #[must_use]
    pub fn fit_request(&self) -> FitRequest {
        FitRequest {
            width: self.width,
            height: self.height,
            aspect_ratio: self.aspect_ratio,
        }
    }
}

fn default_font_size() -> f64 {
    16.0
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_color() -> String {
    "black".to_string()
}

/// Text item configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    /// Characters to draw. Empty text draws nothing.
    #[serde(default)]
    pub text: String,
    /// Font size in surface units.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Font family name or generic family.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// CSS fill color.
    #[serde(default = "default_color")]
    pub color: String,
    /// Per-glyph alignment.
    #[serde(default)]
    pub text_align: TextAlign,
    /// Font weight.
    #[serde(default)]
    pub font_weight: FontWeight,
    /// Font style.
    #[serde(default)]
    pub font_style: FontStyle,
    /// Arc curvature in `[0, 50]`; 0 collapses all glyphs onto the anchor.
    #[serde(default)]
    pub curve_strength: f64,
    /// Extra advance added after every glyph.
    #[serde(default)]
    pub letter_spacing: f64,
    /// Advisory wrap width; not used by the arc layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl TextItem {
    /// Create a text item with default font settings.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            color: default_color(),
            text_align: TextAlign::default(),
            font_weight: FontWeight::default(),
            font_style: FontStyle::default(),
            curve_strength: 0.0,
            letter_spacing: 0.0,
            width: None,
        }
    }

    /// Set the curve strength.
    #[must_use]
    pub fn with_curve_strength(mut self, strength: f64) -> Self {
        self.curve_strength = strength;
        self
    }

    /// Set the font size.
    #[must_use]
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Set the fill color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Curve strength clamped to `[0, 50]`.
    #[must_use]
    pub fn clamped_curve_strength(&self) -> f64 {
        if self.curve_strength.is_finite() {
            self.curve_strength.clamp(0.0, 50.0)
        } else {
            0.0
        }
    }

    /// Font description for the surface.
    #[must_use]
    pub fn font(&self) -> FontSpec {
        FontSpec {
            size: self.font_size,
            family: self.font_family.clone(),
            weight: self.font_weight,
            style: self.font_style,
        }
    }
}

/// The content-specific half of a canvas item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    /// A raster image.
    Image(ImageItem),
    /// A line of (optionally curved) text.
    Text(TextItem),
}

impl ItemKind {
    /// Lowercase tag name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Text(_) => "text",
        }
    }
}

/// A canvas item: shared placement plus image or text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasItem {
    /// Optional identity, reported back in render diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Paint order; higher values are painted later (on top).
    #[serde(default, alias = "zIndex")]
    pub stack_order: i32,
    /// Surface-space left anchor.
    #[serde(default)]
    pub x: f64,
    /// Surface-space top anchor.
    #[serde(default)]
    pub y: f64,
    /// Item content.
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl CanvasItem {
    /// Create an item with the given content at the origin.
    #[must_use]
    pub fn new(kind: ItemKind) -> Self {
        Self {
            id: None,
            stack_order: 0,
            x: 0.0,
            y: 0.0,
            kind,
        }
    }

    /// Create an image item.
    #[must_use]
    pub fn image(image: ImageItem) -> Self {
        Self::new(ItemKind::Image(image))
    }

    /// Create a text item.
    #[must_use]
    pub fn text(text: TextItem) -> Self {
        Self::new(ItemKind::Text(text))
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the stacking order.
    #[must_use]
    pub fn with_stack_order(mut self, order: i32) -> Self {
        self.stack_order = order;
        self
    }

    /// Set the anchor position.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}
