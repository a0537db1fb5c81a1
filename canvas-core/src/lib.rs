//! # Canvas Core
//!
//! Data model and pure geometry for the canvas item renderer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 canvas-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Items           │  Geometry                │
//! │  - Image / Text  │  - Cover fit + crop      │
//! │  - Documents     │  - Clip shapes           │
//! │  - Paint order   │  - Curved text layout    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches a drawing surface; `canvas-renderer` turns the
//! results into surface operations.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clip;
pub mod document;
pub mod error;
pub mod fit;
pub mod item;
pub mod text_layout;

pub use clip::{build_clip, BorderRadius, ClipShape};
pub use document::{paint_order, ItemDocument};
pub use error::{CanvasError, CanvasResult};
pub use fit::{cover_fit, CoverFit, FitRequest};
pub use item::{
    clamp_opacity, CanvasItem, Dimension, FontStyle, FontWeight, ImageItem, ImageSource, ItemId,
    ItemKind, TextAlign, TextItem,
};
pub use text_layout::{layout_curved_text, ArcParams, FontSpec, GlyphPlacement};

/// Re-exported geometry types used across the public API.
pub use kurbo;

/// Canvas core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
