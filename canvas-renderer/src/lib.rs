//! # Canvas Renderer
//!
//! Draws canvas item lists onto a 2D drawing surface.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Renderer::render(surface, items)                     │
//! │   clear → paint order → per item:                    │
//! ├───────────────────────────┬──────────────────────────┤
//! │ image                     │ text                     │
//! │  ImageResolver::resolve   │  layout_curved_text      │
//! │  cover_fit → build_clip   │  save/translate/rotate   │
//! │  composite_image          │  fill_text per glyph     │
//! ├───────────────────────────┴──────────────────────────┤
//! │ DrawingSurface: PixmapSurface | RecordingSurface     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every state change an item makes is scoped by [`SavedState`], so items
//! never see each other's transform, clip, alpha or filter.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod composite;
pub mod error;
pub mod export;
pub mod filter;
pub mod renderer;
pub mod resolver;
pub mod surface;
pub mod text;

pub use backend::{DrawOp, PixmapSurface, RecordingSurface};
pub use composite::composite_image;
pub use error::{
    LoadError, LoadResult, RenderError, RenderResult, SurfaceError, SurfaceResult,
};
pub use export::{crop_image, ExportConfig, ExportFormat, PixmapExporter};
pub use filter::{apply_filters, parse_filter, FilterOp};
pub use renderer::{
    Canvas, ItemReport, ItemStatus, PassGeneration, PassToken, RenderConfig, RenderReport,
    Renderer,
};
pub use resolver::{
    DefaultImageResolver, ImageFormat, ImageResolver, ResolvedImage, ResolverConfig,
};
pub use surface::{DrawingSurface, SavedState, SurfaceSize};
pub use text::draw_text;

/// Raster backend, for naming [`PixmapSurface`] pixel buffers.
pub use tiny_skia;
