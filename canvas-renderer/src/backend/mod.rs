//! Drawing surface implementations.

pub mod pixmap;
pub mod recording;

pub use pixmap::PixmapSurface;
pub use recording::{DrawOp, RecordingSurface};
