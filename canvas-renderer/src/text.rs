//! Curved text rendering, one glyph at a time.

use canvas_core::kurbo::Point;
use canvas_core::{layout_curved_text, ArcParams, TextItem};

use crate::error::SurfaceResult;
use crate::surface::{DrawingSurface, SavedState};

/// Draw a text item along its arc, anchored at `anchor`.
///
/// The arc radius is derived from the surface width. Every glyph is drawn
/// with its own translate/rotate inside a nested save/restore, and the
/// font, fill and alignment settings are undone when the call returns.
/// Returns the number of glyphs drawn.
///
/// # Errors
///
/// Returns the surface error if a glyph draw fails.
pub fn draw_text<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    anchor: Point,
    item: &TextItem,
) -> SurfaceResult<usize> {
    if item.text.is_empty() {
        return Ok(0);
    }

    let mut scoped = SavedState::new(surface);
    scoped.set_font(&item.font());
    if let Err(e) = scoped.set_fill_color(&item.color) {
        tracing::warn!("{e}; keeping the current fill color");
    }
    scoped.set_text_align(item.text_align);

    let reference_width = f64::from(scoped.size().width);
    let arc = ArcParams::new(reference_width, item.curve_strength);
    let glyphs = layout_curved_text(&item.text, anchor, arc, item.letter_spacing, |g| {
        scoped.measure_text(g)
    });

    let mut buf = [0u8; 4];
    for glyph in &glyphs {
        let mut glyph_scope = SavedState::new(&mut *scoped);
        glyph_scope.translate(glyph.position.x, glyph.position.y);
        glyph_scope.rotate(glyph.rotation());
        glyph_scope.fill_text(glyph.glyph.encode_utf8(&mut buf), 0.0, 0.0)?;
    }

    tracing::trace!(
        "Drew {} glyphs of {:?} (radius {:.1}, arc {:.3})",
        glyphs.len(),
        item.text,
        arc.radius,
        arc.total_arc
    );
    Ok(glyphs.len())
}
