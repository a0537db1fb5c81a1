//! Image compositing: opacity, filter, rotation, clip and the draw itself.

use canvas_core::kurbo::{Point, Rect};
use canvas_core::{build_clip, cover_fit, ImageItem};

use crate::error::SurfaceResult;
use crate::resolver::ResolvedImage;
use crate::surface::{DrawingSurface, SavedState};

/// Draw one image item anchored at `anchor`.
///
/// All state changes are scoped to this call; the surface transform, clip,
/// alpha and filter are the same afterwards whether or not the draw
/// succeeded. Returns the destination rectangle in item space.
///
/// # Errors
///
/// Returns the surface error if the draw itself fails.
pub fn composite_image<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    anchor: Point,
    item: &ImageItem,
    image: &ResolvedImage,
) -> SurfaceResult<Rect> {
    let fit = cover_fit(&item.fit_request(), image.natural_size());
    let dest = fit.dest_rect(anchor.x, anchor.y);
    let clip = build_clip(item.border_radius, dest);

    let mut scoped = SavedState::new(surface);
    scoped.set_global_alpha(item.effective_opacity());
    if let Some(filter) = item.filter.as_deref() {
        scoped.set_filter(filter);
    }

    let degrees = item.rotation_degrees;
    if degrees.is_finite() && degrees != 0.0 {
        let center = dest.center();
        scoped.translate(center.x, center.y);
        scoped.rotate(degrees.to_radians());
        scoped.translate(-center.x, -center.y);
    }

    if let Some(clip) = &clip {
        scoped.clip(clip);
    }

    tracing::trace!(
        "Compositing {} src={:?} dest={:?} clip={}",
        item.source.describe(),
        fit.source,
        dest,
        clip.is_some()
    );
    scoped.draw_region(image, fit.source, dest)?;
    Ok(dest)
}
