//! Raster surface built on tiny-skia, with cosmic-text glyph outlines.

use canvas_core::kurbo::{Affine, BezPath, PathEl, Rect};
use canvas_core::{ClipShape, FontSpec, FontStyle, TextAlign};
use cosmic_text::{Attrs, Buffer, Command, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::imageops;
use tiny_skia::{
    BlendMode, Color, ColorU8, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap,
    PixmapPaint, Transform,
};

use crate::error::{SurfaceError, SurfaceResult};
use crate::filter::{apply_filters, parse_filter};
use crate::resolver::ResolvedImage;
use crate::surface::{DrawingSurface, SurfaceSize};

/// Largest accepted side length.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Clone)]
struct PixmapState {
    transform: Affine,
    alpha: f64,
    filter: String,
    clip: Option<Mask>,
    font: FontSpec,
    fill: Color,
    align: TextAlign,
}

impl Default for PixmapState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            filter: "none".to_string(),
            clip: None,
            font: FontSpec::default(),
            fill: Color::BLACK,
            align: TextAlign::Left,
        }
    }
}

/// CPU raster surface.
///
/// The font system is loaded on first text use, so image-only passes never
/// scan system fonts.
pub struct PixmapSurface {
    pixmap: Pixmap,
    state: PixmapState,
    stack: Vec<PixmapState>,
    fonts: Option<FontSystem>,
    swash_cache: SwashCache,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("depth", &self.stack.len())
            .field("fonts_loaded", &self.fonts.is_some())
            .finish_non_exhaustive()
    }
}

impl PixmapSurface {
    /// Create a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is zero or exceeds [`MAX_DIMENSION`].
    pub fn new(size: SurfaceSize) -> SurfaceResult<Self> {
        Ok(Self {
            pixmap: allocate(size)?,
            state: PixmapState::default(),
            stack: Vec::new(),
            fonts: None,
            swash_cache: SwashCache::new(),
        })
    }

    /// Use a preconfigured font system instead of the system fonts.
    #[must_use]
    pub fn with_font_system(mut self, fonts: FontSystem) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Rendered pixels (premultiplied RGBA).
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Consume the surface, returning its pixels.
    #[must_use]
    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    fn skia_transform(&self) -> Transform {
        to_skia(self.state.transform)
    }
}

fn allocate(size: SurfaceSize) -> SurfaceResult<Pixmap> {
    let invalid = SurfaceError::InvalidDimensions {
        width: size.width,
        height: size.height,
    };
    if size.width > MAX_DIMENSION || size.height > MAX_DIMENSION {
        return Err(invalid);
    }
    Pixmap::new(size.width, size.height).ok_or(invalid)
}

#[allow(clippy::cast_possible_truncation)]
fn to_skia(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

#[allow(clippy::cast_possible_truncation)]
fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn family(name: &str) -> Family<'_> {
    let first = name
        .split(',')
        .next()
        .unwrap_or(name)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    match first.to_ascii_lowercase().as_str() {
        "sans-serif" | "" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(first),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn shape(fonts: &mut FontSystem, font: &FontSpec, text: &str) -> Buffer {
    let size = font.size as f32;
    let mut buffer = Buffer::new(fonts, Metrics::new(size, size * 1.2));
    let style = match font.style {
        FontStyle::Normal => cosmic_text::Style::Normal,
        FontStyle::Italic => cosmic_text::Style::Italic,
    };
    let attrs = Attrs::new()
        .family(family(&font.family))
        .weight(Weight(font.weight.numeric()))
        .style(style);
    buffer.set_text(fonts, text, &attrs, Shaping::Advanced, None);
    buffer.shape_until_scroll(fonts, false);
    buffer
}

fn line_width(buffer: &Buffer) -> f32 {
    buffer
        .layout_runs()
        .map(|run| run.line_w)
        .fold(0.0, f32::max)
}

/// Copy the integer-aligned `src` region and apply `filter`, premultiplied.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn prepare_region(image: &ResolvedImage, src: Rect, filter: &str) -> Option<Pixmap> {
    let (iw, ih) = (f64::from(image.width()), f64::from(image.height()));
    let x0 = src.x0.max(0.0).floor();
    let y0 = src.y0.max(0.0).floor();
    let x1 = src.x1.min(iw).ceil();
    let y1 = src.y1.min(ih).ceil();
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (x, y, w, h) = (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);

    let mut region = imageops::crop_imm(&image.pixels, x, y, w, h).to_image();
    let ops = parse_filter(filter);
    if !ops.is_empty() {
        apply_filters(&mut region, &ops);
    }

    let mut pixmap = Pixmap::new(w, h)?;
    for (dst, px) in pixmap.pixels_mut().iter_mut().zip(region.pixels()) {
        *dst = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
    }
    Some(pixmap)
}

impl DrawingSurface for PixmapSurface {
    fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.pixmap.width(), self.pixmap.height())
    }

    fn resize(&mut self, size: SurfaceSize) -> SurfaceResult<()> {
        self.pixmap = allocate(size)?;
        self.state = PixmapState::default();
        self.stack.clear();
        tracing::trace!("resize {}x{}", size.width, size.height);
        Ok(())
    }

    fn clear(&mut self, size: Option<SurfaceSize>) -> SurfaceResult<()> {
        match size {
            Some(size) if size != self.size() => self.resize(size)?,
            _ => {
                self.pixmap.fill(Color::TRANSPARENT);
                self.state = PixmapState::default();
                self.stack.clear();
            }
        }
        Ok(())
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.state.transform *= Affine::translate((dx, dy));
    }

    fn rotate(&mut self, radians: f64) {
        self.state.transform *= Affine::rotate(radians);
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
    }

    fn transform(&self) -> Affine {
        self.state.transform
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() {
            self.state.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn set_filter(&mut self, filter: &str) {
        self.state.filter = filter.to_string();
    }

    fn clip(&mut self, shape: &ClipShape) {
        let Some(path) = to_skia_path(&shape.to_path()) else {
            return;
        };
        let transform = self.skia_transform();
        match self.state.clip.as_mut() {
            Some(mask) => mask.intersect_path(&path, FillRule::Winding, true, transform),
            None => {
                let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
                    return;
                };
                mask.fill_path(&path, FillRule::Winding, true, transform);
                self.state.clip = Some(mask);
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_region(&mut self, image: &ResolvedImage, src: Rect, dest: Rect) -> SurfaceResult<()> {
        let drawable = dest.width() > 0.0 && dest.height() > 0.0;
        if !drawable {
            tracing::trace!("drawImage skipped, empty destination {:?}", dest);
            return Ok(());
        }
        let Some(region) = prepare_region(image, src, &self.state.filter) else {
            tracing::trace!("drawImage skipped, empty source {:?}", src);
            return Ok(());
        };

        let scale_x = dest.width() / f64::from(region.width());
        let scale_y = dest.height() / f64::from(region.height());
        let transform = self
            .skia_transform()
            .pre_translate(dest.x0 as f32, dest.y0 as f32)
            .pre_scale(scale_x as f32, scale_y as f32);
        let paint = PixmapPaint {
            opacity: self.state.alpha as f32,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };

        tracing::trace!("drawImage src={:?} dest={:?}", src, dest);
        self.pixmap.draw_pixmap(
            0,
            0,
            region.as_ref(),
            &paint,
            transform,
            self.state.clip.as_ref(),
        );
        Ok(())
    }

    fn set_font(&mut self, font: &FontSpec) {
        self.state.font = font.clone();
    }

    fn set_fill_color(&mut self, color: &str) -> SurfaceResult<()> {
        let parsed =
            csscolorparser::parse(color).map_err(|e| SurfaceError::Color(format!("{color}: {e}")))?;
        let [r, g, b, a] = parsed.to_array();
        self.state.fill =
            Color::from_rgba(r, g, b, a).ok_or_else(|| SurfaceError::Color(color.to_string()))?;
        Ok(())
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.state.align = align;
    }

    fn measure_text(&mut self, text: &str) -> f64 {
        let fonts = self.fonts.get_or_insert_with(FontSystem::new);
        f64::from(line_width(&shape(fonts, &self.state.font, text)))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> SurfaceResult<()> {
        let fonts = self.fonts.get_or_insert_with(FontSystem::new);
        let buffer = shape(fonts, &self.state.font, text);

        let width = line_width(&buffer);
        let offset = match self.state.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => -width / 2.0,
            TextAlign::Right => -width,
        };
        let base_x = x as f32 + offset;
        let base_y = y as f32;

        let mut fill = self.state.fill;
        fill.apply_opacity(self.state.alpha as f32);
        let mut paint = Paint::default();
        paint.set_color(fill);
        paint.anti_alias = true;

        let transform = to_skia(self.state.transform);
        for run in buffer.layout_runs() {
            for glyph in run.glyphs {
                let physical = glyph.physical((0.0, 0.0), 1.0);
                let Some(commands) = self
                    .swash_cache
                    .get_outline_commands(fonts, physical.cache_key)
                else {
                    continue;
                };

                // Outlines are y-up.
                let mut builder = PathBuilder::new();
                for cmd in commands.iter() {
                    match cmd {
                        Command::MoveTo(p) => builder.move_to(p.x, -p.y),
                        Command::LineTo(p) => builder.line_to(p.x, -p.y),
                        Command::QuadTo(c, p) => builder.quad_to(c.x, -c.y, p.x, -p.y),
                        Command::CurveTo(c1, c2, p) => {
                            builder.cubic_to(c1.x, -c1.y, c2.x, -c2.y, p.x, -p.y);
                        }
                        Command::Close => builder.close(),
                    }
                }
                let Some(path) = builder.finish() else {
                    continue;
                };

                let glyph_x = base_x + glyph.x + glyph.font_size * glyph.x_offset;
                let glyph_y = base_y + glyph.y - glyph.font_size * glyph.y_offset;
                self.pixmap.fill_path(
                    &path,
                    &paint,
                    FillRule::Winding,
                    transform.pre_translate(glyph_x, glyph_y),
                    self.state.clip.as_ref(),
                );
            }
        }
        tracing::trace!("fillText {:?} at {} {}", text, x, y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::kurbo::{Ellipse, RoundedRectRadii};
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ResolvedImage {
        ResolvedImage::from_rgba(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    fn surface(width: u32, height: u32) -> PixmapSurface {
        PixmapSurface::new(SurfaceSize::new(width, height)).expect("surface")
    }

    fn alpha_at(surface: &PixmapSurface, x: u32, y: u32) -> u8 {
        surface.pixmap().pixel(x, y).expect("pixel").alpha()
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            PixmapSurface::new(SurfaceSize::new(0, 10)),
            Err(SurfaceError::InvalidDimensions { .. })
        ));
        assert!(PixmapSurface::new(SurfaceSize::new(MAX_DIMENSION + 1, 1)).is_err());
    }

    #[test]
    fn test_draw_region_scales_into_destination() {
        let mut s = surface(40, 40);
        let image = solid(4, 4, [255, 0, 0, 255]);
        s.draw_region(&image, Rect::new(0.0, 0.0, 4.0, 4.0), Rect::new(10.0, 10.0, 30.0, 30.0))
            .expect("draw");
        let inside = s.pixmap().pixel(20, 20).expect("pixel");
        assert_eq!((inside.red(), inside.alpha()), (255, 255));
        assert_eq!(alpha_at(&s, 5, 5), 0);
        assert_eq!(alpha_at(&s, 35, 35), 0);
    }

    #[test]
    fn test_global_alpha_applies_to_images() {
        let mut s = surface(10, 10);
        s.set_global_alpha(0.5);
        s.draw_region(
            &solid(2, 2, [0, 0, 255, 255]),
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        )
        .expect("draw");
        let a = alpha_at(&s, 5, 5);
        assert!((126..=129).contains(&a), "alpha {a}");
    }

    #[test]
    fn test_circular_clip_masks_corners_until_restore() {
        let mut s = surface(20, 20);
        let image = solid(1, 1, [0, 255, 0, 255]);
        let full = Rect::new(0.0, 0.0, 20.0, 20.0);

        s.save();
        s.clip(&ClipShape::Ellipse(Ellipse::from_rect(full)));
        s.draw_region(&image, Rect::new(0.0, 0.0, 1.0, 1.0), full).expect("draw");
        assert_eq!(alpha_at(&s, 0, 0), 0);
        assert_eq!(alpha_at(&s, 10, 10), 255);
        s.restore();

        s.draw_region(&image, Rect::new(0.0, 0.0, 1.0, 1.0), full).expect("draw");
        assert_eq!(alpha_at(&s, 0, 0), 255);
    }

    #[test]
    fn test_clips_intersect() {
        let mut s = surface(20, 20);
        let image = solid(1, 1, [9, 9, 9, 255]);
        s.clip(&ClipShape::rounded_with_corners(
            Rect::new(0.0, 0.0, 10.0, 20.0),
            RoundedRectRadii::from_single_radius(0.0),
        ));
        s.clip(&ClipShape::rounded_with_corners(
            Rect::new(0.0, 0.0, 20.0, 10.0),
            RoundedRectRadii::from_single_radius(0.0),
        ));
        s.draw_region(&image, Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(0.0, 0.0, 20.0, 20.0))
            .expect("draw");
        assert_eq!(alpha_at(&s, 5, 5), 255);
        assert_eq!(alpha_at(&s, 15, 5), 0);
        assert_eq!(alpha_at(&s, 5, 15), 0);
    }

    #[test]
    fn test_source_crop_selects_region() {
        let mut pixels = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]));
        for y in 0..2 {
            for x in 2..4 {
                pixels.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let image = ResolvedImage::from_rgba(pixels);
        let mut s = surface(8, 8);
        s.draw_region(&image, Rect::new(2.0, 0.0, 4.0, 2.0), Rect::new(0.0, 0.0, 8.0, 8.0))
            .expect("draw");
        let p = s.pixmap().pixel(4, 4).expect("pixel");
        assert_eq!((p.red(), p.blue()), (0, 255));
    }

    #[test]
    fn test_empty_regions_draw_nothing() {
        let mut s = surface(8, 8);
        let image = solid(2, 2, [1, 1, 1, 255]);
        s.draw_region(&image, Rect::new(5.0, 5.0, 9.0, 9.0), Rect::new(0.0, 0.0, 8.0, 8.0))
            .expect("draw");
        s.draw_region(&image, Rect::new(0.0, 0.0, 2.0, 2.0), Rect::new(0.0, 0.0, 0.0, 8.0))
            .expect("draw");
        assert_eq!(alpha_at(&s, 4, 4), 0);
    }

    #[test]
    fn test_clear_resets_pixels_and_state() {
        let mut s = surface(8, 8);
        s.save();
        s.translate(3.0, 3.0);
        s.draw_region(
            &solid(1, 1, [1, 2, 3, 255]),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(0.0, 0.0, 2.0, 2.0),
        )
        .expect("draw");
        assert_eq!(alpha_at(&s, 4, 4), 255);

        s.clear(None).expect("clear");
        assert_eq!(alpha_at(&s, 4, 4), 0);
        assert_eq!(s.transform(), Affine::IDENTITY);

        s.clear(Some(SurfaceSize::new(3, 5))).expect("resize");
        assert_eq!(s.size(), SurfaceSize::new(3, 5));
    }

    #[test]
    fn test_fill_color_parsing() {
        let mut s = surface(2, 2);
        s.set_fill_color("rgba(255, 0, 0, 0.5)").expect("rgba");
        s.set_fill_color("#00ff00").expect("hex");
        s.set_fill_color("rebeccapurple").expect("named");
        assert!(matches!(
            s.set_fill_color("not-a-color"),
            Err(SurfaceError::Color(_))
        ));
    }

    #[test]
    fn test_filter_applies_before_draw() {
        let mut s = surface(4, 4);
        s.set_filter("invert(100%)");
        s.draw_region(
            &solid(1, 1, [255, 255, 255, 255]),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(0.0, 0.0, 4.0, 4.0),
        )
        .expect("draw");
        let p = s.pixmap().pixel(2, 2).expect("pixel");
        assert_eq!((p.red(), p.alpha()), (0, 255));
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(family("sans-serif"), Family::SansSerif);
        assert_eq!(family("'Georgia', serif"), Family::Name("Georgia"));
        assert_eq!(family("monospace"), Family::Monospace);
    }

    #[test]
    fn test_skia_transform_matches_affine() {
        let affine = Affine::translate((5.0, 7.0)) * Affine::rotate(0.5);
        let t = to_skia(affine);
        let mut p = [tiny_skia::Point::from_xy(3.0, 2.0)];
        t.map_points(&mut p);
        let expected = affine * canvas_core::kurbo::Point::new(3.0, 2.0);
        assert!((f64::from(p[0].x) - expected.x).abs() < 1e-4);
        assert!((f64::from(p[0].y) - expected.y).abs() < 1e-4);
    }
}
