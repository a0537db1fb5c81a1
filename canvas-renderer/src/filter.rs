//! CSS filter strings applied to image pixels on the raster surface.
//!
//! Supported functions: `blur`, `grayscale`, `brightness`, `contrast`,
//! `invert`, `opacity`. Anything else is ignored.

use image::{imageops, RgbaImage};

/// One parsed filter function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Gaussian blur with the given standard deviation in pixels.
    Blur(f32),
    /// Desaturate by `amount` in `[0, 1]`.
    Grayscale(f32),
    /// Multiply color channels.
    Brightness(f32),
    /// Scale channel distance from mid-gray.
    Contrast(f32),
    /// Invert by `amount` in `[0, 1]`.
    Invert(f32),
    /// Multiply alpha by `amount` in `[0, 1]`.
    Opacity(f32),
}

/// Parse a CSS filter string such as `blur(4px) grayscale(100%)`.
///
/// `none`, empty strings and unsupported functions yield no ops.
#[must_use]
pub fn parse_filter(filter: &str) -> Vec<FilterOp> {
    let filter = filter.trim();
    if filter.is_empty() || filter.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    let mut ops = Vec::new();
    let mut rest = filter;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|i| open + i) else {
            tracing::debug!("Unterminated filter function in {:?}", filter);
            break;
        };
        let name = rest[..open].trim().to_ascii_lowercase();
        let arg = rest[open + 1..close].trim();
        match parse_op(&name, arg) {
            Some(op) => ops.push(op),
            None => tracing::debug!("Ignoring unsupported filter {}({})", name, arg),
        }
        rest = &rest[close + 1..];
    }
    ops
}

fn parse_op(name: &str, arg: &str) -> Option<FilterOp> {
    match name {
        "blur" => {
            let px = if arg.is_empty() {
                0.0
            } else {
                arg.strip_suffix("px").unwrap_or(arg).trim().parse().ok()?
            };
            Some(FilterOp::Blur(f32::max(px, 0.0)))
        }
        "grayscale" => Some(FilterOp::Grayscale(parse_amount(arg)?.clamp(0.0, 1.0))),
        "brightness" => Some(FilterOp::Brightness(parse_amount(arg)?.max(0.0))),
        "contrast" => Some(FilterOp::Contrast(parse_amount(arg)?.max(0.0))),
        "invert" => Some(FilterOp::Invert(parse_amount(arg)?.clamp(0.0, 1.0))),
        "opacity" => Some(FilterOp::Opacity(parse_amount(arg)?.clamp(0.0, 1.0))),
        _ => None,
    }
}

/// Number or percentage; empty means 1.
fn parse_amount(arg: &str) -> Option<f32> {
    if arg.is_empty() {
        return Some(1.0);
    }
    let amount = match arg.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok().map(|v| v / 100.0),
        None => arg.parse::<f32>().ok(),
    };
    amount.filter(|v| v.is_finite())
}

/// Apply `ops` in order.
pub fn apply_filters(image: &mut RgbaImage, ops: &[FilterOp]) {
    for op in ops {
        match *op {
            FilterOp::Blur(sigma) => {
                if sigma > 0.0 {
                    *image = imageops::blur(&*image, sigma);
                }
            }
            FilterOp::Grayscale(amount) => map_rgb(image, |[r, g, b]| {
                let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
                [r, g, b].map(|c| c + (luma - c) * amount)
            }),
            FilterOp::Brightness(factor) => map_rgb(image, |rgb| rgb.map(|c| c * factor)),
            FilterOp::Contrast(factor) => {
                map_rgb(image, |rgb| rgb.map(|c| (c - 127.5) * factor + 127.5));
            }
            FilterOp::Invert(amount) => {
                map_rgb(image, |rgb| rgb.map(|c| c + (255.0 - 2.0 * c) * amount));
            }
            FilterOp::Opacity(amount) => {
                for pixel in image.pixels_mut() {
                    pixel[3] = to_channel(f32::from(pixel[3]) * amount);
                }
            }
        }
    }
}

fn map_rgb(image: &mut RgbaImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for pixel in image.pixels_mut() {
        let [r, g, b] = f([
            f32::from(pixel[0]),
            f32::from(pixel[1]),
            f32::from(pixel[2]),
        ]);
        pixel[0] = to_channel(r);
        pixel[1] = to_channel(g);
        pixel[2] = to_channel(b);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_parse_filter_chain() {
        assert_eq!(
            parse_filter("blur(4px) grayscale(100%) brightness(1.5)"),
            vec![
                FilterOp::Blur(4.0),
                FilterOp::Grayscale(1.0),
                FilterOp::Brightness(1.5)
            ]
        );
        assert_eq!(
            parse_filter("invert() opacity(50%)"),
            vec![FilterOp::Invert(1.0), FilterOp::Opacity(0.5)]
        );
    }

    #[test]
    fn test_none_and_unknown_filters() {
        assert!(parse_filter("none").is_empty());
        assert!(parse_filter("  ").is_empty());
        assert_eq!(
            parse_filter("hue-rotate(90deg) contrast(2)"),
            vec![FilterOp::Contrast(2.0)]
        );
        assert!(parse_filter("blur(4px").is_empty());
        assert!(parse_filter("grayscale(lots)").is_empty());
    }

    #[test]
    fn test_grayscale_and_invert() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 200]));
        apply_filters(&mut img, &[FilterOp::Grayscale(1.0)]);
        let p = img.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 200);

        let mut img = RgbaImage::from_pixel(1, 1, Rgba([10, 100, 250, 255]));
        apply_filters(&mut img, &[FilterOp::Invert(1.0)]);
        assert_eq!(img.get_pixel(0, 0).0, [245, 155, 5, 255]);
    }

    #[test]
    fn test_brightness_saturates() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 255]));
        apply_filters(&mut img, &[FilterOp::Brightness(2.0)]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 200, 0, 255]);
    }

    #[test]
    fn test_opacity_scales_alpha() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 200]));
        apply_filters(&mut img, &[FilterOp::Opacity(0.5)]);
        assert_eq!(img.get_pixel(1, 1).0, [1, 2, 3, 100]);
    }

    #[test]
    fn test_blur_keeps_dimensions() {
        let mut img = RgbaImage::from_pixel(8, 6, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 3, Rgba([255, 255, 255, 255]));
        apply_filters(&mut img, &[FilterOp::Blur(1.5)]);
        assert_eq!(img.dimensions(), (8, 6));
        assert!(img.get_pixel(4, 3)[0] < 255);
        assert!(img.get_pixel(5, 3)[0] > 0);
    }
}
