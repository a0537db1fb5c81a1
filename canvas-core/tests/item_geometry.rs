//! Item Geometry Integration Tests
//!
//! Tests the path from a parsed item document to drawable geometry:
//! - Cover fit for every sizing combination
//! - Clip shapes derived from border radius
//! - Curved text placement
//! - Paint order

use canvas_core::kurbo::{Point, Size};
use canvas_core::{
    build_clip, cover_fit, layout_curved_text, ArcParams, ClipShape, Dimension, ItemDocument,
    ItemId, ItemKind,
};

const DOCUMENT: &str = r#"{
    "width": 800,
    "height": 600,
    "items": [
        {
            "type": "image",
            "id": 1,
            "stackOrder": 5,
            "x": 40,
            "y": 60,
            "source": "avatar.png",
            "width": 120,
            "height": 120,
            "borderRadius": "50%"
        },
        {
            "type": "text",
            "id": 2,
            "stackOrder": 1,
            "x": 400,
            "y": 300,
            "text": "Happy Birthday",
            "fontSize": 32,
            "curveStrength": 25
        },
        {
            "type": "image",
            "id": "banner",
            "source": "banner.jpg",
            "aspectRatio": 0
        }
    ]
}"#;

fn image_at(doc: &ItemDocument, index: usize) -> &canvas_core::ImageItem {
    match &doc.items[index].kind {
        ItemKind::Image(image) => image,
        ItemKind::Text(_) => panic!("item {index} is not an image"),
    }
}

// ============================================================================
// Document
// ============================================================================

#[test]
fn test_document_paint_order() {
    let doc = ItemDocument::from_json(DOCUMENT).expect("parse");
    assert_eq!(doc.width, Some(800));

    let ids: Vec<_> = doc
        .paint_order()
        .into_iter()
        .map(|(_, item)| item.id.clone().expect("id"))
        .collect();
    assert_eq!(
        ids,
        vec![ItemId::from("banner"), ItemId::from(2), ItemId::from(1)]
    );
}

// ============================================================================
// Images
// ============================================================================

#[test]
fn test_avatar_is_cropped_square_and_circular() {
    let doc = ItemDocument::from_json(DOCUMENT).expect("parse");
    let avatar = image_at(&doc, 0);
    let item = &doc.items[0];

    let fit = cover_fit(&avatar.fit_request(), Size::new(1920.0, 1080.0));
    assert_eq!(fit.dest, Size::new(120.0, 120.0));
    assert!((fit.source.width() - 1080.0).abs() < 1e-9);
    assert!((fit.source.x0 - 420.0).abs() < 1e-9);

    let dest = fit.dest_rect(item.x, item.y);
    let clip = build_clip(avatar.border_radius, dest).expect("clip");
    let ClipShape::Ellipse(ellipse) = clip else {
        panic!("expected circular clip");
    };
    assert_eq!(ellipse.center(), Point::new(100.0, 120.0));
}

#[test]
fn test_zero_aspect_ratio_passes_through() {
    let doc = ItemDocument::from_json(DOCUMENT).expect("parse");
    let banner = image_at(&doc, 2);
    assert_eq!(banner.width, Dimension::Auto);

    let natural = Size::new(1200.0, 400.0);
    let fit = cover_fit(&banner.fit_request(), natural);
    assert_eq!(fit.dest, natural);
    assert_eq!(fit.source.size(), natural);
}

// ============================================================================
// Text
// ============================================================================

#[test]
fn test_curved_title_spans_its_arc() {
    let doc = ItemDocument::from_json(DOCUMENT).expect("parse");
    let item = &doc.items[1];
    let ItemKind::Text(text) = &item.kind else {
        panic!("expected text");
    };

    let arc = ArcParams::new(f64::from(doc.width.expect("width")), text.clamped_curve_strength());
    assert!((arc.radius - 200.0).abs() < 1e-9);

    let glyphs = layout_curved_text(
        &text.text,
        Point::new(item.x, item.y),
        arc,
        text.letter_spacing,
        |g| g.len() as f64 * text.font_size * 0.5,
    );
    assert_eq!(glyphs.len(), text.text.chars().count());

    let span: f64 = glyphs.iter().map(|g| g.advance).sum::<f64>();
    assert!(span > 0.0);
    let first = glyphs.first().expect("glyph");
    let last = glyphs.last().expect("glyph");
    assert!(first.angle < 0.0 && last.angle > 0.0);
    assert!(first.angle > -arc.total_arc / 2.0);
    assert!(last.angle < arc.total_arc / 2.0);
    for glyph in &glyphs {
        let distance = glyph.position.distance(Point::new(item.x, item.y));
        assert!((distance - arc.radius).abs() < 1e-9);
    }
}
