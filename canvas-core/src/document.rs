//! Item documents: the serialized form of one render request.

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasItem, CanvasResult};

/// A list of canvas items with an optional surface size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    /// Surface width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Surface height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Items in insertion order.
    #[serde(default)]
    pub items: Vec<CanvasItem>,
}

impl ItemDocument {
    /// Create a document from items.
    #[must_use]
    pub fn new(items: Vec<CanvasItem>) -> Self {
        Self {
            width: None,
            height: None,
            items,
        }
    }

    /// Set the surface size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the document has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in paint order, paired with their insertion index.
    #[must_use]
    pub fn paint_order(&self) -> Vec<(usize, &CanvasItem)> {
        paint_order(&self.items)
    }

    /// Serialize the document to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string_pretty(self).map_err(CanvasError::Serialization)
    }

    /// Deserialize a document from JSON.
    ///
    /// Accepts either `{"items": [...]}` or a bare array of items.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or an item is invalid.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let document = if json.trim_start().starts_with('[') {
            Self::new(serde_json::from_str(json)?)
        } else {
            serde_json::from_str(json)?
        };
        Ok(document)
    }
}

/// Order items for painting: ascending stack order, ties in insertion order.
///
/// The input slice is left untouched.
#[must_use]
pub fn paint_order(items: &[CanvasItem]) -> Vec<(usize, &CanvasItem)> {
    let mut ordered: Vec<(usize, &CanvasItem)> = items.iter().enumerate().collect();
    ordered.sort_by_key(|(_, item)| item.stack_order);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageItem, ItemId, TextItem};

    #[test]
    fn test_paint_order_is_stable() {
        let items = vec![
            CanvasItem::image(ImageItem::new("a.png")).with_id(1).with_stack_order(5),
            CanvasItem::text(TextItem::new("b")).with_id(2).with_stack_order(1),
            CanvasItem::text(TextItem::new("c")).with_id(3).with_stack_order(1),
            CanvasItem::text(TextItem::new("d")).with_id(4).with_stack_order(-2),
        ];
        let ids: Vec<_> = paint_order(&items)
            .into_iter()
            .map(|(index, item)| (index, item.id.clone()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (3, Some(ItemId::Number(4))),
                (1, Some(ItemId::Number(2))),
                (2, Some(ItemId::Number(3))),
                (0, Some(ItemId::Number(1))),
            ]
        );
        // Caller's order is untouched.
        assert_eq!(items[0].id, Some(ItemId::Number(1)));
    }

    #[test]
    fn test_document_accepts_bare_array() {
        let doc = ItemDocument::from_json(r#"[{"type": "text", "text": "hi"}]"#).expect("parse");
        assert_eq!(doc.len(), 1);
        assert!(doc.width.is_none());
    }

    #[test]
    fn test_document_errors_name_the_field() {
        let err = ItemDocument::from_json(r#"{"items": [{"type": "text", "text": 5}]}"#)
            .expect_err("text must be a string");
        let message = err.to_string();
        assert!(message.contains("invalid type"), "{message}");
        assert!(!message.contains("did not match any variant"), "{message}");

        let err = ItemDocument::from_json("  [{\"type\": \"text\", \"x\": \"left\"}]")
            .expect_err("x must be a number");
        assert!(err.to_string().contains("invalid type"), "{err}");
    }

    #[test]
    fn test_document_roundtrip() {
        let doc = ItemDocument::new(vec![CanvasItem::text(TextItem::new("hello")).at(4.0, 8.0)])
            .with_size(320, 240);
        let json = doc.to_json().expect("serialize");
        let parsed = ItemDocument::from_json(&json).expect("parse");
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_invalid_document_is_serialization_error() {
        let err = ItemDocument::from_json(r#"{"items": [{"type": "video"}]}"#).unwrap_err();
        assert!(matches!(err, CanvasError::Serialization(_)));
    }

    #[test]
    fn test_empty_document() {
        let doc = ItemDocument::from_json("{}").expect("parse");
        assert!(doc.is_empty());
        assert!(doc.paint_order().is_empty());
    }
}
