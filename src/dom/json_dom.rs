//! DOM backend over a JSON snapshot.
//!
//! ```json
//! { "documentUrl": "http://example.com/", "baseUrl": "http://example.com/",
//!   "elements": [ { "tag": "IMG", "attrs": { "src": "a.png" }, "width": 15, "height": 5 },
//!                 { "tag": "IFRAME", "contentDocument": { ... } } ] }
//! ```
//!
//! `elements` is the document's elements in pre-order.

use super::{DomDocument, DomElement, DomElementVisitor, DomError, DomStatus, is_specified};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDocumentData {
    pub document_url: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default)]
    pub elements: Vec<JsonElementData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonElementData {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Computed style properties, when the capture recorded them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_document: Option<Box<JsonDocumentData>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    data: JsonDocumentData,
}

impl JsonDocument {
    pub fn new(data: JsonDocumentData) -> Self {
        let mut data = data;
        if data.base_url.is_empty() {
            data.base_url = data.document_url.clone();
        }
        Self { data }
    }

    pub fn from_json(json: &str) -> Result<Self, DomError> {
        let data: JsonDocumentData = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, DomError> {
        let data: JsonDocumentData = serde_json::from_value(value)?;
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &JsonDocumentData {
        &self.data
    }
}

impl DomDocument for JsonDocument {
    fn document_url(&self) -> String {
        self.data.document_url.clone()
    }

    fn base_url(&self) -> String {
        self.data.base_url.clone()
    }

    fn traverse(&self, visitor: &mut dyn DomElementVisitor) {
        for element in &self.data.elements {
            visitor.visit(&JsonElement { data: element });
        }
    }

    fn width(&self) -> DomStatus<i32> {
        self.data.width.into()
    }

    fn height(&self) -> DomStatus<i32> {
        self.data.height.into()
    }

    fn clone_document(&self) -> Box<dyn DomDocument> {
        Box::new(self.clone())
    }
}

struct JsonElement<'a> {
    data: &'a JsonElementData,
}

impl JsonElement<'_> {
    fn lookup<'m>(map: &'m BTreeMap<String, String>, name: &str) -> Option<&'m str> {
        map.get(name)
            .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
            .map(String::as_str)
    }

    fn is_dimension_specified(&self, name: &str) -> bool {
        is_specified(Self::lookup(&self.data.attrs, name)) || is_specified(Self::lookup(&self.data.style, name))
    }
}

impl DomElement for JsonElement<'_> {
    fn content_document(&self) -> Option<Box<dyn DomDocument>> {
        self.data
            .content_document
            .as_deref()
            .map(|doc| Box::new(JsonDocument::new(doc.clone())) as Box<dyn DomDocument>)
    }

    fn tag_name(&self) -> String {
        self.data.tag.to_ascii_uppercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        Self::lookup(&self.data.attrs, name).map(str::to_string)
    }

    fn css_property(&self, name: &str) -> DomStatus<String> {
        Self::lookup(&self.data.style, name).map(str::to_string).into()
    }

    fn x(&self) -> DomStatus<i32> {
        self.data.x.into()
    }

    fn y(&self) -> DomStatus<i32> {
        self.data.y.into()
    }

    fn actual_width(&self) -> DomStatus<i32> {
        self.data.width.into()
    }

    fn actual_height(&self) -> DomStatus<i32> {
        self.data.height.into()
    }

    fn has_width_specified(&self) -> DomStatus<bool> {
        DomStatus::Success(self.is_dimension_specified("width"))
    }

    fn has_height_specified(&self) -> DomStatus<bool> {
        DomStatus::Success(self.is_dimension_specified("height"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "documentUrl": "http://example.com/index.html",
        "elements": [
            { "tag": "html" },
            { "tag": "img", "attrs": { "SRC": "a.png", "width": "10", "height": "" }, "width": 15, "height": 5 },
            { "tag": "iframe", "attrs": { "src": "frame.html" }, "x": 10, "y": 20,
              "contentDocument": { "documentUrl": "http://example.com/frame.html",
                                   "elements": [ { "tag": "img", "style": { "height": "4px" } } ] } }
        ]
    }"#;

    fn collect_tags(doc: &dyn DomDocument) -> Vec<String> {
        let mut tags = Vec::new();
        doc.traverse(&mut |el: &dyn DomElement| tags.push(el.tag_name()));
        tags
    }

    #[test]
    fn test_traverse_uppercases_tags() {
        let doc = JsonDocument::from_json(DOC).unwrap();
        assert_eq!(collect_tags(&doc), vec!["HTML", "IMG", "IFRAME"]);
        assert_eq!(doc.base_url(), "http://example.com/index.html");
    }

    #[test]
    fn test_element_queries() {
        let doc = JsonDocument::from_json(DOC).unwrap();
        let mut seen = Vec::new();
        doc.traverse(&mut |el: &dyn DomElement| {
            if el.tag_name() == "IMG" {
                seen.push((
                    el.attribute("src"),
                    el.actual_width(),
                    el.has_width_specified(),
                    el.has_height_specified(),
                    el.x(),
                ));
            }
        });
        assert_eq!(
            seen,
            vec![(
                Some("a.png".to_string()),
                DomStatus::Success(15),
                DomStatus::Success(true),
                DomStatus::Success(false),
                DomStatus::NotApplicable
            )]
        );
    }

    #[test]
    fn test_content_document_is_fresh_copy() {
        let doc = JsonDocument::from_json(DOC).unwrap();
        let mut children = Vec::new();
        doc.traverse(&mut |el: &dyn DomElement| {
            if let Some(child) = el.content_document() {
                children.push(child);
            }
        });
        assert_eq!(children.len(), 1);
        let child = &children[0];
        assert_eq!(child.document_url(), "http://example.com/frame.html");
        assert_eq!(collect_tags(child.as_ref()), vec!["IMG"]);

        let mut specified = None;
        child.traverse(&mut |el: &dyn DomElement| specified = Some(el.has_height_specified()));
        assert_eq!(specified, Some(DomStatus::Success(true)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(JsonDocument::from_json("{\"elements\": []}").is_err());
        assert!(JsonDocument::from_json("not json").is_err());
    }
}
