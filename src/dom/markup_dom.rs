//! DOM backend built by scanning raw HTML with [`HtmlTag`].
//!
//! Used when a capture has an HTML body but no rendered DOM. Only what the markup
//! states is known: tag names, attributes and inline `style` declarations. Geometry is
//! [`DomStatus::Unsupported`] and frames have no content document.

use super::{DomDocument, DomElement, DomElementVisitor, DomStatus, is_specified};
use crate::html::{HtmlTag, TagType};

/// Tags whose bodies are raw text and must not be scanned for markup.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "xmp"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkupElement {
    tag: String,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    document_url: String,
    base_url: String,
    elements: Vec<MarkupElement>,
}

impl MarkupDocument {
    pub fn parse(document_url: &str, body: &[u8]) -> Self {
        let mut elements = Vec::new();
        let mut base_url = document_url.to_string();
        let mut tag = HtmlTag::new();
        let mut pos = 0;

        while let Some(next) = tag.read_next_tag(body, pos) {
            pos = next;
            if !matches!(tag.tag_type(), TagType::Start | TagType::SelfClosing) {
                continue;
            }
            let name = tag.tag_name().to_string();
            let attrs: Vec<(String, String)> = tag
                .attr_names()
                .map(|attr| (attr.to_string(), tag.attr_value(attr).unwrap_or_default().to_string()))
                .collect();

            if name == "base"
                && let Some((_, href)) = attrs.iter().find(|(k, _)| k == "href")
                && let Some(resolved) = crate::uri_util::resolve_uri(href, document_url)
            {
                base_url = resolved;
            }
            elements.push(MarkupElement { tag: name.clone(), attrs });

            if tag.tag_type() == TagType::Start && RAW_TEXT_TAGS.contains(&name.as_str()) {
                match tag.read_closing_foreign_tag(body, pos) {
                    Some(close) => pos = close,
                    None => break,
                }
            }
        }

        Self {
            document_url: document_url.to_string(),
            base_url,
            elements,
        }
    }
}

impl DomDocument for MarkupDocument {
    fn document_url(&self) -> String {
        self.document_url.clone()
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn traverse(&self, visitor: &mut dyn DomElementVisitor) {
        for element in &self.elements {
            visitor.visit(&MarkupElementRef { element });
        }
    }

    fn clone_document(&self) -> Box<dyn DomDocument> {
        Box::new(self.clone())
    }
}

struct MarkupElementRef<'a> {
    element: &'a MarkupElement,
}

impl MarkupElementRef<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.element
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn inline_style(&self, property: &str) -> Option<String> {
        self.attr("style")?.split(';').find_map(|declaration| {
            let (key, value) = declaration.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(property)
                .then(|| value.trim().to_string())
        })
    }
}

impl DomElement for MarkupElementRef<'_> {
    fn content_document(&self) -> Option<Box<dyn DomDocument>> {
        None
    }

    fn tag_name(&self) -> String {
        self.element.tag.to_ascii_uppercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attr(name).map(str::to_string)
    }

    fn css_property(&self, name: &str) -> DomStatus<String> {
        self.inline_style(name).into()
    }

    fn has_width_specified(&self) -> DomStatus<bool> {
        DomStatus::Success(is_specified(self.attr("width")) || is_specified(self.inline_style("width").as_deref()))
    }

    fn has_height_specified(&self) -> DomStatus<bool> {
        DomStatus::Success(is_specified(self.attr("height")) || is_specified(self.inline_style("height").as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_skips_script_bodies() {
        let html = b"<html><head><base href=\"/static/\"><script>var s = '<img src=x>';</script></head>\
                     <body><IMG SRC=a.png style=\"height: 5px\"></body></html>";
        let doc = MarkupDocument::parse("http://example.com/page.html", html);
        assert_eq!(doc.base_url(), "http://example.com/static/");

        let mut seen = Vec::new();
        doc.traverse(&mut |el: &dyn DomElement| {
            seen.push((el.tag_name(), el.attribute("src")));
        });
        let tags: Vec<_> = seen.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tags, vec!["HTML", "HEAD", "BASE", "SCRIPT", "BODY", "IMG"]);
        assert_eq!(seen[5].1.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_geometry_is_unsupported() {
        let doc = MarkupDocument::parse("http://example.com/", b"<img src=a.png style='height: 5px'>");
        let mut checked = false;
        doc.traverse(&mut |el: &dyn DomElement| {
            assert_eq!(el.actual_width(), DomStatus::Unsupported);
            assert_eq!(el.x(), DomStatus::Unsupported);
            assert_eq!(el.has_width_specified(), DomStatus::Success(false));
            assert_eq!(el.has_height_specified(), DomStatus::Success(true));
            assert_eq!(el.css_property("height"), DomStatus::Success("5px".to_string()));
            assert_eq!(el.css_property("color"), DomStatus::NotApplicable);
            checked = true;
        });
        assert!(checked);
    }
}
