//! Whitespace and markup compaction for HTML bodies.
//!
//! The compactor walks the document with [`HtmlTag`], collapses whitespace runs between
//! tags, drops comments and optional tags, strips attributes that carry their default
//! value, and copies the bodies of `pre`, `textarea`, `script` and `style` through verbatim.

use super::html_tag::{HtmlTag, TagType};
use std::collections::HashMap;
use std::sync::LazyLock;

const OPTIONAL: u8 = 1;
const FOREIGN: u8 = 2;
const SPECIAL_ATTR: u8 = 4;

#[derive(Debug, Clone, Copy)]
enum AttrRule {
    /// Drop the attribute when it is valueless or equals the given value (`None` drops always)
    Default(Option<&'static str>),
    /// Boolean attribute: keep the name, drop any value
    OneValue,
}

#[derive(Debug, Default)]
struct TagEntry {
    kind: u8,
    attrs: Vec<(&'static str, AttrRule)>,
}

const OPTIONAL_TAGS: &[&str] = &[
    "!--", "html", "head", "/head", "/body", "/html", "/li", "/dt", "/dd", "/p", "/optgroup", "/option",
    "/colgroup", "/thead", "/tbody", "/tfoot", "/tr", "/th",
];

const DEFAULT_ATTRS: &[(&str, &str, Option<&str>)] = &[
    ("script", "language", None),
    ("script", "type", None),
    ("style", "type", None),
    ("br", "clear", Some("none")),
    ("a", "shape", Some("rect")),
    ("area", "shape", Some("rect")),
    ("param", "valuetype", Some("data")),
    ("form", "method", Some("get")),
    ("form", "enctype", Some("application/x-www-form-urlencoded")),
    ("input", "type", Some("text")),
    ("button", "type", Some("submit")),
    ("colgroup", "span", Some("1")),
    ("col", "span", Some("1")),
    ("th", "rowspan", Some("1")),
    ("th", "colspan", Some("1")),
    ("td", "rowspan", Some("1")),
    ("td", "colspan", Some("1")),
    ("frame", "frameborder", Some("1")),
    ("frame", "scrolling", Some("auto")),
    ("iframe", "frameborder", Some("1")),
    ("iframe", "scrolling", Some("auto")),
];

const ONE_VALUE_ATTRS: &[(&str, &str)] = &[
    ("area", "nohref"),
    ("img", "ismap"),
    ("object", "declare"),
    ("hr", "noshade"),
    ("dl", "compact"),
    ("ol", "compact"),
    ("ul", "compact"),
    ("input", "checked"),
    ("input", "disabled"),
    ("input", "readonly"),
    ("select", "multiple"),
    ("select", "disabled"),
    ("option", "selected"),
    ("option", "disabled"),
    ("textarea", "disabled"),
    ("textarea", "readonly"),
    ("button", "disabled"),
    ("th", "nowrap"),
    ("td", "nowrap"),
    ("script", "defer"),
];

/// Built on first use, read-only afterwards.
static SPECIAL_TAGS: LazyLock<HashMap<&'static str, TagEntry>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, TagEntry> = HashMap::new();
    for tag in ["pre", "style", "script", "textarea"] {
        map.entry(tag).or_default().kind |= FOREIGN;
    }
    for &tag in OPTIONAL_TAGS {
        map.entry(tag).or_default().kind |= OPTIONAL;
    }
    for &(tag, attr, value) in DEFAULT_ATTRS {
        let entry = map.entry(tag).or_default();
        entry.kind |= SPECIAL_ATTR;
        entry.attrs.push((attr, AttrRule::Default(value)));
    }
    for &(tag, attr) in ONE_VALUE_ATTRS {
        let entry = map.entry(tag).or_default();
        entry.kind |= SPECIAL_ATTR;
        entry.attrs.push((attr, AttrRule::OneValue));
    }
    map
});

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn compact_tag(tag: &mut HtmlTag, entry: Option<&TagEntry>) {
    if let Some(entry) = entry {
        for (attr, rule) in &entry.attrs {
            if !tag.has_attr(attr) {
                continue;
            }
            match rule {
                AttrRule::Default(default) => {
                    let value = tag.attr_value(attr);
                    if default.is_none() || value.is_none() || value == *default {
                        tag.clear_attr(attr);
                    }
                }
                AttrRule::OneValue => {
                    if tag.has_attr_value(attr) {
                        tag.clear_attr(attr);
                        tag.add_attr(attr);
                    }
                }
            }
        }
    }
    tag.sort_attributes();
}

/// Compact an HTML document. The result is never longer than the input.
pub fn compact_html(input: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(input.len());
    let mut tag = HtmlTag::new();
    let mut p = 0;

    while p < input.len() {
        let c = input[p];
        if c == b'<' {
            match tag.read_tag(input, p) {
                Some(next) => p = process_tag(&mut tag, input, p, next, &mut out),
                None => {
                    out.push(c);
                    p += 1;
                }
            }
        } else if is_space(c) {
            let run_start = p;
            while p < input.len() && is_space(input[p]) {
                p += 1;
            }
            if out.last().is_none_or(|&last| !is_space(last)) {
                out.push(input[run_start]);
            }
        } else {
            out.push(c);
            p += 1;
        }
    }

    if out.len() > input.len() {
        // Normalized tags can in rare cases be longer than the original.
        return input.to_vec();
    }
    out
}

fn process_tag(tag: &mut HtmlTag, input: &[u8], tag_begin: usize, tag_end: usize, out: &mut Vec<u8>) -> usize {
    if tag.tag_type() == TagType::Doctype {
        out.extend_from_slice(&input[tag_begin..tag_end]);
        return tag_end;
    }
    if tag.tag_name().starts_with('?') {
        out.extend_from_slice(&input[tag_begin..tag_end]);
        return tag_end;
    }

    let entry = SPECIAL_TAGS.get(tag.tag_name());
    if let Some(entry) = entry
        && entry.kind & OPTIONAL != 0
        && tag.attr_names().next().is_none()
    {
        // Conditional comments are significant to old browsers.
        if tag.tag_type() == TagType::Comment && input[tag_begin..tag_end].starts_with(b"<!--[") {
            out.extend_from_slice(&input[tag_begin..tag_end]);
        }
        return tag_end;
    }

    let is_foreign = entry.is_some_and(|e| e.kind & FOREIGN != 0) && tag.tag_type() == TagType::Start;
    compact_tag(tag, entry);
    let mut rendered = String::new();
    tag.append_tag_to_string(&mut rendered);
    out.extend_from_slice(rendered.as_bytes());

    if !is_foreign {
        return tag_end;
    }

    let mut closing = tag.clone();
    match closing.read_closing_foreign_tag(input, tag_end) {
        Some(close_end) => {
            let close_begin = input[tag_end..close_end]
                .iter()
                .rposition(|&c| c == b'<')
                .map_or(tag_end, |offset| tag_end + offset);
            out.extend_from_slice(&input[tag_end..close_begin]);
            let mut rendered = String::new();
            closing.append_tag_to_string(&mut rendered);
            out.extend_from_slice(rendered.as_bytes());
            close_end
        }
        None => {
            out.extend_from_slice(&input[tag_end..]);
            input.len()
        }
    }
}
