//! HTML scanning helpers: a single-tag reader and a compactor built on it.

pub mod html_compactor;
pub mod html_tag;

pub use html_compactor::compact_html;
pub use html_tag::{HtmlTag, TagType};
