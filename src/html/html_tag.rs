//! Byte-level scanner for a single HTML tag.
//!
//! `HtmlTag` reads one tag at a time out of a raw markup buffer. It does not build a tree and
//! it never unescapes entities: attribute values are kept exactly as written. Positions are
//! byte offsets into the buffer handed to each call, so a scan never copies the document.

use std::fmt;

/// Kind of the tag most recently read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagType {
    #[default]
    Neither,
    Start,
    End,
    SelfClosing,
    Comment,
    Doctype,
}

/// C `isspace` over a single byte
fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn is_tagname_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'/' || c == b'!' || c == b'?'
}

fn is_tagname_rest(c: u8) -> bool {
    !is_space(c) && c != 0 && c != b'>' && c != b'/'
}

fn is_attr_rest(c: u8) -> bool {
    !is_space(c) && c != 0 && c != b'>' && c != b'='
}

fn needs_quote(c: u8) -> bool {
    c <= b' ' || c >= 0x7f || c == b'"' || c == b'\'' || c == b'>' || c == b'`'
}

/// Choose the quote character to use when writing `value` back out.
///
/// Returns `None` when the value can be written bare.
fn pick_quote(value: &str) -> Option<char> {
    if value.is_empty() {
        return Some('"');
    }
    let bytes = value.as_bytes();
    if !bytes.iter().any(|&c| needs_quote(c)) {
        return None;
    }
    if !bytes.contains(&b'"') {
        Some('"')
    } else if !bytes.contains(&b'\'') {
        Some('\'')
    } else {
        // Both quote kinds present: nothing round-trips without entity escaping.
        Some('"')
    }
}

/// Advance `p` while `pred` holds. `None` means the buffer ended first.
fn skip_while(input: &[u8], mut p: usize, pred: impl Fn(u8) -> bool) -> Option<usize> {
    loop {
        let c = *input.get(p)?;
        if pred(c) {
            p += 1;
        } else {
            return Some(p);
        }
    }
}

fn lossy_lower(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}

/// One parsed HTML tag: name, attributes in source order, and its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlTag {
    tag_name: String,
    tag_type: TagType,
    attrs: Vec<(String, Option<String>)>,
}

impl HtmlTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercased tag name as read, including a leading `/` for end tags
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Tag name without the leading `/` of an end tag
    pub fn base_tag_name(&self) -> &str {
        if self.tag_type == TagType::End {
            self.tag_name.strip_prefix('/').unwrap_or(&self.tag_name)
        } else {
            &self.tag_name
        }
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn is_end_tag(&self) -> bool {
        self.tag_type == TagType::End
    }

    /// True for `<tag ... />`
    pub fn is_empty_element(&self) -> bool {
        self.tag_type == TagType::SelfClosing
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_attr(&self, attr: &str) -> bool {
        self.attrs.iter().any(|(name, _)| name == attr)
    }

    pub fn has_attr_value(&self, attr: &str) -> bool {
        self.attr_value(attr).is_some()
    }

    pub fn attr_value(&self, attr: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == attr)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Add a valueless attribute; existing attributes are left alone.
    pub fn add_attr(&mut self, attr: &str) {
        if !self.has_attr(attr) {
            self.attrs.push((attr.to_string(), None));
        }
    }

    /// Set the value of an attribute, adding the attribute if needed.
    pub fn set_attr_value(&mut self, attr: &str, value: &str) {
        match self.attrs.iter_mut().find(|(name, _)| name == attr) {
            Some((_, slot)) => *slot = Some(value.to_string()),
            None => self.attrs.push((attr.to_string(), Some(value.to_string()))),
        }
    }

    pub fn clear_attr(&mut self, attr: &str) {
        self.attrs.retain(|(name, _)| name != attr);
    }

    pub fn sort_attributes(&mut self) {
        self.attrs.sort_by(|a, b| a.0.cmp(&b.0));
    }

    fn insert_parsed_attr(&mut self, name: String, value: Option<String>) {
        if self.has_attr(&name) {
            log::warn!("duplicated {} attribute in {} tag", name, self.tag_name);
        } else {
            self.attrs.push((name, value));
        }
    }

    /// Read exactly one tag starting at `begin`, which must point at `<`.
    ///
    /// Returns the offset just past the tag, or `None` if the bytes there are not a tag or
    /// the buffer ends mid-tag. On `None` the caller should retry one byte further on.
    pub fn read_tag(&mut self, input: &[u8], begin: usize) -> Option<usize> {
        if input.len() < begin + 3 || input[begin] != b'<' {
            return None;
        }

        if input[begin + 1..].starts_with(b"!--") {
            self.tag_name = "!--".to_string();
            self.tag_type = TagType::Comment;
            self.attrs.clear();
            let body = begin + 2;
            return Some(match find_bytes(&input[body..], b"-->") {
                Some(offset) => body + offset + 3,
                None => input.len(),
            });
        }

        let name_start = begin + 1;
        if !is_tagname_start(input[name_start]) {
            return None;
        }
        let mut p = skip_while(input, name_start + 1, is_tagname_rest)?;
        self.tag_name = lossy_lower(&input[name_start..p]);
        self.attrs.clear();

        let is_doctype = self.tag_name == "!doctype";
        if is_doctype {
            self.tag_type = TagType::Doctype;
        }

        loop {
            p = skip_while(input, p, is_space)?;

            if input[p] == b'>' {
                if !is_doctype {
                    self.tag_type = if input[name_start] == b'/' {
                        TagType::End
                    } else {
                        TagType::Start
                    };
                }
                return Some(p + 1);
            }
            if input[p] == b'/' && input.get(p + 1) == Some(&b'>') {
                if !is_doctype {
                    self.tag_type = TagType::SelfClosing;
                }
                return Some(p + 2);
            }

            let attr_start = p;
            if is_doctype && (input[p] == b'"' || input[p] == b'\'') {
                let quote = input[p];
                p = skip_while(input, p + 1, |c| c != quote)? + 1;
                let literal = String::from_utf8_lossy(&input[attr_start..p]).into_owned();
                self.insert_parsed_attr(literal, None);
                continue;
            }

            p = skip_while(input, p, is_attr_rest)?;
            if p == attr_start {
                return None;
            }
            let attr_name = lossy_lower(&input[attr_start..p]);

            p = skip_while(input, p, is_space)?;
            if input[p] != b'=' {
                self.insert_parsed_attr(attr_name, None);
                continue;
            }
            p = skip_while(input, p + 1, is_space)?;

            let (value_start, value_end);
            let first = input[p];
            if first == b'"' || first == b'\'' {
                value_start = p + 1;
                p = skip_while(input, value_start, |c| c != first)?;
                value_end = p;
                p += 1;
            } else {
                value_start = p;
                p = skip_while(input, p, |c| !needs_quote(c))?;
                value_end = p;
            }
            let value = String::from_utf8_lossy(&input[value_start..value_end]).into_owned();
            self.insert_parsed_attr(attr_name, Some(value));
        }
    }

    /// Skip ahead to the next well-formed tag at or after `begin` and read it.
    pub fn read_next_tag(&mut self, input: &[u8], mut begin: usize) -> Option<usize> {
        while begin < input.len() {
            match input[begin..].iter().position(|&c| c == b'<') {
                Some(offset) => begin += offset,
                None => return None,
            }
            if let Some(end) = self.read_tag(input, begin) {
                return Some(end);
            }
            begin += 1;
        }
        None
    }

    /// Scan for the end tag matching the start tag just read, ignoring any other tags in
    /// between. Used for `<script>` and `<style>` bodies, which may contain stray markup.
    pub fn read_closing_foreign_tag(&mut self, input: &[u8], mut begin: usize) -> Option<usize> {
        if self.tag_type != TagType::Start {
            log::error!("read_closing_foreign_tag called after a {:?} tag", self.tag_type);
        }
        let base = self.tag_name.clone();
        let mut probe = HtmlTag::new();

        while begin < input.len() {
            match input[begin..].iter().position(|&c| c == b'<') {
                Some(offset) => begin += offset,
                None => return None,
            }
            if input.get(begin + 1) == Some(&b'/')
                && let Some(end) = probe.read_tag(input, begin)
                && probe.is_end_tag()
                && probe.base_tag_name() == base
            {
                *self = probe;
                return Some(end);
            }
            begin += 1;
        }
        None
    }

    /// Write the tag in normalized form: lowercase names, minimal quoting, ` />` for
    /// self-closing tags.
    pub fn append_tag_to_string(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag_name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                out.push('=');
                let quote = pick_quote(value);
                if let Some(q) = quote {
                    out.push(q);
                }
                out.push_str(value);
                if let Some(q) = quote {
                    out.push(q);
                }
            }
        }
        if self.is_empty_element() {
            out.push_str(" />");
        } else {
            out.push('>');
        }
    }
}

impl fmt::Display for HtmlTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.append_tag_to_string(&mut out);
        f.write_str(&out)
    }
}

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
