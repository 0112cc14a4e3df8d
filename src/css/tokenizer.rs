//! Forward-only CSS tokenizer.
//!
//! This is deliberately not a CSS parser: it splits a comment-free stylesheet into URL,
//! identifier and string tokens plus single-character separators, which is enough to find
//! `@import` directives and `url(...)` references. Every call advances the cursor, so
//! malformed input yields `Invalid` tokens instead of errors or stalls.

const CSS_WHITESPACE: &[u8] = b" \t\r\n\x0c";
const URL_DIRECTIVE: &[u8] = b"url(";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssTokenType {
    Url,
    Ident,
    String,
    Separator,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssToken {
    pub kind: CssTokenType,
    pub text: String,
}

impl CssToken {
    fn new(kind: CssTokenType, bytes: &[u8]) -> Self {
        Self {
            kind,
            text: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

fn is_css_whitespace(c: u8) -> bool {
    CSS_WHITESPACE.contains(&c)
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b'.'
}

/// Strip `/* ... */` comments in one pass. Comments do not nest, and an unterminated
/// comment runs to the end of the input.
///
/// A `/` left in front of a `*` once a comment is dropped opens another comment, so the
/// output never contains `/*`.
pub fn remove_css_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(star) = rest.find('*') {
        out.push_str(&rest[..star]);
        let after = &rest[star + 1..];
        if out.ends_with('/') {
            out.pop();
            match after.find("*/") {
                Some(end) => rest = &after[end + 2..],
                None => return out,
            }
        } else {
            out.push('*');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Lazily yields the tokens of a comment-free CSS body.
#[derive(Debug, Clone)]
pub struct CssTokenizer<'a> {
    body: &'a [u8],
    index: usize,
}

impl<'a> CssTokenizer<'a> {
    pub fn new(body: &'a str) -> Self {
        Self {
            body: body.as_bytes(),
            index: 0,
        }
    }

    fn skip_whitespace(&self, from: usize) -> Option<usize> {
        self.body
            .get(from..)?
            .iter()
            .position(|&c| !is_css_whitespace(c))
            .map(|offset| from + offset)
    }

    pub fn next_token(&mut self) -> Option<CssToken> {
        let start = self.skip_whitespace(self.index)?;
        self.index = start;

        // "url" is also a valid identifier, so URLs have to be tried first.
        if let Some(url) = self.take_url() {
            return Some(CssToken {
                kind: CssTokenType::Url,
                text: url,
            });
        }
        if self.index == start
            && let Some(ident) = self.take_ident()
        {
            return Some(CssToken {
                kind: CssTokenType::Ident,
                text: ident,
            });
        }
        if self.index == start
            && let Some((text, next)) = self.take_string(self.index)
        {
            self.index = next;
            return Some(CssToken {
                kind: CssTokenType::String,
                text,
            });
        }

        if self.index != start {
            // A take_* consumed input without producing a token.
            return Some(CssToken::new(CssTokenType::Invalid, &self.body[start..self.index]));
        }
        self.index += 1;
        Some(CssToken::new(CssTokenType::Separator, &self.body[start..start + 1]))
    }

    /// Read a quoted string starting at `at`. Returns the unescaped contents and the index
    /// just past the closing quote (or where scanning stopped).
    fn take_string(&self, at: usize) -> Option<(String, usize)> {
        let quote = *self.body.get(at)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }

        let mut out = Vec::new();
        let mut next = at + 1;
        while next < self.body.len() {
            let c = self.body[next];
            if c == quote {
                break;
            }
            match c {
                b'\\' => next += self.consume_escape(next, &mut out),
                b'\r' | b'\n' | 0x0c => break,
                _ => out.push(c),
            }
            next += 1;
        }

        if next < self.body.len() {
            if self.body[next] == quote {
                next += 1;
            }
        } else {
            next = self.body.len();
        }
        Some((String::from_utf8_lossy(&out).into_owned(), next))
    }

    /// Handle the escape whose backslash sits at `at`; returns how many bytes after the
    /// backslash were consumed.
    fn consume_escape(&self, at: usize, out: &mut Vec<u8>) -> usize {
        let next = at + 1;
        match self.body.get(next..) {
            Some([b'\r', b'\n', ..]) => 2,
            Some([b'\r' | b'\n', ..]) => 1,
            Some([c, ..]) => {
                out.push(*c);
                1
            }
            _ => 0,
        }
    }

    fn take_url(&mut self) -> Option<String> {
        if self.index + URL_DIRECTIVE.len() >= self.body.len() {
            return None;
        }
        let directive = &self.body[self.index..self.index + URL_DIRECTIVE.len()];
        if !directive.eq_ignore_ascii_case(URL_DIRECTIVE) {
            return None;
        }

        let inner = self.index + URL_DIRECTIVE.len();
        let next = self.skip_whitespace(inner)?;

        if let Some((text, after)) = self.take_string(next) {
            let Some(close) = self.skip_whitespace(after) else {
                // Quoted URL followed only by whitespace: consume everything.
                self.index = self.body.len();
                return None;
            };
            if self.body[close] != b')' {
                // Junk between the string and the paren; skip to the paren like browsers do.
                self.index = match self.body[close..].iter().position(|&c| c == b')') {
                    Some(offset) => close + offset + 1,
                    None => self.body.len(),
                };
                return None;
            }
            self.index = close + 1;
            return Some(text);
        }

        let close = inner + self.body[inner..].iter().position(|&c| c == b')')?;
        let raw = String::from_utf8_lossy(&self.body[inner..close]);
        self.index = close + 1;
        Some(raw.trim_matches(|c: char| c.is_ascii_whitespace()).to_string())
    }

    fn take_ident(&mut self) -> Option<String> {
        #[derive(PartialEq, PartialOrd)]
        enum State {
            OptionalFirst,
            RequiredIdent,
            OptionalIdent,
            OptionalLast,
            Done,
            Error,
        }

        let mut next = self.index;
        let mut state = State::OptionalFirst;
        while state != State::Error && state != State::Done && next < self.body.len() {
            let c = self.body[next];
            state = match state {
                State::OptionalFirst => {
                    if matches!(c, b'-' | b'@' | b'!' | b'.' | b'#') {
                        next += 1;
                    }
                    State::RequiredIdent
                }
                State::RequiredIdent => {
                    if is_ident_char(c) {
                        next += 1;
                        State::OptionalIdent
                    } else {
                        State::Error
                    }
                }
                State::OptionalIdent => {
                    if is_ident_char(c) {
                        next += 1;
                        State::OptionalIdent
                    } else {
                        State::OptionalLast
                    }
                }
                State::OptionalLast => {
                    if c == b'%' {
                        next += 1;
                    }
                    State::Done
                }
                other => other,
            };
        }

        if next == self.body.len() && state != State::Error && state > State::RequiredIdent {
            state = State::Done;
        }
        if state != State::Done {
            return None;
        }
        let ident = String::from_utf8_lossy(&self.body[self.index..next]).into_owned();
        self.index = next;
        Some(ident)
    }
}

impl Iterator for CssTokenizer<'_> {
    type Item = CssToken;

    fn next(&mut self) -> Option<CssToken> {
        self.next_token()
    }
}
