//! A conservative CSS minifier: comments go, whitespace collapses, and the last `;`
//! of a declaration block is dropped. Strings are copied untouched, and a `/*` inside
//! one is not a comment.

fn is_tight_punct(c: char, in_block: bool) -> bool {
    // Inside a rule ':' separates property and value; in a selector it starts a
    // pseudo-class and a preceding space is significant.
    matches!(c, '{' | '}' | ';' | ',' | '>') || (in_block && c == ':')
}

pub fn minify_css(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    let mut pending_space = false;
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        if c == '/' && chars.as_str().starts_with('*') {
            let comment_body = &chars.as_str()[1..];
            match comment_body.find("*/") {
                Some(end) => chars = comment_body[end + 2..].chars(),
                None => break,
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            pending_space = false;
            let in_block = depth > 0;
            let prev_tight = out.chars().last().is_none_or(|p| is_tight_punct(p, in_block));
            if !prev_tight && !is_tight_punct(c, in_block) {
                out.push(' ');
            }
        }

        match c {
            '"' | '\'' => {
                out.push(c);
                while let Some(n) = chars.next() {
                    out.push(n);
                    if n == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if n == c {
                        break;
                    }
                }
            }
            '{' => {
                depth += 1;
                out.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if out.ends_with(';') {
                    out.pop();
                }
                out.push(c);
            }
            '*' if out.ends_with('/') => {
                // A dropped comment left these two adjacent.
                out.push(' ');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_and_strips() {
        let css = "/* header */\na  {  color : red ;  }\n\n b > i,  c{x:y;}";
        assert_eq!(minify_css(css), "a{color:red}b>i,c{x:y}");
    }

    #[test]
    fn test_keeps_selector_pseudo_class_space() {
        assert_eq!(minify_css("div :hover { a: b }"), "div :hover{a:b}");
    }

    #[test]
    fn test_strings_verbatim() {
        assert_eq!(
            minify_css("a { content: \"  x ; }  \" ; }"),
            "a{content:\"  x ; }  \"}"
        );
    }

    #[test]
    fn test_comment_opener_inside_string() {
        let css = "a { content: \"/*\" }\nb { c: d } /* x */";
        assert_eq!(minify_css(css), "a{content:\"/*\"}b{c:d}");
        assert_eq!(minify_css("a{content:'*/ /*'}"), "a{content:'*/ /*'}");
    }

    #[test]
    fn test_comments_between_tokens() {
        assert_eq!(minify_css("a /* x */ b{c:d}"), "a b{c:d}");
        assert_eq!(minify_css("a{b:c}/* unterminated"), "a{b:c}");
        assert_eq!(minify_css("a{b:1//**/*2}"), "a{b:1/ *2}");
    }

    #[test]
    fn test_already_minified_is_unchanged() {
        let css = "a{b:c}d e{f:g}";
        assert_eq!(minify_css(css), css);
    }
}
