//! Discovers the URLs a stylesheet references through `url(...)` and `@import`.

use super::tokenizer::{CssTokenType, CssTokenizer, remove_css_comments};
use crate::resource::{Resource, ResourceType};
use crate::uri_util;
use std::collections::BTreeSet;

/// Every external URL referenced by `css_body`, resolved against `base_url`.
pub fn find_external_resources_in_css_block(base_url: &str, css_body: &str) -> BTreeSet<String> {
    let css = remove_css_comments(css_body);
    let mut tokenizer = CssTokenizer::new(&css);
    let mut urls = BTreeSet::new();

    while let Some(token) = tokenizer.next_token() {
        let target = match token.kind {
            CssTokenType::Url => Some(token.text),
            CssTokenType::Ident if token.text.eq_ignore_ascii_case("@import") => {
                match tokenizer.next_token() {
                    Some(next) if matches!(next.kind, CssTokenType::String | CssTokenType::Url) => Some(next.text),
                    _ => None,
                }
            }
            _ => None,
        };
        let Some(target) = target else {
            continue;
        };
        if target.is_empty() {
            continue;
        }
        match uri_util::resolve_uri(&target, base_url) {
            Some(resolved) => {
                urls.insert(resolved);
            }
            None => log::info!("Unable to resolve css reference {target} against {base_url}"),
        }
    }
    urls
}

/// Same as [`find_external_resources_in_css_block`] for a whole CSS resource. Non-CSS
/// resources yield nothing.
pub fn find_external_resources_in_css_resource(resource: &Resource) -> BTreeSet<String> {
    if resource.resource_type() != ResourceType::Css {
        log::debug!("Not a css resource: {}", resource.request_url());
        return BTreeSet::new();
    }
    let body = String::from_utf8_lossy(resource.response_body());
    find_external_resources_in_css_block(resource.request_url(), &body)
}
