//! URL helpers shared by the input model, the DOM layer and the rules.

use url::Url;

/// Resolve `uri` against `base_url`. Returns `None` when either side is unparseable.
pub fn resolve_uri(uri: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join(uri.trim()).ok().map(String::from)
}

/// Parse and normalize a URL and drop its fragment. This is the identity a `Resource`
/// is stored and looked up under.
pub fn canonicalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    parsed.set_fragment(None);
    Some(parsed.into())
}

/// Strip everything from the first `#` onwards, without any other normalization.
pub fn uri_without_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// True for URLs that name a fetchable resource (anything valid that is not a `data:` URL).
pub fn is_external_resource_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| u.scheme() != "data")
}

/// Lowercased host of `url`, if it has one.
pub fn host(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}

/// The path component, used to guess a type from a file extension.
pub fn path(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_uri("img/a.png", "http://example.com/dir/page.html").as_deref(),
            Some("http://example.com/dir/img/a.png")
        );
        assert_eq!(
            resolve_uri("/b.css", "http://example.com/dir/page.html").as_deref(),
            Some("http://example.com/b.css")
        );
        assert_eq!(
            resolve_uri("http://other.com/x.js", "http://example.com/").as_deref(),
            Some("http://other.com/x.js")
        );
        assert_eq!(resolve_uri("a.png", "not a url"), None);
    }

    #[test]
    fn test_empty_uri_resolves_to_base() {
        assert_eq!(
            resolve_uri("", "http://example.com/index.html").as_deref(),
            Some("http://example.com/index.html")
        );
    }

    #[test]
    fn test_canonicalize_drops_fragment() {
        assert_eq!(
            canonicalize_url("http://Example.com/a#frag").as_deref(),
            Some("http://example.com/a")
        );
        assert_eq!(canonicalize_url("http://example.com").as_deref(), Some("http://example.com/"));
        assert_eq!(canonicalize_url(""), None);
    }

    #[test]
    fn test_uri_without_fragment() {
        assert_eq!(uri_without_fragment("http://a.com/x#y"), "http://a.com/x");
        assert_eq!(uri_without_fragment("http://a.com/x"), "http://a.com/x");
    }

    #[test]
    fn test_external_resource_url() {
        assert!(is_external_resource_url("http://a.com/x.png"));
        assert!(!is_external_resource_url("data:image/png;base64,AAAA"));
        assert!(!is_external_resource_url("relative.png"));
    }

    #[test]
    fn test_host() {
        assert_eq!(host("http://WWW.Example.com:8080/x").as_deref(), Some("www.example.com"));
        assert_eq!(host("data:text/plain,hi"), None);
    }
}
