use super::{InputBuilder, format_findings, redirect, rendered_lines, resource, run_rule};
use pagespeed_lib::rules::MinimizeRedirects;

#[test]
fn test_redirect_chain() {
    let input = InputBuilder::new()
        .resource(redirect("http://example.com/a", "http://example.com/b"))
        .resource(redirect("http://example.com/b", "/c"))
        .resource(resource("http://example.com/c", "text/css", "body{}"))
        .build();

    let rule = MinimizeRedirects::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].resource_urls,
        vec!["http://example.com/a", "http://example.com/b", "http://example.com/c"]
    );
    assert_eq!(findings[0].savings.requests_saved, 2);

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "Remove the following redirect chain if possible:",
            "http://example.com/a",
            "http://example.com/b",
            "http://example.com/c",
        ]
    );
}

#[test]
fn test_landing_page_chain_is_skipped() {
    let input = InputBuilder::new()
        .resource(redirect("http://example.com/", "http://www.example.com/"))
        .resource(resource("http://www.example.com/", "text/html", "<html></html>"))
        .resource(redirect("http://www.example.com/old.css", "http://www.example.com/new.css"))
        .resource(resource("http://www.example.com/new.css", "text/css", "a{}"))
        .primary("http://example.com/#top")
        .build();

    let findings = run_rule(&MinimizeRedirects::new(), &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].resource_urls,
        vec!["http://www.example.com/old.css", "http://www.example.com/new.css"]
    );
    assert_eq!(findings[0].savings.requests_saved, 1);
}

#[test]
fn test_no_redirects() {
    let input = InputBuilder::new()
        .resource(resource("http://example.com/", "text/html", "<html></html>"))
        .build();
    assert!(run_rule(&MinimizeRedirects::new(), &input).is_empty());
}

#[test]
fn test_redirect_to_unfetched_target() {
    // A chain of one known resource says nothing useful
    let input = InputBuilder::new()
        .resource(redirect("http://example.com/a", "http://elsewhere.com/"))
        .build();
    assert!(run_rule(&MinimizeRedirects::new(), &input).is_empty());
}

#[test]
fn test_redirect_loop() {
    let input = InputBuilder::new()
        .resource(redirect("http://example.com/a", "http://example.com/b"))
        .resource(redirect("http://example.com/b", "http://example.com/a"))
        .build();

    let findings = run_rule(&MinimizeRedirects::new(), &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].resource_urls,
        vec!["http://example.com/a", "http://example.com/b", "http://example.com/a"]
    );
}
