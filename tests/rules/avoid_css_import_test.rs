use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::results::ResultDetails;
use pagespeed_lib::rules::AvoidCssImport;

const STYLES: &str = "http://example.com/styles.css";

#[test]
fn test_import_is_flagged() {
    let input = InputBuilder::new()
        .resource(resource(
            STYLES,
            "text/css",
            "/* @import url(\"http://example.com/commented.css\"); */\n\
             @import url(\"http://example.com/import1.css\");\n\
             @import 'import2.css';\n\
             body { color: purple }",
        ))
        .resource(resource("http://example.com/import1.css", "text/css", "a{}"))
        .resource(resource("http://example.com/import2.css", "text/css", "b{}"))
        .resource(resource("http://example.com/commented.css", "text/css", "c{}"))
        .build();

    let rule = AvoidCssImport::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![STYLES]);
    assert_eq!(findings[0].savings.critical_path_length_saved, 1);
    assert_eq!(
        findings[0].details,
        ResultDetails::CssImport {
            imported_stylesheets: vec![
                "http://example.com/import1.css".to_string(),
                "http://example.com/import2.css".to_string(),
            ],
        }
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "The following external stylesheets were included in http://example.com/styles.css using @import.",
            "http://example.com/import1.css",
            "http://example.com/import2.css",
        ]
    );
}

#[test]
fn test_import_of_unfetched_stylesheet() {
    let input = InputBuilder::new()
        .resource(resource(STYLES, "text/css", "@import url(missing.css);"))
        .build();
    assert!(run_rule(&AvoidCssImport::new(), &input).is_empty());
}

#[test]
fn test_no_imports() {
    let input = InputBuilder::new()
        .resource(resource(
            STYLES,
            "text/css",
            "body { background: url(bg.png) }",
        ))
        .resource(resource("http://example.com/bg.png", "image/png", vec![0u8; 4]))
        .build();
    assert!(run_rule(&AvoidCssImport::new(), &input).is_empty());
}

#[test]
fn test_html_is_not_scanned() {
    let input = InputBuilder::new()
        .resource(resource(
            "http://example.com/",
            "text/html",
            "<style>@import url(import1.css);</style>",
        ))
        .resource(resource("http://example.com/import1.css", "text/css", "a{}"))
        .build();
    assert!(run_rule(&AvoidCssImport::new(), &input).is_empty());
}
