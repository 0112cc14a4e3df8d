use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::results::ResultDetails;
use pagespeed_lib::rules::OptimizeTheOrderOfStylesAndScripts;

const PAGE: &str = "http://example.com/";

#[test]
fn test_stylesheet_after_script() {
    let input = InputBuilder::new()
        .resource(resource(
            PAGE,
            "text/html",
            "<html><head><script src=\"a.js\"></script><link rel=\"stylesheet\" href=\"a.css\">\
             <script>document.title = 'x';</script></head><body></body></html>",
        ))
        .resource(resource("http://example.com/a.js", "application/javascript", "x()"))
        .resource(resource("http://example.com/a.css", "text/css", "body{}"))
        .build();

    let rule = OptimizeTheOrderOfStylesAndScripts::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![PAGE]);
    assert_eq!(findings[0].savings.critical_path_length_saved, 1);
    assert_eq!(
        findings[0].details,
        ResultDetails::ResourceOrdering {
            out_of_order_external_css: vec!["http://example.com/a.css".to_string()],
            out_of_order_inline_scripts: Vec::new(),
        }
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "The following external CSS files were included after an external JavaScript file in \
             http://example.com/. To ensure CSS files are downloaded in parallel, always include external CSS \
             before external JavaScript."
                .to_string(),
            "http://example.com/a.css".to_string(),
        ]
    );
}

#[test]
fn test_inline_script_between_css_and_script() {
    let input = InputBuilder::new()
        .resource(resource(
            PAGE,
            "text/html",
            "<head><link rel=stylesheet href=a.css><script>var a = 1;</script><script>var b = 2;</script>\
             <script src=a.js></script></head>",
        ))
        .build();

    let rule = OptimizeTheOrderOfStylesAndScripts::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    let ResultDetails::ResourceOrdering {
        out_of_order_inline_scripts,
        out_of_order_external_css,
    } = &findings[0].details
    else {
        panic!("unexpected details {:?}", findings[0].details);
    };
    assert_eq!(out_of_order_inline_scripts, &vec![2]);
    assert!(out_of_order_external_css.is_empty());

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("The following inline script blocks were found in http://example.com/"));
    assert_eq!(lines[1], "Inline script block #2");
}

#[test]
fn test_non_html_resources_ignored() {
    let input = InputBuilder::new()
        .resource(resource(
            "http://example.com/page.txt",
            "text/plain",
            "<script src=a.js></script><link rel=stylesheet href=a.css>",
        ))
        .build();
    assert!(run_rule(&OptimizeTheOrderOfStylesAndScripts::new(), &input).is_empty());
}

#[test]
fn test_script_in_comment_like_body_is_skipped() {
    // The body of a script is never parsed as tags
    let input = InputBuilder::new()
        .resource(resource(
            PAGE,
            "text/html",
            "<head><link rel=stylesheet href=a.css>\
             <script src=a.js>document.write('<link rel=stylesheet href=b.css>')</script></head>",
        ))
        .build();
    assert!(run_rule(&OptimizeTheOrderOfStylesAndScripts::new(), &input).is_empty());
}
