use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::config::Config;
use pagespeed_lib::results::OptimizedContent;
use pagespeed_lib::rule::Rule;
use pagespeed_lib::rules::{MinifyCss, MinifyCssConfig, MinifyHtml};

const MESSY_CSS: &str = "/* header */\na  {  color : red ;  }\n\n b > i,  c{x:y;}";

#[test]
fn test_minify_css() {
    let input = InputBuilder::new()
        .resource(resource("http://example.com/messy.css", "text/css", MESSY_CSS))
        .resource(resource("http://example.com/tidy.css", "text/css", "a{b:c}".repeat(100)))
        .build();

    let rule = MinifyCss::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec!["http://example.com/messy.css"]);
    assert_eq!(findings[0].original_response_bytes, Some(53));
    assert_eq!(findings[0].savings.response_bytes_saved, 31);
    assert_eq!(
        findings[0].optimized_content,
        Some(OptimizedContent::new("text/css", "a{color:red}b>i,c{x:y}"))
    );

    // 31 bytes saved at weight 3.5, against every CSS byte on the page (headers included)
    let css_bytes = input.input_information().css_response_bytes as i64;
    assert!(css_bytes >= 653);
    let expected = 100 * (css_bytes - 108) / css_bytes;
    assert_eq!(i64::from(rule.compute_score(input.input_information(), &findings)), expected);

    let formatted = format_findings(&rule, &findings);
    assert_eq!(
        rendered_lines(&formatted),
        vec![
            "Minifying the following CSS resources could reduce their size by 31B (58% reduction).",
            "Minifying http://example.com/messy.css could save 31B (58% reduction).",
        ]
    );
    let url = &formatted.url_blocks[0].urls[0];
    assert_eq!(url.associated_result_ids, vec![0]);
    let file = url.optimized_content.as_deref().unwrap();
    assert!(file.ends_with(".css"), "{file}");
}

#[test]
fn test_minify_css_without_optimized_content() {
    let input = InputBuilder::new()
        .resource(resource("http://example.com/messy.css", "text/css", MESSY_CSS))
        .build();

    let rule = MinifyCss::from_config_struct(MinifyCssConfig {
        include_optimized_content: false,
    });
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].optimized_content.is_none());

    let formatted = format_findings(&rule, &findings);
    let url = &formatted.url_blocks[0].urls[0];
    assert!(url.associated_result_ids.is_empty());
    assert!(url.optimized_content.is_none());
}

#[test]
fn test_minify_html() {
    let input = InputBuilder::new()
        .resource(resource("http://example.com/", "text/html", "<p>a   b\n\n  c</p>"))
        .resource(resource("http://example.com/messy.css", "text/css", MESSY_CSS))
        .build();

    let rule = MinifyHtml::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec!["http://example.com/"]);
    assert_eq!(findings[0].savings.response_bytes_saved, 9);
    assert_eq!(
        findings[0].optimized_content,
        Some(OptimizedContent::new("text/html", "<p>a b\nc"))
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(lines[1], "Minifying http://example.com/ could save 9B (53% reduction).");
}

#[test]
fn test_nothing_to_minify() {
    let input = InputBuilder::new()
        .resource(resource("http://example.com/tidy.css", "text/css", "a{b:c}"))
        .build();
    let rule = MinifyCss::new();
    let findings = run_rule(&rule, &input);
    assert!(findings.is_empty());
    assert_eq!(rule.compute_score(input.input_information(), &findings), 100);
}

#[test]
fn test_config_turns_off_optimized_content() {
    let config = Config::from_toml_str("[MinifyHtml]\ninclude-optimized-content = false\n", "test.toml").unwrap();
    let rule = MinifyHtml::from_config(&config);
    let input = InputBuilder::new()
        .resource(resource("http://example.com/", "text/html", "<p>a   b\n\n  c</p>"))
        .build();
    let findings = run_rule(rule.as_ref(), &input);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].optimized_content.is_none());
}
