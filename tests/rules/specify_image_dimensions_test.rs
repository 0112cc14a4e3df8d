use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::results::ResultDetails;
use pagespeed_lib::rules::SpecifyImageDimensions;

const PAGE: &str = "http://example.com/";
const IMG: &str = "http://example.com/image.png";

fn page(elements: &str) -> InputBuilder {
    InputBuilder::new()
        .resource(resource(PAGE, "text/html", "<html><body></body></html>"))
        .resource(resource(IMG, "image/png", vec![0u8; 100]))
        .dom(&format!(r#"{{"documentUrl": "{PAGE}", "elements": [{elements}]}}"#))
}

#[test]
fn test_missing_dimensions() {
    let input = page(r#"{"tag": "img", "attrs": {"src": "image.png"}}"#)
        .image_size(IMG, 42, 23)
        .build();

    let rule = SpecifyImageDimensions::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![IMG]);
    assert_eq!(findings[0].savings.page_reflows_saved, 1);
    assert_eq!(
        findings[0].details,
        ResultDetails::ImageDimensions {
            expected_width: 42,
            expected_height: 23,
            actual_width: None,
            actual_height: None,
        }
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "The following image(s) are missing width and/or height attributes.",
            "http://example.com/image.png (Dimensions: 42 x 23)",
        ]
    );
}

#[test]
fn test_dimensions_from_attributes_or_style() {
    let input = page(
        r#"{"tag": "img", "attrs": {"src": "image.png", "width": "42", "height": "23"}},
           {"tag": "img", "attrs": {"src": "image.png"}, "style": {"width": "42px", "height": "23px"}},
           {"tag": "img", "attrs": {"src": "image.png", "width": "42"}, "style": {"height": "23px"}}"#,
    )
    .build();
    assert!(run_rule(&SpecifyImageDimensions::new(), &input).is_empty());
}

#[test]
fn test_only_width_specified() {
    let input = page(r#"{"tag": "img", "attrs": {"src": "image.png", "width": "42", "height": " "}}"#).build();
    let findings = run_rule(&SpecifyImageDimensions::new(), &input);
    assert_eq!(findings.len(), 1);
    // No size known, so the formatted entry is the bare URL
    assert_eq!(findings[0].details, ResultDetails::None);
}

#[test]
fn test_repeated_image_is_listed_once() {
    let input = page(
        r#"{"tag": "img", "attrs": {"src": "image.png"}},
           {"tag": "img", "attrs": {"src": "/image.png"}},
           {"tag": "img", "attrs": {"src": "image.png"}}"#,
    )
    .image_size(IMG, 42, 23)
    .build();

    let rule = SpecifyImageDimensions::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 3);

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "http://example.com/image.png (Dimensions: 42 x 23) (3 uses)");
}

#[test]
fn test_data_uri_ignored() {
    let input = page(r#"{"tag": "img", "attrs": {"src": "data:image/png;base64,AAAA"}}"#).build();
    assert!(run_rule(&SpecifyImageDimensions::new(), &input).is_empty());
}

#[test]
fn test_unknown_size_lists_bare_url() {
    let input = page(r#"{"tag": "img", "attrs": {"src": "image.png"}}"#).build();
    let rule = SpecifyImageDimensions::new();
    let findings = run_rule(&rule, &input);
    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(lines[1], IMG);
}
