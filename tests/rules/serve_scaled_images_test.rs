use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::results::ResultDetails;
use pagespeed_lib::rules::ServeScaledImages;

const PAGE: &str = "http://example.com/";
const IMG: &str = "http://example.com/image.png";

fn page_with_images(elements: &str) -> InputBuilder {
    InputBuilder::new()
        .resource(resource(PAGE, "text/html", "<html><body></body></html>"))
        .resource(resource(IMG, "image/png", vec![0u8; 1000]))
        .dom(&format!(r#"{{"documentUrl": "{PAGE}", "elements": [{elements}]}}"#))
        .image_size(IMG, 42, 23)
}

#[test]
fn test_scaled_down_image() {
    let input = page_with_images(r#"{"tag": "img", "attrs": {"src": "image.png"}, "width": 15, "height": 5}"#).build();

    let rule = ServeScaledImages::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![IMG]);
    assert_eq!(findings[0].original_response_bytes, Some(1000));
    // 1000 * (15/42) * (5/23) truncates to 77
    assert_eq!(findings[0].savings.response_bytes_saved, 923);
    assert_eq!(
        findings[0].details,
        ResultDetails::ImageDimensions {
            expected_width: 42,
            expected_height: 23,
            actual_width: Some(15),
            actual_height: Some(5),
        }
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "The following images are resized in HTML or CSS. Serving scaled images could save 923B (92% reduction)."
                .to_string(),
            "http://example.com/image.png is resized in HTML or CSS from 42x23 to 15x5. Serving a scaled image \
             could save 923B (92% reduction)."
                .to_string(),
        ]
    );
}

#[test]
fn test_full_size_use_elsewhere_suppresses() {
    let input = page_with_images(
        r#"{"tag": "img", "attrs": {"src": "image.png"}, "width": 15, "height": 5},
           {"tag": "img", "attrs": {"src": "image.png"}, "width": 42, "height": 23}"#,
    )
    .build();
    assert!(run_rule(&ServeScaledImages::new(), &input).is_empty());
}

#[test]
fn test_image_in_iframe() {
    let input = InputBuilder::new()
        .resource(resource(PAGE, "text/html", "<iframe src=frame.html></iframe>"))
        .resource(resource("http://example.com/frame.html", "text/html", "<img src=image.png>"))
        .resource(resource(IMG, "image/png", vec![0u8; 1000]))
        .dom(&format!(
            r#"{{"documentUrl": "{PAGE}", "elements": [
                {{"tag": "iframe", "attrs": {{"src": "frame.html"}}, "contentDocument": {{
                    "documentUrl": "http://example.com/frame.html",
                    "elements": [{{"tag": "img", "attrs": {{"src": "image.png"}}, "width": 21, "height": 23}}]
                }}}}
            ]}}"#
        ))
        .image_size(IMG, 42, 23)
        .build();

    let findings = run_rule(&ServeScaledImages::new(), &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].savings.response_bytes_saved, 500);
}

#[test]
fn test_unknown_image_size_is_skipped() {
    let input = InputBuilder::new()
        .resource(resource(PAGE, "text/html", "<html><body></body></html>"))
        .resource(resource(IMG, "image/png", vec![0u8; 1000]))
        .resource(resource("http://example.com/other.png", "image/png", vec![0u8; 10]))
        .dom(&format!(
            r#"{{"documentUrl": "{PAGE}", "elements": [
                {{"tag": "img", "attrs": {{"src": "other.png"}}, "width": 1, "height": 1}}
            ]}}"#
        ))
        .image_size(IMG, 42, 23)
        .build();
    assert!(run_rule(&ServeScaledImages::new(), &input).is_empty());
}

#[test]
fn test_image_not_fetched_is_skipped() {
    let input = InputBuilder::new()
        .resource(resource(PAGE, "text/html", "<html><body></body></html>"))
        .dom(&format!(
            r#"{{"documentUrl": "{PAGE}", "elements": [
                {{"tag": "img", "attrs": {{"src": "missing.png"}}, "width": 1, "height": 1}}
            ]}}"#
        ))
        .image_size("http://example.com/missing.png", 42, 23)
        .build();
    assert!(run_rule(&ServeScaledImages::new(), &input).is_empty());
}
