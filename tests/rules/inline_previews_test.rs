use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::rule::{ResultProvider, Rule, RuleError, RuleInput};
use pagespeed_lib::rules::{InlinePreviewsOfVisibleImages, InlinePreviewsOfVisibleImagesConfig};
use pagespeed_lib::score::UNSET_SCORE;

const PAGE: &str = "http://example.com/";
const HERO: &str = "http://example.com/hero.jpg";

fn page() -> InputBuilder {
    let mut document = resource(PAGE, "text/html", "<html></html>");
    document.set_request_start_time_millis(0);
    let mut hero = resource(HERO, "image/jpeg", vec![0u8; 30 * 1024]);
    hero.set_request_start_time_millis(50);
    let mut icon = resource("http://example.com/icon.png", "image/png", vec![0u8; 100]);
    icon.set_request_start_time_millis(60);
    let mut footer = resource("http://example.com/footer.jpg", "image/jpeg", vec![0u8; 40 * 1024]);
    footer.set_request_start_time_millis(70);

    InputBuilder::new()
        .resource(document)
        .resource(hero)
        .resource(icon)
        .resource(footer)
        .dom(&format!(
            r#"{{"documentUrl": "{PAGE}", "elements": [
                {{"tag": "img", "attrs": {{"src": "hero.jpg"}}, "x": 0, "y": 0, "width": 800, "height": 400}},
                {{"tag": "img", "attrs": {{"src": "icon.png"}}, "x": 10, "y": 10, "width": 16, "height": 16}},
                {{"tag": "img", "attrs": {{"src": "footer.jpg"}}, "x": 0, "y": 3000, "width": 800, "height": 400}}
            ]}}"#
        ))
        .onload(1000)
}

#[test]
fn test_large_visible_image() {
    let input = page().viewport(1024, 768).build();

    let rule = InlinePreviewsOfVisibleImages::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![HERO]);

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("The following images are displayed within the initially visible region"));
    assert_eq!(lines[1], HERO);
}

#[test]
fn test_unscored_without_impact() {
    let input = page().viewport(1024, 768).build();
    let rule = InlinePreviewsOfVisibleImages::new();
    let findings = run_rule(&rule, &input);
    assert!(rule.is_experimental());
    assert_eq!(rule.compute_score(input.input_information(), &findings), UNSET_SCORE);
    assert_eq!(rule.compute_result_impact(input.input_information(), &findings[0]), 0.0);
}

#[test]
fn test_lower_threshold_includes_small_images() {
    let input = page().viewport(1024, 768).build();
    let rule = InlinePreviewsOfVisibleImages::from_config_struct(InlinePreviewsOfVisibleImagesConfig {
        min_inline_bytes: 50,
    });
    let urls: Vec<String> = run_rule(&rule, &input)
        .into_iter()
        .flat_map(|finding| finding.resource_urls)
        .collect();
    assert_eq!(urls, vec![HERO, "http://example.com/icon.png"]);
}

#[test]
fn test_tall_viewport_sees_footer() {
    let input = page().viewport(1024, 4000).build();
    let urls: Vec<String> = run_rule(&InlinePreviewsOfVisibleImages::new(), &input)
        .into_iter()
        .flat_map(|finding| finding.resource_urls)
        .collect();
    assert_eq!(urls, vec!["http://example.com/footer.jpg", HERO]);
}

#[test]
fn test_missing_viewport_is_an_error() {
    let input = page().build();
    let rule = InlinePreviewsOfVisibleImages::new();
    let rule_input = RuleInput::new(&input, rule.name());
    let mut provider = ResultProvider::new(rule.name());
    let err = rule.append_results(&rule_input, &mut provider).unwrap_err();
    assert!(matches!(err, RuleError::MissingData(_)), "{err}");
}
