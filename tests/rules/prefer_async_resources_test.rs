use super::{InputBuilder, format_findings, rendered_lines, resource, run_rule};
use pagespeed_lib::config::Config;
use pagespeed_lib::results::ResultDetails;
use pagespeed_lib::rule::Rule;
use pagespeed_lib::rules::PreferAsyncResources;

const PAGE: &str = "http://example.com/";
const GA: &str = "http://www.google-analytics.com/ga.js";

fn script(url: &str, start_millis: i64) -> pagespeed_lib::resource::Resource {
    let mut r = resource(url, "application/javascript", "var x;");
    r.set_request_start_time_millis(start_millis);
    r
}

fn page(elements: &str) -> InputBuilder {
    let mut document = resource(PAGE, "text/html", "<html></html>");
    document.set_request_start_time_millis(0);
    InputBuilder::new()
        .resource(document)
        .dom(&format!(r#"{{"documentUrl": "{PAGE}", "elements": [{elements}]}}"#))
        .onload(500)
}

#[test]
fn test_sync_analytics_script() {
    let input = page(r#"{"tag": "script", "attrs": {"src": "http://www.google-analytics.com/ga.js"}}"#)
        .resource(script(GA, 10))
        .build();

    let rule = PreferAsyncResources::new();
    let findings = run_rule(&rule, &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![PAGE]);
    assert_eq!(findings[0].savings.critical_path_length_saved, 1);
    assert_eq!(
        findings[0].details,
        ResultDetails::AsyncResource {
            resource_url: GA.to_string()
        }
    );

    let lines = rendered_lines(&format_findings(&rule, &findings));
    assert_eq!(
        lines,
        vec![
            "The following resources are loaded synchronously. Load them asynchronously to reduce blocking of \
             page rendering.",
            "http://example.com/ loads http://www.google-analytics.com/ga.js synchronously.",
        ]
    );
}

#[test]
fn test_async_attribute_is_fine() {
    let input = page(r#"{"tag": "script", "attrs": {"src": "http://www.google-analytics.com/ga.js", "async": ""}}"#)
        .resource(script(GA, 10))
        .build();
    assert!(run_rule(&PreferAsyncResources::new(), &input).is_empty());
}

#[test]
fn test_loaded_after_onload_is_fine() {
    let input = page(r#"{"tag": "script", "attrs": {"src": "http://www.google-analytics.com/ga.js"}}"#)
        .resource(script(GA, 900))
        .build();
    assert!(run_rule(&PreferAsyncResources::new(), &input).is_empty());
}

#[test]
fn test_first_party_script_is_fine() {
    let input = page(r#"{"tag": "script", "attrs": {"src": "app.js"}}"#)
        .resource(script("http://example.com/app.js", 10))
        .build();
    assert!(run_rule(&PreferAsyncResources::new(), &input).is_empty());
}

#[test]
fn test_script_in_iframe_reports_frame_document() {
    let frame = "http://example.com/frame.html";
    let mut frame_resource = resource(frame, "text/html", "<html></html>");
    frame_resource.set_request_start_time_millis(5);
    let input = page(&format!(
        r#"{{"tag": "iframe", "attrs": {{"src": "frame.html"}}, "contentDocument": {{
               "documentUrl": "{frame}",
               "elements": [{{"tag": "script", "attrs": {{"src": "http://platform.twitter.com/widgets.js"}}}}]
           }}}}"#
    ))
    .resource(frame_resource)
    .resource(script("http://platform.twitter.com/widgets.js", 20))
    .build();

    let findings = run_rule(&PreferAsyncResources::new(), &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_urls, vec![frame]);
}

#[test]
fn test_extra_patterns_from_config() {
    let config = Config::from_toml_str(
        r#"
[PreferAsyncResources]
extra-script-patterns = [["cdn.example.net/", "/tracker.js"]]
"#,
        "test.toml",
    )
    .unwrap();
    let rule = PreferAsyncResources::from_config(&config);

    let tracker = "http://cdn.example.net/v2/tracker.js";
    let input = page(r#"{"tag": "script", "attrs": {"src": "http://cdn.example.net/v2/tracker.js"}}"#)
        .resource(script(tracker, 10))
        .build();
    let findings = run_rule(rule.as_ref(), &input);
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].details,
        ResultDetails::AsyncResource {
            resource_url: tracker.to_string()
        }
    );
}
