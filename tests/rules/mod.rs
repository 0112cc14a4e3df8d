use pagespeed_lib::dom::JsonDocument;
use pagespeed_lib::formatter::{FormattedRuleResults, ResultsFormatter};
use pagespeed_lib::image_attributes::MapImageAttributesFactory;
use pagespeed_lib::input::PagespeedInput;
use pagespeed_lib::l10n::BasicLocalizer;
use pagespeed_lib::resource::Resource;
use pagespeed_lib::results::Finding;
use pagespeed_lib::rule::{ResultProvider, Rule, RuleInput};

mod avoid_css_import_test;
mod inline_previews_test;
mod minify_test;
mod minimize_redirects_test;
mod optimize_order_test;
mod prefer_async_resources_test;
mod serve_scaled_images_test;
mod specify_image_dimensions_test;

pub fn resource(url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Resource {
    let mut r = Resource::new();
    r.set_request_url(url);
    r.set_request_method("GET");
    r.set_response_status_code(200);
    if !content_type.is_empty() {
        r.add_response_header("Content-Type", content_type);
    }
    r.set_response_body(body);
    r
}

pub fn redirect(url: &str, location: &str) -> Resource {
    let mut r = Resource::new();
    r.set_request_url(url);
    r.set_request_method("GET");
    r.set_response_status_code(302);
    r.add_response_header("Location", location);
    r
}

/// Builds a [`PagespeedInput`] and freezes it.
#[derive(Default)]
pub struct InputBuilder {
    resources: Vec<Resource>,
    dom: Option<String>,
    sizes: Vec<(String, u32, u32)>,
    primary: Option<String>,
    onload: Option<i64>,
    viewport: Option<(i32, i32)>,
}

impl InputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn dom(mut self, json: &str) -> Self {
        self.dom = Some(json.to_string());
        self
    }

    pub fn image_size(mut self, url: &str, width: u32, height: u32) -> Self {
        self.sizes.push((url.to_string(), width, height));
        self
    }

    pub fn primary(mut self, url: &str) -> Self {
        self.primary = Some(url.to_string());
        self
    }

    pub fn onload(mut self, millis: i64) -> Self {
        self.onload = Some(millis);
        self
    }

    pub fn viewport(mut self, width: i32, height: i32) -> Self {
        self.viewport = Some((width, height));
        self
    }

    pub fn build(self) -> PagespeedInput {
        let mut input = PagespeedInput::new();
        for resource in self.resources {
            input.add_resource(resource).unwrap();
        }
        if let Some(url) = &self.primary {
            input.set_primary_resource_url(url).unwrap();
        }
        if let Some(millis) = self.onload {
            input.set_onload_time_millis(millis).unwrap();
        }
        if let Some((width, height)) = self.viewport {
            input.set_viewport_width_and_height(width, height).unwrap();
        }
        if !self.sizes.is_empty() {
            let mut factory = MapImageAttributesFactory::new();
            for (url, width, height) in &self.sizes {
                factory.insert(url, *width, *height);
            }
            input.acquire_image_attributes_factory(Box::new(factory)).unwrap();
        }
        if let Some(json) = &self.dom {
            let document = JsonDocument::from_json(json).unwrap();
            input.acquire_dom_document(Box::new(document)).unwrap();
        }
        input.freeze().unwrap();
        input
    }
}

/// Findings of one rule, without the engine.
pub fn run_rule(rule: &dyn Rule, input: &PagespeedInput) -> Vec<Finding> {
    let rule_input = RuleInput::new(input, rule.name());
    let mut provider = ResultProvider::new(rule.name());
    rule.append_results(&rule_input, &mut provider).unwrap();
    let mut findings = provider.into_findings();
    for (id, finding) in findings.iter_mut().enumerate() {
        finding.id = id as i32;
    }
    findings
}

/// The English rendering of `findings`, in presentation order.
pub fn format_findings(rule: &dyn Rule, findings: &[Finding]) -> FormattedRuleResults {
    let localizer = BasicLocalizer;
    let mut formatter = ResultsFormatter::new(&localizer);
    {
        let mut refs: Vec<&Finding> = findings.iter().collect();
        rule.sort_results_in_presentation_order(&mut refs);
        let mut rule_formatter = formatter.add_rule(rule.name(), rule.header(), rule.is_experimental(), None, 0.0);
        rule.format_results(&refs, &mut rule_formatter);
    }
    formatter.finalize().rule_results.remove(0)
}

/// Every rendered line of a formatted rule: block headers, url results and details.
pub fn rendered_lines(rule_results: &FormattedRuleResults) -> Vec<String> {
    let mut lines = Vec::new();
    for block in &rule_results.url_blocks {
        if let Some(header) = &block.header {
            lines.push(header.render());
        }
        for url in &block.urls {
            lines.push(url.result.render());
            for detail in &url.details {
                lines.push(format!("- {}", detail.render()));
            }
        }
    }
    lines
}
