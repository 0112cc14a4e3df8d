use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::html::{HtmlTag, TagType};
use crate::input::InputCapabilities;
use crate::resource::ResourceType;
use crate::results::{Finding, ResultDetails};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::uri_util;

/// Tracks the external-resource order of one document head and how long the chain of
/// serialized downloads is compared to the best ordering.
#[derive(Debug, Default)]
struct StyleScriptOrder {
    seen_external_script: bool,
    seen_external_css: bool,
    css_more_recent_than_script: bool,
    just_saw_inline_after_css: bool,
    last_inline_script_index: usize,
    actual_critical_path_length: i64,
    potential_critical_path_length: i64,
    out_of_order_external_css: Vec<String>,
    out_of_order_inline_scripts: Vec<usize>,
}

impl StyleScriptOrder {
    fn starts_new_round_trip(&self) -> bool {
        !self.css_more_recent_than_script || self.just_saw_inline_after_css
    }

    fn visit_external_script(&mut self) {
        if self.starts_new_round_trip() {
            self.actual_critical_path_length += 1;
        }
        if self.seen_external_script {
            self.potential_critical_path_length += 1;
        }
        if self.just_saw_inline_after_css {
            self.out_of_order_inline_scripts.push(self.last_inline_script_index);
        }
        self.seen_external_script = true;
        self.css_more_recent_than_script = false;
        self.just_saw_inline_after_css = false;
    }

    fn visit_inline_script(&mut self) {
        self.last_inline_script_index += 1;
        if self.css_more_recent_than_script {
            self.just_saw_inline_after_css = true;
        }
    }

    fn visit_external_style(&mut self, href: String) {
        if self.starts_new_round_trip() {
            self.actual_critical_path_length += 1;
        }
        if !self.seen_external_css {
            self.potential_critical_path_length += 1;
        }
        if self.just_saw_inline_after_css {
            self.out_of_order_inline_scripts.push(self.last_inline_script_index);
        }
        if self.seen_external_script {
            self.out_of_order_external_css.push(href);
        }
        self.seen_external_css = true;
        self.css_more_recent_than_script = true;
        self.just_saw_inline_after_css = false;
    }

    fn has_complaints(&self) -> bool {
        !self.out_of_order_external_css.is_empty() || !self.out_of_order_inline_scripts.is_empty()
    }
}

fn resolve(reference: &str, document_url: &str) -> String {
    uri_util::resolve_uri(reference, document_url).unwrap_or_else(|| reference.to_string())
}

fn is_stylesheet_link(tag: &HtmlTag) -> bool {
    tag.attr_value("rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
}

/// Walk the tags of `body` up to `<body>`.
fn scan_head(body: &[u8], document_url: &str, input: &RuleInput<'_>) -> Result<StyleScriptOrder, RuleError> {
    let mut order = StyleScriptOrder::default();
    let mut tag = HtmlTag::new();
    let mut pos = 0;

    while let Some(next) = tag.read_next_tag(body, pos) {
        pos = next;
        if tag.is_end_tag() {
            continue;
        }
        match tag.tag_name() {
            "body" => break,
            "script" => {
                if tag.has_attr_value("src") {
                    order.visit_external_script();
                } else {
                    order.visit_inline_script();
                }
                if tag.tag_type() == TagType::Start {
                    match tag.read_closing_foreign_tag(body, pos) {
                        Some(after) => pos = after,
                        None => break,
                    }
                }
            }
            "style" if tag.tag_type() == TagType::Start => match tag.read_closing_foreign_tag(body, pos) {
                Some(after) => pos = after,
                None => break,
            },
            "link" if is_stylesheet_link(&tag) => {
                if let Some(href) = tag.attr_value("href") {
                    order.visit_external_style(resolve(href, document_url));
                }
            }
            _ => {}
        }
        input.check_budget()?;
    }
    Ok(order)
}

#[derive(Clone, Default)]
pub struct OptimizeTheOrderOfStylesAndScripts;

impl OptimizeTheOrderOfStylesAndScripts {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for OptimizeTheOrderOfStylesAndScripts {
    fn name(&self) -> &'static str {
        "OptimizeTheOrderOfStylesAndScripts"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Optimize the order of styles and scripts")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::DOM | InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        for resource in input.resources() {
            if resource.resource_type() != ResourceType::Html {
                continue;
            }
            let order = scan_head(resource.response_body(), resource.request_url(), rule_input)?;
            if !order.has_complaints() {
                continue;
            }

            let saved = order.actual_critical_path_length - order.potential_critical_path_length;
            if saved < 0 {
                log::error!("Negative critical path length saving for {}", resource.request_url());
            }
            let finding = provider.new_result();
            finding.resource_urls.push(resource.request_url().to_string());
            finding.savings.critical_path_length_saved = saved.max(0);
            finding.details = ResultDetails::ResourceOrdering {
                out_of_order_external_css: order.out_of_order_external_css,
                out_of_order_inline_scripts: order.out_of_order_inline_scripts,
            };
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        for finding in results {
            let [url] = finding.resource_urls.as_slice() else {
                log::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    finding.resource_urls.len()
                );
                continue;
            };
            let ResultDetails::ResourceOrdering {
                out_of_order_external_css,
                out_of_order_inline_scripts,
            } = &finding.details
            else {
                continue;
            };

            if !out_of_order_inline_scripts.is_empty() {
                let mut block = formatter.add_url_block(
                    UserFacingString::new(
                        "The following inline script blocks were found in %(URL)s between an external CSS file and \
                         another resource. To allow parallel downloading, move the inline script before the external \
                         CSS file, or after the next resource.",
                    ),
                    &[FormatArgument::url("URL", url)],
                );
                for index in out_of_order_inline_scripts {
                    block.add_url_result(
                        UserFacingString::new("Inline script block #%(INDEX)s"),
                        &[FormatArgument::int("INDEX", *index as i64)],
                    );
                }
            }

            if !out_of_order_external_css.is_empty() {
                let mut block = formatter.add_url_block(
                    UserFacingString::new(
                        "The following external CSS files were included after an external JavaScript file in \
                         %(URL)s. To ensure CSS files are downloaded in parallel, always include external CSS before \
                         external JavaScript.",
                    ),
                    &[FormatArgument::url("URL", url)],
                );
                for css in out_of_order_external_css {
                    block.add_url(css);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PagespeedInput;

    fn order_of(html: &str) -> StyleScriptOrder {
        let input = PagespeedInput::new();
        let rule_input = RuleInput::new(&input, "OptimizeTheOrderOfStylesAndScripts");
        scan_head(html.as_bytes(), "http://example.com/", &rule_input).unwrap()
    }

    #[test]
    fn test_well_ordered_head() {
        let order = order_of(
            "<html><head><link rel=stylesheet href=a.css><link rel=stylesheet href=b.css>\
             <script src=a.js></script><script src=b.js></script></head><body></body></html>",
        );
        assert!(!order.has_complaints());
        assert_eq!(order.actual_critical_path_length, 2);
        assert_eq!(order.potential_critical_path_length, 2);
    }

    #[test]
    fn test_css_after_script() {
        let order = order_of(
            "<head><script src=a.js></script><link rel=stylesheet href=a.css><script>x()</script></head>",
        );
        assert_eq!(order.out_of_order_external_css, vec!["http://example.com/a.css"]);
        assert!(order.out_of_order_inline_scripts.is_empty());
    }

    #[test]
    fn test_inline_between_css_and_script() {
        let order = order_of(
            "<head><link rel=stylesheet href=a.css><script>var a = '<link rel=stylesheet href=x.css>';</script>\
             <script src=a.js></script></head>",
        );
        assert_eq!(order.out_of_order_inline_scripts, vec![1]);
        assert!(order.out_of_order_external_css.is_empty());
        assert_eq!(order.actual_critical_path_length, 2);
        assert_eq!(order.potential_critical_path_length, 1);
    }

    #[test]
    fn test_stops_at_body() {
        let order = order_of("<head><script src=a.js></script></head><body><link rel=stylesheet href=a.css></body>");
        assert!(!order.has_complaints());
    }
}
