use crate::css::find_external_resources_in_css_resource;
use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::input::InputCapabilities;
use crate::resource::ResourceType;
use crate::results::{Finding, ResultDetails};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use std::collections::BTreeSet;

/// Flags stylesheets that pull in other stylesheets with `@import`, which serializes
/// their download.
#[derive(Clone, Default)]
pub struct AvoidCssImport;

impl AvoidCssImport {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for AvoidCssImport {
    fn name(&self) -> &'static str {
        "AvoidCssImport"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Avoid CSS @import")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        for resource in input.resources() {
            if resource.resource_type() != ResourceType::Css {
                continue;
            }

            let imported: BTreeSet<String> = find_external_resources_in_css_resource(resource)
                .iter()
                .filter_map(|url| input.resource_with_url(url))
                .filter(|imported| imported.resource_type() == ResourceType::Css)
                .map(|imported| imported.request_url().to_string())
                .collect();
            if imported.is_empty() {
                continue;
            }

            let finding = provider.new_result();
            finding.resource_urls.push(resource.request_url().to_string());
            finding.savings.critical_path_length_saved = 1;
            finding.details = ResultDetails::CssImport {
                imported_stylesheets: imported.into_iter().collect(),
            };
            rule_input.check_budget()?;
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
            let ResultDetails::CssImport { imported_stylesheets } = &finding.details else {
                continue;
            };
            if imported_stylesheets.is_empty() {
                continue;
            }
            let mut block = formatter.add_url_block(
                UserFacingString::new("The following external stylesheets were included in %(URL)s using @import."),
                &[FormatArgument::url("URL", url)],
            );
            for imported in imported_stylesheets {
                block.add_url(imported);
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
