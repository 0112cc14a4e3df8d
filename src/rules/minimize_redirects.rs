use crate::formatter::{RuleFormatter, UserFacingString};
use crate::input::InputCapabilities;
use crate::results::Finding;
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::uri_util;

/// Reports every redirect chain, except the one leading to the landing page.
#[derive(Clone, Default)]
pub struct MinimizeRedirects;

impl MinimizeRedirects {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for MinimizeRedirects {
    fn name(&self) -> &'static str {
        "MinimizeRedirects"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Minimize redirects")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::NONE
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        let collection = input.resource_collection();
        let registry = collection.redirect_registry();

        let landing_chain = input
            .primary_resource_url()
            .map(uri_util::uri_without_fragment)
            .and_then(|url| collection.index_of_url(url))
            .and_then(|idx| registry.chain_of(idx));

        for chain in registry.chains() {
            if chain.len() <= 1 {
                log::info!("Skipping redirect chain with one resource.");
                continue;
            }
            if landing_chain.is_some_and(|landing| std::ptr::eq(landing, chain.as_slice())) {
                continue;
            }
            let finding = provider.new_result();
            finding.resource_urls = chain
                .iter()
                .map(|&idx| collection.resource(idx).request_url().to_string())
                .collect();
            finding.savings.requests_saved = chain.len() as i64 - 1;
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        for finding in results {
            let mut block =
                formatter.add_url_block(UserFacingString::new("Remove the following redirect chain if possible:"), &[]);
            for url in &finding.resource_urls {
                block.add_url(url);
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
