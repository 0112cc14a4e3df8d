use super::minify::{MinifyMessages, append_minify_results, format_minify_results, weighted_cost_score};
use crate::formatter::{RuleFormatter, UserFacingString};
use crate::html::compact_html;
use crate::input::{InputCapabilities, InputInformation};
use crate::resource::ResourceType;
use crate::results::Finding;
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::rule_config_serde::RuleConfig;
use serde::{Deserialize, Serialize};

const COST_WEIGHT: f64 = 1.5;

const MESSAGES: MinifyMessages = MinifyMessages {
    body: UserFacingString::new(
        "Minifying the following HTML resources could reduce their size by %(SIZE_IN_BYTES)s (%(PERCENTAGE)s \
         reduction).",
    ),
    child: UserFacingString::new("Minifying %(URL)s could save %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction)."),
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MinifyHtmlConfig {
    /// Attach the compacted document to each finding
    #[serde(default = "default_true")]
    pub include_optimized_content: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MinifyHtmlConfig {
    fn default() -> Self {
        Self {
            include_optimized_content: true,
        }
    }
}

impl RuleConfig for MinifyHtmlConfig {
    const RULE_NAME: &'static str = "MinifyHtml";
}

#[derive(Clone, Default)]
pub struct MinifyHtml {
    config: MinifyHtmlConfig,
}

impl MinifyHtml {
    pub fn new() -> Self {
        Self {
            config: MinifyHtmlConfig::default(),
        }
    }

    pub fn from_config_struct(config: MinifyHtmlConfig) -> Self {
        Self { config }
    }
}

impl Rule for MinifyHtml {
    fn name(&self) -> &'static str {
        "MinifyHtml"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Minify HTML")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        append_minify_results(
            rule_input,
            provider,
            "text/html",
            self.config.include_optimized_content,
            |resource| (resource.resource_type() == ResourceType::Html).then(|| compact_html(resource.response_body())),
        )
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        format_minify_results(results, formatter, &MESSAGES);
    }

    fn compute_score(&self, info: &InputInformation, results: &[Finding]) -> i32 {
        weighted_cost_score(results, info.html_response_bytes, COST_WEIGHT)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn default_config_section(&self) -> Option<(String, toml::Value)> {
        crate::rule_config_serde::default_config_section::<MinifyHtmlConfig>()
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        let rule_config = crate::rule_config_serde::load_rule_config::<MinifyHtmlConfig>(config);
        Box::new(Self::from_config_struct(rule_config))
    }
}
