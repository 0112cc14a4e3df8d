use super::minify::{MinifyMessages, append_minify_results, format_minify_results, weighted_cost_score};
use crate::css::minify_css;
use crate::formatter::{RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, InputInformation};
use crate::resource::ResourceType;
use crate::results::Finding;
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::rule_config_serde::RuleConfig;
use serde::{Deserialize, Serialize};

const COST_WEIGHT: f64 = 3.5;

const MESSAGES: MinifyMessages = MinifyMessages {
    body: UserFacingString::new(
        "Minifying the following CSS resources could reduce their size by %(SIZE_IN_BYTES)s (%(PERCENTAGE)s \
         reduction).",
    ),
    child: UserFacingString::new("Minifying %(URL)s could save %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction)."),
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MinifyCssConfig {
    /// Attach the minified stylesheet to each finding
    #[serde(default = "default_true")]
    pub include_optimized_content: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MinifyCssConfig {
    fn default() -> Self {
        Self {
            include_optimized_content: true,
        }
    }
}

impl RuleConfig for MinifyCssConfig {
    const RULE_NAME: &'static str = "MinifyCss";
}

#[derive(Clone, Default)]
pub struct MinifyCss {
    config: MinifyCssConfig,
}

impl MinifyCss {
    pub fn new() -> Self {
        Self {
            config: MinifyCssConfig::default(),
        }
    }

    pub fn from_config_struct(config: MinifyCssConfig) -> Self {
        Self { config }
    }
}

impl Rule for MinifyCss {
    fn name(&self) -> &'static str {
        "MinifyCss"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Minify CSS")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        append_minify_results(
            rule_input,
            provider,
            "text/css",
            self.config.include_optimized_content,
            |resource| {
                if resource.resource_type() != ResourceType::Css {
                    return None;
                }
                let body = String::from_utf8_lossy(resource.response_body());
                Some(minify_css(&body).into_bytes())
            },
        )
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        format_minify_results(results, formatter, &MESSAGES);
    }

    fn compute_score(&self, info: &InputInformation, results: &[Finding]) -> i32 {
        weighted_cost_score(results, info.css_response_bytes, COST_WEIGHT)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn default_config_section(&self) -> Option<(String, toml::Value)> {
        crate::rule_config_serde::default_config_section::<MinifyCssConfig>()
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        let rule_config = crate::rule_config_serde::load_rule_config::<MinifyCssConfig>(config);
        Box::new(Self::from_config_struct(rule_config))
    }
}
