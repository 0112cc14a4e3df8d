use crate::dom::find_on_and_offscreen_image_resources;
use crate::formatter::{RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, InputInformation};
use crate::resource::ResourceType;
use crate::results::Finding;
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::rule_config_serde::RuleConfig;
use crate::score::UNSET_SCORE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct InlinePreviewsOfVisibleImagesConfig {
    /// Smallest response body, in bytes, worth a preview
    #[serde(default = "default_min_inline_bytes")]
    pub min_inline_bytes: u64,
}

fn default_min_inline_bytes() -> u64 {
    20 * 1024
}

impl Default for InlinePreviewsOfVisibleImagesConfig {
    fn default() -> Self {
        Self {
            min_inline_bytes: default_min_inline_bytes(),
        }
    }
}

impl RuleConfig for InlinePreviewsOfVisibleImagesConfig {
    const RULE_NAME: &'static str = "InlinePreviewsOfVisibleImages";
}

/// Large images drawn in the initial viewport before onload. Experimental and unscored.
#[derive(Clone, Default)]
pub struct InlinePreviewsOfVisibleImages {
    config: InlinePreviewsOfVisibleImagesConfig,
}

impl InlinePreviewsOfVisibleImages {
    pub fn new() -> Self {
        Self {
            config: InlinePreviewsOfVisibleImagesConfig::default(),
        }
    }

    pub fn from_config_struct(config: InlinePreviewsOfVisibleImagesConfig) -> Self {
        Self { config }
    }
}

impl Rule for InlinePreviewsOfVisibleImages {
    fn name(&self) -> &'static str {
        "InlinePreviewsOfVisibleImages"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Inline previews of visible images")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::DOM | InputCapabilities::ONLOAD | InputCapabilities::REQUEST_START_TIMES
    }

    fn is_experimental(&self) -> bool {
        true
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        let images = find_on_and_offscreen_image_resources(input)
            .ok_or_else(|| RuleError::MissingData("no DOM or no viewport".to_string()))?;

        for candidate in images.onscreen {
            if candidate.resource_type() != ResourceType::Image {
                continue;
            }
            if input.is_resource_loaded_after_onload(candidate) {
                continue;
            }
            if (candidate.response_body().len() as u64) < self.config.min_inline_bytes {
                continue;
            }
            provider
                .new_result()
                .resource_urls
                .push(candidate.request_url().to_string());
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }
        let mut block = formatter.add_url_block(
            UserFacingString::new(
                "The following images are displayed within the initially visible region of the screen. To speed up \
                 rendering of the initially visible region of the page, inline a preview of these images and delay \
                 loading the full images until after page load is complete.",
            ),
            &[],
        );
        for finding in results {
            let [url] = finding.resource_urls.as_slice() else {
                log::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    finding.resource_urls.len()
                );
                continue;
            };
            block.add_url(url);
        }
    }

    fn compute_score(&self, _info: &InputInformation, _results: &[Finding]) -> i32 {
        UNSET_SCORE
    }

    fn compute_result_impact(&self, _info: &InputInformation, _finding: &Finding) -> f64 {
        0.0
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn default_config_section(&self) -> Option<(String, toml::Value)> {
        crate::rule_config_serde::default_config_section::<InlinePreviewsOfVisibleImagesConfig>()
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        let rule_config = crate::rule_config_serde::load_rule_config::<InlinePreviewsOfVisibleImagesConfig>(config);
        Box::new(Self::from_config_struct(rule_config))
    }
}
