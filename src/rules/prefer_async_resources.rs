use crate::dom::{DomDocument, DomElement};
use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, PagespeedInput};
use crate::results::{Finding, ResultDetails};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::rule_config_serde::RuleConfig;
use serde::{Deserialize, Serialize};

/// Third-party scripts that offer an asynchronous snippet. Each matcher is a list of
/// chunks that must appear in order, the last one ending the URL.
const SCRIPT_MATCHERS: &[&[&str]] = &[
    &["google-analytics.com/ga.js"],
    &["google-analytics.com/urchin.js"],
    &["connect.facebook.net/", "/all.js"],
    &["apis.google.com/js/plusone.js"],
    &["platform.twitter.com/widgets.js"],
    &["quantserve.com/quant.js"],
    &["b.scorecardresearch.com/beacon.js"],
    &["www.googletagservices.com/tag/js/gpt.js"],
    &["w.sharethis.com/button/buttons.js"],
    &["assets.pinterest.com/js/pinit.js"],
    &["disqus.com/", "count.js"],
    &["disqus.com/", "embed.js"],
    &["static.chartbeat.com/js/chartbeat.js"],
    &["d1ros97qkrwjf5.cloudfront.net/", "/eum/rum.js"],
    &["static.getclicky.com/js"],
    &["s3.buysellads.com/ac/bsa.js"],
    &["platform.stumbleupon.com/", "/widgets.js"],
    &["mc.yandex.ru/metrika/watch.js"],
    &["cdn.tynt.com/tc.js"],
    &["cdn.tynt.com/ti.js"],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PreferAsyncResourcesConfig {
    /// Additional matchers, in the same chunk form as the built-in ones
    #[serde(default)]
    pub extra_script_patterns: Vec<Vec<String>>,
}

impl RuleConfig for PreferAsyncResourcesConfig {
    const RULE_NAME: &'static str = "PreferAsyncResources";
}

/// True when the chunks occur in order in `url` (query string ignored) and the last one
/// ends it.
fn matches_script<S: AsRef<str>>(chunks: &[S], url: &str) -> bool {
    let stripped = match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    };
    let mut offset = 0;
    for chunk in chunks {
        let chunk = chunk.as_ref();
        if chunk.len() > stripped.len() - offset {
            return false;
        }
        match stripped[offset..].find(chunk) {
            Some(pos) => offset += pos + chunk.len(),
            None => return false,
        }
    }
    offset == stripped.len()
}

#[derive(Clone, Default)]
pub struct PreferAsyncResources {
    config: PreferAsyncResourcesConfig,
}

impl PreferAsyncResources {
    pub fn new() -> Self {
        Self {
            config: PreferAsyncResourcesConfig::default(),
        }
    }

    pub fn from_config_struct(config: PreferAsyncResourcesConfig) -> Self {
        Self { config }
    }

    fn is_blocking_script(&self, url: &str) -> bool {
        SCRIPT_MATCHERS.iter().any(|chunks| matches_script(chunks, url))
            || self
                .config
                .extra_script_patterns
                .iter()
                .filter(|chunks| !chunks.is_empty())
                .any(|chunks| matches_script(chunks, url))
    }

    fn check_document(&self, input: &PagespeedInput, document: &dyn DomDocument, provider: &mut ResultProvider) {
        let document_url = document.document_url();
        let known_document = input.has_resource_with_url(&document_url);
        let mut blocking_scripts = Vec::new();

        document.traverse(&mut |element: &dyn DomElement| {
            let tag_name = element.tag_name();
            if tag_name == "IFRAME" {
                if let Some(child) = element.content_document() {
                    self.check_document(input, child.as_ref(), provider);
                }
                return;
            }
            if !known_document || tag_name != "SCRIPT" || element.attribute("async").is_some() {
                return;
            }
            let Some(url) = element.attribute("src").and_then(|src| document.resolve_uri(&src)) else {
                return;
            };
            let Some(resource) = input.resource_with_url(&url) else {
                return;
            };
            if input.is_resource_loaded_after_onload(resource) {
                return;
            }
            if self.is_blocking_script(&url) {
                blocking_scripts.push(url);
            }
        });

        for script in blocking_scripts {
            let finding = provider.new_result();
            finding.resource_urls.push(document_url.clone());
            finding.savings.critical_path_length_saved = 1;
            finding.details = ResultDetails::AsyncResource { resource_url: script };
        }
    }
}

impl Rule for PreferAsyncResources {
    fn name(&self) -> &'static str {
        "PreferAsyncResources"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Prefer asynchronous resources")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::DOM | InputCapabilities::ONLOAD | InputCapabilities::REQUEST_START_TIMES
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        if let Some(document) = input.dom_document() {
            self.check_document(input, document, provider);
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }
        let mut block = formatter.add_url_block(
            UserFacingString::new(
                "The following resources are loaded synchronously. Load them asynchronously to reduce blocking of \
                 page rendering.",
            ),
            &[],
        );
        for finding in results {
            let [document_url] = finding.resource_urls.as_slice() else {
                log::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    finding.resource_urls.len()
                );
                continue;
            };
            let ResultDetails::AsyncResource { resource_url } = &finding.details else {
                log::error!("Async details missing for {document_url}");
                continue;
            };
            block.add_url_result(
                UserFacingString::new("%(DOCUMENT)s loads %(URL)s synchronously."),
                &[
                    FormatArgument::url("DOCUMENT", document_url),
                    FormatArgument::url("URL", resource_url),
                ],
            );
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn default_config_section(&self) -> Option<(String, toml::Value)> {
        crate::rule_config_serde::default_config_section::<PreferAsyncResourcesConfig>()
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        let rule_config = crate::rule_config_serde::load_rule_config::<PreferAsyncResourcesConfig>(config);
        Box::new(Self::from_config_struct(rule_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchers() {
        assert!(matches_script(&["google-analytics.com/ga.js"], "http://www.google-analytics.com/ga.js"));
        assert!(matches_script(
            &["google-analytics.com/ga.js"],
            "http://www.google-analytics.com/ga.js?v=2"
        ));
        assert!(!matches_script(
            &["google-analytics.com/ga.js"],
            "http://www.google-analytics.com/ga.js.map"
        ));
        assert!(matches_script(
            &["connect.facebook.net/", "/all.js"],
            "http://connect.facebook.net/en_US/all.js"
        ));
        assert!(!matches_script(&["connect.facebook.net/", "/all.js"], "http://example.com/all.js"));
        assert!(!matches_script(&["disqus.com/", "count.js"], "http://disqus.com/"));
    }

    #[test]
    fn test_extra_patterns() {
        let rule = PreferAsyncResources::from_config_struct(PreferAsyncResourcesConfig {
            extra_script_patterns: vec![vec!["cdn.example.com/".to_string(), "/tracker.js".to_string()], vec![]],
        });
        assert!(rule.is_blocking_script("http://cdn.example.com/v1/tracker.js"));
        assert!(!rule.is_blocking_script("http://example.com/app.js"));
        assert!(rule.is_blocking_script("http://platform.twitter.com/widgets.js"));
    }
}
