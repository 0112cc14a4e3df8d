//! Turning [`Results`](crate::results::Results) into a localized, human-readable tree.
//!
//! Rules describe their findings through a small builder API:
//! [`ResultsFormatter::add_rule`] gives a [`RuleFormatter`], which adds url blocks
//! ([`UrlBlockFormatter`]), which add url results ([`UrlFormatter`]), which add
//! details. Each level takes a format string with `%(KEY)s` placeholders and the typed
//! arguments that fill them.

use crate::contract_violation;
use crate::l10n::Localizer;
use crate::results::Finding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%\(([A-Z0-9_]+)\)s").unwrap());

/// Text shown to a user. Localizable text goes through the message catalog; verbatim
/// text (hostnames, code, placeholders) never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFacingString {
    text: &'static str,
    localize: bool,
}

impl UserFacingString {
    pub const fn new(text: &'static str) -> Self {
        Self { text, localize: true }
    }

    pub const fn verbatim(text: &'static str) -> Self {
        Self { text, localize: false }
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn should_localize(&self) -> bool {
        self.localize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentValue {
    Bytes(i64),
    /// Milliseconds.
    Duration(i64),
    Int(i64),
    /// Whole percent.
    Percentage(i64),
    StringLiteral(String),
    VerbatimString(String),
    Url(String),
}

/// A named, typed value for a `%(KEY)s` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatArgument {
    key: &'static str,
    value: ArgumentValue,
}

impl FormatArgument {
    pub fn bytes(key: &'static str, bytes: i64) -> Self {
        Self {
            key,
            value: ArgumentValue::Bytes(bytes),
        }
    }

    pub fn duration(key: &'static str, millis: i64) -> Self {
        Self {
            key,
            value: ArgumentValue::Duration(millis),
        }
    }

    pub fn int(key: &'static str, value: i64) -> Self {
        Self {
            key,
            value: ArgumentValue::Int(value),
        }
    }

    /// `numerator / denominator` as a rounded whole percentage.
    pub fn percentage(key: &'static str, numerator: i64, denominator: i64) -> Self {
        let percent = if denominator > 0 {
            (numerator as f64 * 100.0 / denominator as f64).round() as i64
        } else {
            log::warn!("Percentage {key} has non-positive denominator {denominator}");
            0
        };
        Self {
            key,
            value: ArgumentValue::Percentage(percent),
        }
    }

    pub fn string(key: &'static str, value: &str) -> Self {
        Self {
            key,
            value: ArgumentValue::StringLiteral(value.to_string()),
        }
    }

    pub fn verbatim_string(key: &'static str, value: &str) -> Self {
        Self {
            key,
            value: ArgumentValue::VerbatimString(value.to_string()),
        }
    }

    pub fn url(key: &'static str, url: &str) -> Self {
        Self {
            key,
            value: ArgumentValue::Url(url.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        self.key
    }

    pub fn value(&self) -> &ArgumentValue {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedArgument {
    pub key: String,
    #[serde(flatten)]
    pub value: ArgumentValue,
    pub localized_value: String,
}

/// A format string with its arguments already localized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatString {
    pub format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<FormattedArgument>,
}

impl FormatString {
    /// The format with every placeholder replaced by its localized argument.
    pub fn render(&self) -> String {
        PLACEHOLDER_REGEX
            .replace_all(&self.format, |caps: &regex::Captures| {
                self.args
                    .iter()
                    .find(|arg| arg.key == caps[1])
                    .map(|arg| arg.localized_value.clone())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Check that `format` and `args` agree on their keys. Every placeholder needs an
/// argument and every argument needs a placeholder.
fn validate_keys(format: &str, args: &[FormatArgument]) -> bool {
    let placeholders: BTreeSet<&str> = PLACEHOLDER_REGEX
        .captures_iter(format)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let mut keys = BTreeSet::new();
    for arg in args {
        if !keys.insert(arg.key) {
            contract_violation!("Duplicate format argument {} in '{}'", arg.key, format);
            return false;
        }
    }
    if let Some(missing) = placeholders.iter().find(|p| !keys.contains(**p)) {
        contract_violation!("No argument for placeholder {} in '{}'", missing, format);
        return false;
    }
    if let Some(unused) = keys.iter().find(|k| !placeholders.contains(**k)) {
        contract_violation!("Argument {} is not used by '{}'", unused, format);
        return false;
    }
    true
}

fn localize_argument(localizer: &dyn Localizer, arg: &FormatArgument, format: &str) -> String {
    let (localized, raw) = match &arg.value {
        ArgumentValue::Bytes(bytes) => (localizer.localize_bytes(*bytes), bytes.to_string()),
        ArgumentValue::Duration(millis) => (localizer.localize_time_duration(*millis), millis.to_string()),
        ArgumentValue::Int(value) => (localizer.localize_int(*value), value.to_string()),
        ArgumentValue::Percentage(percent) => (localizer.localize_percentage(*percent), percent.to_string()),
        ArgumentValue::StringLiteral(s) | ArgumentValue::VerbatimString(s) => (Some(s.clone()), s.clone()),
        ArgumentValue::Url(url) => (localizer.localize_url(url), url.clone()),
    };
    localized.unwrap_or_else(|| {
        log::warn!("Unable to localize argument {} ({raw}) in format string '{format}'", arg.key);
        raw
    })
}

/// Localize `text` and its arguments. Failures fall back to the raw values.
pub fn build_format_string(localizer: &dyn Localizer, text: UserFacingString, args: &[FormatArgument]) -> FormatString {
    validate_keys(text.text(), args);
    let format = if text.should_localize() {
        localizer.localize_string(text.text()).unwrap_or_else(|| {
            log::warn!("Unable to localize string '{}'", text.text());
            text.text().to_string()
        })
    } else {
        text.text().to_string()
    };
    let args = args
        .iter()
        .map(|arg| FormattedArgument {
            key: arg.key.to_string(),
            value: arg.value.clone(),
            localized_value: localize_argument(localizer, arg, text.text()),
        })
        .collect();
    FormatString { format, args }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedUrlResult {
    pub result: FormatString,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FormatString>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_result_ids: Vec<i32>,
    /// File name of the optimized version of this resource, if one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedUrlBlockResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<FormatString>,
    #[serde(default)]
    pub urls: Vec<FormattedUrlResult>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRuleResults {
    pub rule_name: String,
    pub localized_rule_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_score: Option<i32>,
    #[serde(default)]
    pub rule_impact: f64,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub url_blocks: Vec<FormattedUrlBlockResults>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedResults {
    pub locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default)]
    pub rule_results: Vec<FormattedRuleResults>,
}

/// Builds a [`FormattedResults`] tree, one rule at a time.
pub struct ResultsFormatter<'a> {
    localizer: &'a dyn Localizer,
    results: FormattedResults,
}

impl<'a> ResultsFormatter<'a> {
    pub fn new(localizer: &'a dyn Localizer) -> Self {
        Self {
            localizer,
            results: FormattedResults {
                locale: localizer.locale().to_string(),
                ..Default::default()
            },
        }
    }

    pub fn add_rule(
        &mut self,
        rule_name: &str,
        header: UserFacingString,
        experimental: bool,
        score: Option<i32>,
        impact: f64,
    ) -> RuleFormatter<'_> {
        let localized_rule_name = build_format_string(self.localizer, header, &[]).format;
        self.results.rule_results.push(FormattedRuleResults {
            rule_name: rule_name.to_string(),
            localized_rule_name,
            rule_score: score,
            rule_impact: impact,
            experimental,
            url_blocks: Vec::new(),
        });
        let idx = self.results.rule_results.len() - 1;
        RuleFormatter {
            localizer: self.localizer,
            rule: &mut self.results.rule_results[idx],
        }
    }

    pub fn set_overall_score(&mut self, score: Option<i32>) {
        self.results.score = score;
    }

    /// Apply the display repair and hand out the tree.
    ///
    /// A rule left with no url blocks scores 100 with impact 0. When no rule has any
    /// url block, the overall score is 100.
    pub fn finalize(mut self) -> FormattedResults {
        let mut any_blocks = false;
        for rule in &mut self.results.rule_results {
            if rule.url_blocks.is_empty() {
                rule.rule_score = Some(100);
                rule.rule_impact = 0.0;
            } else {
                any_blocks = true;
            }
        }
        if !any_blocks {
            self.results.score = Some(100);
        }
        self.results
    }
}

pub struct RuleFormatter<'a> {
    localizer: &'a dyn Localizer,
    rule: &'a mut FormattedRuleResults,
}

impl RuleFormatter<'_> {
    pub fn add_url_block(&mut self, header: UserFacingString, args: &[FormatArgument]) -> UrlBlockFormatter<'_> {
        let header = build_format_string(self.localizer, header, args);
        self.push_block(Some(header))
    }

    pub fn add_url_block_without_header(&mut self) -> UrlBlockFormatter<'_> {
        self.push_block(None)
    }

    fn push_block(&mut self, header: Option<FormatString>) -> UrlBlockFormatter<'_> {
        self.rule.url_blocks.push(FormattedUrlBlockResults {
            header,
            urls: Vec::new(),
        });
        let idx = self.rule.url_blocks.len() - 1;
        UrlBlockFormatter {
            localizer: self.localizer,
            block: &mut self.rule.url_blocks[idx],
        }
    }
}

pub struct UrlBlockFormatter<'a> {
    localizer: &'a dyn Localizer,
    block: &'a mut FormattedUrlBlockResults,
}

impl UrlBlockFormatter<'_> {
    pub fn add_url_result(&mut self, text: UserFacingString, args: &[FormatArgument]) -> UrlFormatter<'_> {
        let result = build_format_string(self.localizer, text, args);
        self.block.urls.push(FormattedUrlResult {
            result,
            ..Default::default()
        });
        let idx = self.block.urls.len() - 1;
        UrlFormatter {
            localizer: self.localizer,
            url: &mut self.block.urls[idx],
        }
    }

    /// A url result that is just the URL.
    pub fn add_url(&mut self, url: &str) -> UrlFormatter<'_> {
        self.add_url_result(UserFacingString::verbatim("%(URL)s"), &[FormatArgument::url("URL", url)])
    }
}

pub struct UrlFormatter<'a> {
    localizer: &'a dyn Localizer,
    url: &'a mut FormattedUrlResult,
}

impl UrlFormatter<'_> {
    pub fn add_detail(&mut self, text: UserFacingString, args: &[FormatArgument]) {
        let detail = build_format_string(self.localizer, text, args);
        self.url.details.push(detail);
    }

    /// Link this entry to `finding`, including its optimized content if it has any.
    pub fn set_associated_result(&mut self, finding: &Finding) {
        self.url.associated_result_ids.push(finding.id);
        if self.url.optimized_content.is_none() {
            self.url.optimized_content = crate::optimized_content_filename(finding);
        }
    }
}
