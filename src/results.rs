//! What the rules found.
//!
//! A [`Finding`] is one suggestion. Findings are grouped per rule in [`RuleResults`], and
//! one engine run produces a single [`Results`] value, which can be serialized and
//! formatted later by a different process.

use crate::input::InputInformation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Estimated cost a finding would remove if fixed. Each field counts one kind of
/// saving; most findings only set one or two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Savings {
    pub dns_requests_saved: i64,
    pub requests_saved: i64,
    pub response_bytes_saved: i64,
    pub request_bytes_saved: i64,
    pub critical_path_length_saved: i64,
    pub connections_saved: i64,
    pub page_reflows_saved: i64,
}

impl Savings {
    pub fn add(&mut self, other: &Savings) {
        self.dns_requests_saved += other.dns_requests_saved;
        self.requests_saved += other.requests_saved;
        self.response_bytes_saved += other.response_bytes_saved;
        self.request_bytes_saved += other.request_bytes_saved;
        self.critical_path_length_saved += other.critical_path_length_saved;
        self.connections_saved += other.connections_saved;
        self.page_reflows_saved += other.page_reflows_saved;
    }

    pub fn total(findings: &[Finding]) -> Savings {
        let mut total = Savings::default();
        for finding in findings {
            total.add(&finding.savings);
        }
        total
    }
}

/// Rule-specific payload of a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResultDetails {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    ImageDimensions {
        expected_width: u32,
        expected_height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_height: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    ResourceOrdering {
        out_of_order_external_css: Vec<String>,
        /// 1-based positions among the document's inline scripts.
        out_of_order_inline_scripts: Vec<usize>,
    },
    #[serde(rename_all = "camelCase")]
    CssImport { imported_stylesheets: Vec<String> },
    #[serde(rename_all = "camelCase")]
    AsyncResource { resource_url: String },
}

/// A rewritten version of a resource, such as a minified stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedContent {
    pub mime_type: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl OptimizedContent {
    pub fn new(mime_type: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            content: content.into(),
        }
    }
}

/// One suggestion made by a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Unique within one [`Results`]. Assigned in rule registration order, then in the
    /// order the rule emitted its findings.
    pub id: i32,
    pub rule_name: String,
    pub resource_urls: Vec<String>,
    #[serde(default)]
    pub savings: Savings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_response_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "is_no_details")]
    pub details: ResultDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_content: Option<OptimizedContent>,
}

fn is_no_details(details: &ResultDetails) -> bool {
    *details == ResultDetails::None
}

impl Finding {
    pub fn first_url(&self) -> Option<&str> {
        self.resource_urls.first().map(String::as_str)
    }
}

/// Findings of one rule plus its score and impact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResults {
    pub rule_name: String,
    /// 0 to 100. Absent when the rule does not score this input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_score: Option<i32>,
    #[serde(default)]
    pub rule_impact: f64,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub results: Vec<Finding>,
}

impl RuleResults {
    pub fn new(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            ..Default::default()
        }
    }

    /// Distinct resource URLs named by this rule's findings.
    pub fn distinct_urls(&self) -> BTreeSet<&str> {
        self.results
            .iter()
            .flat_map(|finding| finding.resource_urls.iter().map(String::as_str))
            .collect()
    }
}

/// Everything one engine run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    pub rule_results: Vec<RuleResults>,
    /// Rules that reported a failure. Their partial findings are still included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default)]
    pub input_info: InputInformation,
}

impl Results {
    pub fn rule_results(&self, rule_name: &str) -> Option<&RuleResults> {
        self.rule_results.iter().find(|rr| rr.rule_name == rule_name)
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.rule_results.iter().flat_map(|rr| rr.results.iter())
    }

    pub fn num_findings(&self) -> usize {
        self.rule_results.iter().map(|rr| rr.results.len()).sum()
    }

    pub fn finding(&self, id: i32) -> Option<&Finding> {
        self.findings().find(|finding| finding.id == id)
    }

    pub fn is_success(&self) -> bool {
        self.error_rules.is_empty()
    }
}
