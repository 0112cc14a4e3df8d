//! The `Rule` trait every analysis implements, and what a rule gets to work with.

use crate::formatter::{RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, InputInformation, PagespeedInput};
use crate::results::Finding;
use crate::score;
use dyn_clone::DynClone;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule failed: {0}")]
    Failed(String),
    #[error("rule {rule} exceeded its time budget after {elapsed_ms}ms")]
    BudgetExceeded { rule: String, elapsed_ms: u128 },
    #[error("missing data: {0}")]
    MissingData(String),
}

/// A frozen input plus the wall-clock budget of the rule reading it.
#[derive(Clone, Copy)]
pub struct RuleInput<'a> {
    input: &'a PagespeedInput,
    rule_name: &'static str,
    started: Instant,
    budget: Option<Duration>,
}

impl<'a> RuleInput<'a> {
    pub fn new(input: &'a PagespeedInput, rule_name: &'static str) -> Self {
        Self {
            input,
            rule_name,
            started: Instant::now(),
            budget: None,
        }
    }

    pub fn with_budget(input: &'a PagespeedInput, rule_name: &'static str, budget: Option<Duration>) -> Self {
        Self {
            budget,
            ..Self::new(input, rule_name)
        }
    }

    pub fn input(&self) -> &'a PagespeedInput {
        self.input
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Long scans call this between units of work and stop on error.
    pub fn check_budget(&self) -> Result<(), RuleError> {
        let Some(budget) = self.budget else {
            return Ok(());
        };
        let elapsed = self.elapsed();
        if elapsed > budget {
            return Err(RuleError::BudgetExceeded {
                rule: self.rule_name.to_string(),
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(())
    }
}

/// Collects the findings one rule emits. Ids are assigned later by the engine.
#[derive(Debug)]
pub struct ResultProvider {
    rule_name: &'static str,
    findings: Vec<Finding>,
}

impl ResultProvider {
    pub fn new(rule_name: &'static str) -> Self {
        Self {
            rule_name,
            findings: Vec::new(),
        }
    }

    pub fn new_result(&mut self) -> &mut Finding {
        self.findings.push(Finding {
            rule_name: self.rule_name.to_string(),
            ..Default::default()
        });
        let idx = self.findings.len() - 1;
        &mut self.findings[idx]
    }

    pub fn num_results(&self) -> usize {
        self.findings.len()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

pub trait Rule: DynClone + Send + Sync {
    /// Unique; used to group findings and in configuration.
    fn name(&self) -> &'static str;

    fn header(&self) -> UserFacingString;

    fn capability_requirements(&self) -> InputCapabilities;

    fn is_experimental(&self) -> bool {
        false
    }

    /// Add this rule's findings for `input`. A failure is recorded by the engine; the
    /// findings already emitted are kept.
    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError>;

    /// Describe `results`, already filtered and in presentation order.
    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>);

    /// 0 to 100, or -1 to leave the rule unscored.
    fn compute_score(&self, info: &InputInformation, results: &[Finding]) -> i32 {
        score::compute_score(info, results)
    }

    fn compute_result_impact(&self, info: &InputInformation, finding: &Finding) -> f64 {
        score::compute_result_impact(info, finding)
    }

    fn compute_rule_impact(&self, info: &InputInformation, results: &[Finding]) -> f64 {
        let mut impact = 0.0;
        for finding in results {
            let result_impact = self.compute_result_impact(info, finding);
            if result_impact < 0.0 {
                log::error!("Negative impact {result_impact} for a finding of {}", self.name());
                continue;
            }
            impact += result_impact;
        }
        impact
    }

    /// Stable sort, so findings that compare equal keep their emission order.
    fn sort_results_in_presentation_order(&self, results: &mut [&Finding]) {
        results.sort_by(|a, b| score::compare_results(a, b));
    }

    fn as_any(&self) -> &dyn std::any::Any;

    /// Default config section for `pagespeed init` and config validation.
    fn default_config_section(&self) -> Option<(String, toml::Value)> {
        None
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized;
}

dyn_clone::clone_trait_object!(Rule);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_provider_tags_rule_name() {
        let mut provider = ResultProvider::new("MinifyCss");
        provider.new_result().resource_urls.push("http://a.com/a.css".to_string());
        provider.new_result();
        assert_eq!(provider.num_results(), 2);
        let findings = provider.into_findings();
        assert!(findings.iter().all(|f| f.rule_name == "MinifyCss"));
        assert_eq!(findings[0].first_url(), Some("http://a.com/a.css"));
    }

    #[test]
    fn test_budget() {
        let input = PagespeedInput::new();
        let unlimited = RuleInput::new(&input, "R");
        assert!(unlimited.check_budget().is_ok());

        let exhausted = RuleInput::with_budget(&input, "R", Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        match exhausted.check_budget() {
            Err(RuleError::BudgetExceeded { rule, .. }) => assert_eq!(rule, "R"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
