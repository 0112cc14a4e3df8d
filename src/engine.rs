//! Runs rules over a frozen input, scores what they find and formats it.

use crate::contract_violation;
use crate::formatter::{FormattedResults, ResultsFormatter};
use crate::input::{InputInformation, PagespeedInput};
use crate::resource::ResourceType;
use crate::results::{Finding, Results, RuleResults};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::score;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("engine is already initialized")]
    AlreadyInitialized,
    #[error("more than one rule is named {0}")]
    DuplicateRule(String),
    #[error("input is not frozen")]
    NotFrozen,
}

/// Decides which findings are shown.
pub trait ResultFilter: Send + Sync {
    fn is_accepted(&self, finding: &Finding) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAcceptResultFilter;

impl ResultFilter for AlwaysAcceptResultFilter {
    fn is_accepted(&self, _finding: &Finding) -> bool {
        true
    }
}

pub struct NotFilter(pub Box<dyn ResultFilter>);

impl ResultFilter for NotFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        !self.0.is_accepted(finding)
    }
}

/// Accepts what every inner filter accepts.
#[derive(Default)]
pub struct AndResultFilter {
    filters: Vec<Box<dyn ResultFilter>>,
}

impl AndResultFilter {
    pub fn new(filters: Vec<Box<dyn ResultFilter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Box<dyn ResultFilter>) {
        self.filters.push(filter);
    }
}

impl ResultFilter for AndResultFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        self.filters.iter().all(|f| f.is_accepted(finding))
    }
}

/// Rejects the findings of the named rules.
#[derive(Debug, Clone, Default)]
pub struct RuleNameFilter {
    rejected: HashSet<String>,
}

impl RuleNameFilter {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(rejected: I) -> Self {
        Self {
            rejected: rejected.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResultFilter for RuleNameFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        !self.rejected.contains(&finding.rule_name)
    }
}

/// Rejects findings whose resources are all of one of the given types.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeFilter {
    types: HashMap<String, ResourceType>,
    rejected: HashSet<ResourceType>,
}

impl ResourceTypeFilter {
    pub fn new(input: &PagespeedInput, rejected: &[ResourceType]) -> Self {
        Self {
            types: input
                .resources()
                .map(|r| (r.request_url().to_string(), r.resource_type()))
                .collect(),
            rejected: rejected.iter().copied().collect(),
        }
    }
}

impl ResultFilter for ResourceTypeFilter {
    fn is_accepted(&self, finding: &Finding) -> bool {
        if finding.resource_urls.is_empty() {
            return true;
        }
        !finding
            .resource_urls
            .iter()
            .all(|url| self.types.get(url).is_some_and(|t| self.rejected.contains(t)))
    }
}

struct RuleRun {
    findings: Vec<Finding>,
    outcome: Result<(), RuleError>,
}

pub struct Engine {
    rules: Vec<Box<dyn Rule>>,
    name_to_rule: HashMap<&'static str, usize>,
    initialized: bool,
    parallel: bool,
    rule_time_budget: Option<Duration>,
}

impl Engine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules,
            name_to_rule: HashMap::new(),
            initialized: false,
            parallel: cfg!(feature = "parallel"),
            rule_time_budget: None,
        }
    }

    /// Run rules concurrently. Without the `parallel` feature this is ignored.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_rule_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.rule_time_budget = budget;
        self
    }

    /// Index the rules by name. Must be called exactly once, before anything else.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            contract_violation!("Engine already initialized");
            return Err(EngineError::AlreadyInitialized);
        }
        let mut name_to_rule = HashMap::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            if name_to_rule.insert(rule.name(), idx).is_some() {
                contract_violation!("Found duplicate rule with name {}", rule.name());
                return Err(EngineError::DuplicateRule(rule.name().to_string()));
            }
        }
        self.name_to_rule = name_to_rule;
        self.initialized = true;
        Ok(())
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&dyn Rule> {
        self.name_to_rule.get(name).map(|&idx| self.rules[idx].as_ref())
    }

    fn check_ready(&self, input: Option<&PagespeedInput>) -> Result<(), EngineError> {
        if !self.initialized {
            contract_violation!("Engine used before init");
            return Err(EngineError::NotInitialized);
        }
        if input.is_some_and(|input| !input.is_frozen()) {
            contract_violation!("Engine given a PagespeedInput that is not frozen");
            return Err(EngineError::NotFrozen);
        }
        Ok(())
    }

    /// Run every rule whose capability requirements the input meets, in registration
    /// order. A failing rule is listed in `error_rules`; its findings are kept and the
    /// other rules still run.
    pub fn compute_results(&self, input: &PagespeedInput) -> Result<Results, EngineError> {
        self.check_ready(Some(input))?;

        let capabilities = input.estimate_capabilities();
        let runnable: Vec<&dyn Rule> = self
            .rules
            .iter()
            .map(|rule| rule.as_ref())
            .filter(|rule| {
                let required = rule.capability_requirements();
                let ok = capabilities.satisfies(required);
                if !ok {
                    log::info!(
                        "Skipping {}: needs {}, input has {}",
                        rule.name(),
                        required,
                        capabilities
                    );
                }
                ok
            })
            .collect();

        let runs = self.run_rules(&runnable, input);

        let mut results = Results {
            input_info: input.input_information().clone(),
            ..Default::default()
        };
        let mut next_id = 0;
        for (rule, run) in runnable.iter().zip(runs) {
            if let Err(e) = &run.outcome {
                log::error!("Error running rule {}: {}", rule.name(), e);
                results.error_rules.push(rule.name().to_string());
            }
            let mut rule_results = RuleResults::new(rule.name());
            rule_results.experimental = rule.is_experimental();
            for mut finding in run.findings {
                finding.id = next_id;
                next_id += 1;
                rule_results.results.push(finding);
            }
            results.rule_results.push(rule_results);
        }

        self.compute_score_and_impact(&mut results);
        Ok(results)
    }

    fn run_rules(&self, rules: &[&dyn Rule], input: &PagespeedInput) -> Vec<RuleRun> {
        let profile_rules = std::env::var("PAGESPEED_PROFILE_RULES").is_ok();

        #[cfg(feature = "parallel")]
        if self.parallel && rules.len() > 1 {
            return rules
                .par_iter()
                .map(|rule| self.run_rule(*rule, input, profile_rules))
                .collect();
        }

        rules
            .iter()
            .map(|rule| self.run_rule(*rule, input, profile_rules))
            .collect()
    }

    fn run_rule(&self, rule: &dyn Rule, input: &PagespeedInput, profile_rules: bool) -> RuleRun {
        let rule_start = Instant::now();
        let rule_input = RuleInput::with_budget(input, rule.name(), self.rule_time_budget);
        let mut provider = ResultProvider::new(rule.name());
        let mut outcome = rule.append_results(&rule_input, &mut provider);

        let rule_duration = rule_start.elapsed();
        if outcome.is_ok()
            && let Some(budget) = self.rule_time_budget
            && rule_duration > budget
        {
            outcome = Err(RuleError::BudgetExceeded {
                rule: rule.name().to_string(),
                elapsed_ms: rule_duration.as_millis(),
            });
        }
        if profile_rules {
            eprintln!("[RULE] {:36} {:?}", rule.name(), rule_duration);
        }
        if rule_duration.as_millis() > 500 {
            log::debug!("Rule {} took {:?}", rule.name(), rule_duration);
        }

        RuleRun {
            findings: provider.into_findings(),
            outcome,
        }
    }

    /// Score and weigh each rule's findings, then the page as a whole. Returns false if
    /// some results belong to a rule this engine does not know.
    fn compute_score_and_impact(&self, results: &mut Results) -> bool {
        let mut success = true;
        for rule_results in &mut results.rule_results {
            let Some(rule) = self.rule(&rule_results.rule_name) else {
                log::warn!("Unable to find rule instance with name {}", rule_results.rule_name);
                success = false;
                continue;
            };
            score_rule(rule, &results.input_info, rule_results);
        }
        results.score = score::overall_score(&results.rule_results);
        success
    }

    /// Format `results`, showing only findings accepted by `filter`. Results of rules
    /// this engine does not know are skipped with a warning.
    pub fn format_results(
        &self,
        results: &Results,
        filter: &dyn ResultFilter,
        mut formatter: ResultsFormatter<'_>,
    ) -> Result<FormattedResults, EngineError> {
        self.check_ready(None)?;

        for rule_results in &results.rule_results {
            let Some(rule) = self.rule(&rule_results.rule_name) else {
                log::warn!("Unable to find rule instance with name {}", rule_results.rule_name);
                continue;
            };

            let mut accepted: Vec<&Finding> = rule_results.results.iter().filter(|f| filter.is_accepted(f)).collect();
            rule.sort_results_in_presentation_order(&mut accepted);

            let mut rule_formatter = formatter.add_rule(
                rule.name(),
                rule.header(),
                rule.is_experimental(),
                rule_results.rule_score,
                rule_results.rule_impact,
            );
            if !accepted.is_empty() {
                rule.format_results(&accepted, &mut rule_formatter);
            }
        }

        formatter.set_overall_score(results.score);
        Ok(formatter.finalize())
    }

    /// A copy of `results` holding only the accepted findings, re-scored.
    pub fn filter_results(&self, results: &Results, filter: &dyn ResultFilter) -> Result<Results, EngineError> {
        self.check_ready(None)?;

        let mut filtered = Results {
            error_rules: results.error_rules.clone(),
            input_info: results.input_info.clone(),
            ..Default::default()
        };
        for rule_results in &results.rule_results {
            let mut copy = RuleResults::new(&rule_results.rule_name);
            copy.experimental = rule_results.experimental;
            copy.results = rule_results
                .results
                .iter()
                .filter(|f| filter.is_accepted(f))
                .cloned()
                .collect();
            filtered.rule_results.push(copy);
        }
        self.compute_score_and_impact(&mut filtered);
        Ok(filtered)
    }
}

fn score_rule(rule: &dyn Rule, info: &InputInformation, rule_results: &mut RuleResults) {
    rule_results.experimental = rule.is_experimental();

    if rule_results.results.is_empty() {
        rule_results.rule_impact = 0.0;
        rule_results.rule_score = Some(100);
        return;
    }

    let impact = rule.compute_rule_impact(info, &rule_results.results);
    rule_results.rule_impact = if impact < 0.0 {
        log::error!("Impact for {} out of bounds: {impact}", rule.name());
        0.0
    } else {
        impact
    };

    let score = score::clamp_score(rule.name(), rule.compute_score(info, &rule_results.results));
    rule_results.rule_score = (score >= 0).then_some(score);
}
