//! Default scoring, impact and presentation order of findings.

use crate::input::InputInformation;
use crate::results::{Finding, RuleResults, Savings};
use std::cmp::Ordering;

/// A score the rule declined to give.
pub const UNSET_SCORE: i32 = -1;

const REQUEST_BYTES_WEIGHT: f64 = 3.0;
const RESPONSE_BYTES_WEIGHT: f64 = 3.0;
const DNS_WEIGHT: f64 = 7.5;
const REQUESTS_WEIGHT: f64 = 5.0;
const REFLOW_COST: f64 = 0.05;
const CRITICAL_PATH_COST: f64 = 0.15;
const CONNECTIONS_WEIGHT: f64 = 0.5;

/// `saved * weight / total`, or `None` when there is something saved but no total to
/// compare it against.
fn normalized(saved: i64, total: f64, weight: f64) -> Option<f64> {
    if saved == 0 {
        return Some(0.0);
    }
    if total <= 0.0 {
        return None;
    }
    Some(weight * saved as f64 / total)
}

/// Score in [0, 100] from the summed savings, normalised against the page totals.
/// [`UNSET_SCORE`] when a total that is needed is zero.
pub fn compute_score(info: &InputInformation, results: &[Finding]) -> i32 {
    let saved = Savings::total(results);
    let parts = [
        normalized(
            saved.request_bytes_saved,
            info.total_request_bytes as f64,
            REQUEST_BYTES_WEIGHT,
        ),
        normalized(
            saved.response_bytes_saved,
            info.total_response_bytes() as f64,
            RESPONSE_BYTES_WEIGHT,
        ),
        normalized(saved.dns_requests_saved, info.number_hosts as f64, DNS_WEIGHT),
        normalized(saved.requests_saved, info.number_resources as f64, REQUESTS_WEIGHT),
        normalized(
            saved.connections_saved,
            info.number_resources as f64,
            CONNECTIONS_WEIGHT,
        ),
    ];

    let mut normalized_savings = REFLOW_COST * saved.page_reflows_saved as f64
        + CRITICAL_PATH_COST * saved.critical_path_length_saved as f64;
    for part in parts {
        match part {
            Some(value) => normalized_savings += value,
            None => return UNSET_SCORE,
        }
    }

    ((100.0 * (1.0 - normalized_savings)) as i32).max(0)
}

/// Weighted sum of one finding's savings, using the client's weights.
pub fn compute_result_impact(info: &InputInformation, finding: &Finding) -> f64 {
    let client = &info.client_characteristics;
    let s = &finding.savings;
    let impact = client.dns_requests_weight * s.dns_requests_saved as f64
        + client.requests_weight * s.requests_saved as f64
        + client.response_bytes_weight * s.response_bytes_saved as f64
        + client.request_bytes_weight * s.request_bytes_saved as f64
        + client.critical_path_length_weight * s.critical_path_length_saved as f64
        + client.connections_weight * s.connections_saved as f64
        + client.page_reflows_weight * s.page_reflows_saved as f64;
    if impact == 0.0 {
        log::warn!(
            "Finding for {} of rule {} has zero impact",
            finding.first_url().unwrap_or("<no url>"),
            finding.rule_name
        );
    }
    impact
}

/// Clamp a rule score into [-1, 100]. Out-of-range values are logged.
pub fn clamp_score(rule_name: &str, score: i32) -> i32 {
    if score > 100 {
        log::error!("Score for {rule_name} out of bounds: {score}");
        100
    } else if score < UNSET_SCORE {
        log::error!("Score for {rule_name} out of bounds: {score}");
        UNSET_SCORE
    } else {
        score
    }
}

/// Resource-weighted mean of rule scores. Each scored, non-experimental rule counts
/// with weight `1 + distinct URLs named by its findings`. `None` if no rule scored.
pub fn overall_score(rule_results: &[RuleResults]) -> Option<i32> {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for rr in rule_results.iter().filter(|rr| !rr.experimental) {
        let Some(score) = rr.rule_score else {
            continue;
        };
        let weight = 1.0 + rr.distinct_urls().len() as f64;
        weighted += weight * f64::from(score);
        total_weight += weight;
    }
    if total_weight == 0.0 {
        return None;
    }
    Some((weighted / total_weight).round() as i32)
}

/// Presentation order: biggest savings first, then findings naming more URLs, then by
/// first URL.
pub fn compare_results(a: &Finding, b: &Finding) -> Ordering {
    let (sa, sb) = (&a.savings, &b.savings);
    sb.dns_requests_saved
        .cmp(&sa.dns_requests_saved)
        .then(sb.requests_saved.cmp(&sa.requests_saved))
        .then(sb.request_bytes_saved.cmp(&sa.request_bytes_saved))
        .then(sb.response_bytes_saved.cmp(&sa.response_bytes_saved))
        .then(sb.connections_saved.cmp(&sa.connections_saved))
        .then(sb.page_reflows_saved.cmp(&sa.page_reflows_saved))
        .then(b.resource_urls.len().cmp(&a.resource_urls.len()))
        .then(a.first_url().cmp(&b.first_url()))
}
