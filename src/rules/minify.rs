//! Shared pieces of the minification rules.

use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::resource::Resource;
use crate::results::{Finding, OptimizedContent};
use crate::rule::{ResultProvider, RuleError, RuleInput};
use crate::score::UNSET_SCORE;

/// What a minification rule says about its results.
pub(crate) struct MinifyMessages {
    pub body: UserFacingString,
    pub child: UserFacingString,
}

/// Minify every resource `minify` accepts and report the ones that shrink. `minify`
/// returns `None` for resources it does not handle.
pub(crate) fn append_minify_results(
    rule_input: &RuleInput<'_>,
    provider: &mut ResultProvider,
    mime_type: &str,
    include_optimized_content: bool,
    minify: impl Fn(&Resource) -> Option<Vec<u8>>,
) -> Result<(), RuleError> {
    for resource in rule_input.input().resources() {
        let Some(minified) = minify(resource) else {
            continue;
        };
        let original = resource.response_body().len() as i64;
        let saved = original - minified.len() as i64;
        if saved <= 0 {
            continue;
        }

        let finding = provider.new_result();
        finding.resource_urls.push(resource.request_url().to_string());
        finding.original_response_bytes = Some(original as u64);
        finding.savings.response_bytes_saved = saved;
        if include_optimized_content {
            finding.optimized_content = Some(OptimizedContent::new(mime_type, minified));
        }
        rule_input.check_budget()?;
    }
    Ok(())
}

pub(crate) fn format_minify_results(results: &[&Finding], formatter: &mut RuleFormatter<'_>, messages: &MinifyMessages) {
    let total_original: i64 = results
        .iter()
        .map(|f| f.original_response_bytes.unwrap_or(0) as i64)
        .sum();
    let total_saved: i64 = results.iter().map(|f| f.savings.response_bytes_saved).sum();
    if total_saved == 0 {
        return;
    }

    let mut block = formatter.add_url_block(
        messages.body,
        &[
            FormatArgument::bytes("SIZE_IN_BYTES", total_saved),
            FormatArgument::percentage("PERCENTAGE", total_saved, total_original),
        ],
    );
    for finding in results {
        let [url] = finding.resource_urls.as_slice() else {
            log::error!(
                "Unexpected number of resource URLs. Expected 1, got {}",
                finding.resource_urls.len()
            );
            continue;
        };
        let saved = finding.savings.response_bytes_saved;
        let original = finding.original_response_bytes.unwrap_or(0) as i64;
        let mut entry = block.add_url_result(
            messages.child,
            &[
                FormatArgument::url("URL", url),
                FormatArgument::bytes("SIZE_IN_BYTES", saved),
                FormatArgument::percentage("PERCENTAGE", saved, original),
            ],
        );
        if finding.optimized_content.is_some() {
            entry.set_associated_result(finding);
        }
    }
}

/// `100 * (max_cost - weighted bytes saved) / max_cost`, floored at 0. Unset when
/// there is nothing of this type on the page.
pub(crate) fn weighted_cost_score(results: &[Finding], max_cost: u64, cost_weight: f64) -> i32 {
    if max_cost == 0 {
        log::error!("Invalid value for max possible cost: {max_cost}");
        return UNSET_SCORE;
    }
    let saved: i64 = results.iter().map(|f| f.savings.response_bytes_saved).sum();
    let cost = (saved as f64 * cost_weight) as i64;
    let max_cost = max_cost as i64;
    let score = 100 * (max_cost - cost) / max_cost;
    score.max(0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Savings;

    fn saved(bytes: i64) -> Finding {
        Finding {
            savings: Savings {
                response_bytes_saved: bytes,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_weighted_cost_score() {
        // 200 * 3.5 = 700 of 1000
        assert_eq!(weighted_cost_score(&[saved(100), saved(100)], 1000, 3.5), 30);
        assert_eq!(weighted_cost_score(&[saved(1000)], 1000, 3.5), 0);
        assert_eq!(weighted_cost_score(&[], 1000, 3.5), 100);
        assert_eq!(weighted_cost_score(&[saved(10)], 0, 1.5), UNSET_SCORE);
    }
}
