//! Rendering of analysis reports for the terminal and for other programs.

use crate::config::OutputFormat;
use crate::formatter::{FormattedResults, FormattedRuleResults, FormattedUrlBlockResults};
use crate::results::Results;
use colored::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// One finished analysis: the raw results and their formatted rendering.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    pub formatted: &'a FormattedResults,
    pub results: &'a Results,
}

pub trait OutputFormatter {
    fn format_report(&self, report: &Report<'_>) -> String;
}

/// Plain text, one line per entry:
///
/// ```text
/// _Minify CSS_ (97/100) [0.3]
///   Minifying the following CSS resources could reduce their size by 300B (30% reduction).
///     * Minifying http://example.com/a.css could save 300B (30% reduction).
/// **[97/100]**
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter {
    /// Skip rules that have nothing to say
    pub only_with_results: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_rule(&self, out: &mut String, rule: &FormattedRuleResults) {
        let mut title = format!("_{}_", rule.localized_rule_name).bold().to_string();
        if rule.experimental {
            title.push_str(&" (experimental)".dimmed().to_string());
        }
        if let Some(score) = rule.rule_score {
            let _ = write!(title, " ({}/100)", colorize_score(score));
        }
        let _ = write!(title, " [{}]", format_impact(rule.rule_impact));
        let _ = writeln!(out, "{title}");

        for block in &rule.url_blocks {
            write_block(out, block);
        }
    }
}

fn write_block(out: &mut String, block: &FormattedUrlBlockResults) {
    if let Some(header) = &block.header {
        let _ = writeln!(out, "  {}", header.render());
    }
    for url in &block.urls {
        let mut line = format!("    * {}", url.result.render());
        if let Some(file) = &url.optimized_content {
            let _ = write!(line, " {}", format!("[optimized: {file}]").cyan());
        }
        let _ = writeln!(out, "{line}");
        for detail in &url.details {
            let _ = writeln!(out, "      - {}", detail.render());
        }
    }
}

fn colorize_score(score: i32) -> ColoredString {
    let text = score.to_string();
    match score {
        90.. => text.green(),
        50..=89 => text.yellow(),
        _ => text.red(),
    }
}

/// Impact with trailing zeros trimmed, so `2.5` and `0` rather than `2.500000`.
fn format_impact(impact: f64) -> String {
    let text = format!("{impact:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() { "0".to_string() } else { text.to_string() }
}

impl OutputFormatter for TextFormatter {
    fn format_report(&self, report: &Report<'_>) -> String {
        let mut out = String::new();
        for rule in &report.formatted.rule_results {
            if self.only_with_results && rule.url_blocks.is_empty() {
                continue;
            }
            self.write_rule(&mut out, rule);
        }
        if let Some(score) = report.formatted.score {
            let _ = writeln!(out, "{}", format!("**[{score}/100]**").bold());
        }
        if !report.results.error_rules.is_empty() {
            let _ = writeln!(
                out,
                "{} {}",
                "Rules that failed:".red().bold(),
                report.results.error_rules.join(", ")
            );
        }
        out
    }
}

/// The whole [`Report`] as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &Report<'_>) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.unwrap_or_else(|e| {
            log::error!("Failed to serialize report: {e}");
            String::from("{}")
        })
    }
}

pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter { pretty: true }),
    }
}

/// Write the optimized content of every finding into `dir`, named by
/// [`crate::optimized_content_filename`]. Returns the number of files written.
pub fn write_optimized_content(results: &Results, dir: &Path) -> io::Result<usize> {
    let mut written = 0;
    for finding in results.findings() {
        let (Some(content), Some(name)) = (&finding.optimized_content, crate::optimized_content_filename(finding))
        else {
            continue;
        };
        if written == 0 {
            fs::create_dir_all(dir)?;
        }
        let path = dir.join(&name);
        fs::write(&path, &content.content)?;
        log::debug!("Wrote optimized content for {:?} to {}", finding.first_url(), path.display());
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{FormatString, FormattedUrlResult};
    use crate::results::{Finding, OptimizedContent, RuleResults};
    use pretty_assertions::assert_eq;

    fn plain(text: &str) -> FormatString {
        FormatString {
            format: text.to_string(),
            args: Vec::new(),
        }
    }

    fn sample() -> FormattedResults {
        FormattedResults {
            locale: "en_US".to_string(),
            score: Some(93),
            rule_results: vec![
                FormattedRuleResults {
                    rule_name: "MinimizeRedirects".to_string(),
                    localized_rule_name: "Minimize redirects".to_string(),
                    rule_score: Some(86),
                    rule_impact: 2.5,
                    experimental: false,
                    url_blocks: vec![FormattedUrlBlockResults {
                        header: Some(plain("Remove the following redirect chain if possible:")),
                        urls: vec![
                            FormattedUrlResult {
                                result: plain("http://a.com/"),
                                ..Default::default()
                            },
                            FormattedUrlResult {
                                result: plain("http://b.com/"),
                                details: vec![plain("final")],
                                ..Default::default()
                            },
                        ],
                    }],
                },
                FormattedRuleResults {
                    rule_name: "AvoidCssImport".to_string(),
                    localized_rule_name: "Avoid CSS @import".to_string(),
                    rule_score: Some(100),
                    rule_impact: 0.0,
                    experimental: false,
                    url_blocks: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_text_layout() {
        colored::control::set_override(false);
        let formatted = sample();
        let results = Results::default();
        let text = TextFormatter::new().format_report(&Report {
            formatted: &formatted,
            results: &results,
        });
        let expected = "_Minimize redirects_ (86/100) [2.5]\n\
                        \x20 Remove the following redirect chain if possible:\n\
                        \x20   * http://a.com/\n\
                        \x20   * http://b.com/\n\
                        \x20     - final\n\
                        _Avoid CSS @import_ (100/100) [0]\n\
                        **[93/100]**\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_text_only_with_results() {
        colored::control::set_override(false);
        let formatted = sample();
        let results = Results::default();
        let text = TextFormatter {
            only_with_results: true,
        }
        .format_report(&Report {
            formatted: &formatted,
            results: &results,
        });
        assert!(!text.contains("Avoid CSS @import"));
    }

    #[test]
    fn test_json_report() {
        let formatted = sample();
        let results = Results::default();
        let json = JsonFormatter::default().format_report(&Report {
            formatted: &formatted,
            results: &results,
        });
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["formatted"]["score"], 93);
        assert_eq!(value["formatted"]["ruleResults"][0]["ruleName"], "MinimizeRedirects");
        assert!(value["results"]["ruleResults"].is_array());
    }

    #[test]
    fn test_format_impact() {
        assert_eq!(format_impact(0.0), "0");
        assert_eq!(format_impact(2.5), "2.5");
        assert_eq!(format_impact(1.0 / 3.0), "0.333");
    }

    #[test]
    fn test_write_optimized_content() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("optimized");
        let mut rule_results = RuleResults::new("MinifyCss");
        rule_results.results.push(Finding {
            resource_urls: vec!["http://example.com/a.css".to_string()],
            optimized_content: Some(OptimizedContent::new("text/css", "a{b:c}")),
            ..Default::default()
        });
        rule_results.results.push(Finding::default());
        let results = Results {
            rule_results: vec![rule_results],
            ..Default::default()
        };

        assert_eq!(write_optimized_content(&results, &out_dir).unwrap(), 1);
        let name = crate::optimized_content_filename(&results.rule_results[0].results[0]).unwrap();
        assert_eq!(fs::read_to_string(out_dir.join(name)).unwrap(), "a{b:c}");
    }
}
