//!
//! This module defines configuration structures and loading logic for pagespeed.
//! A config is one TOML file with a `[global]` section, a `[client]` section for the
//! client characteristics, and one section per rule named after the rule.

use crate::input::ClientCharacteristics;
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Config files looked for in the current directory, in order.
pub const CONFIG_FILES: &[&str] = &["pagespeed.toml", ".pagespeed.toml"];

const KNOWN_GLOBAL_KEYS: &[&str] = &[
    "enable",
    "disable",
    "output-format",
    "locale",
    "catalog",
    "parallel",
    "rule-time-budget-ms",
    "save-optimized-content",
    "optimized-content-dir",
];

/// Normalizes option keys to lowercase kebab-case.
pub fn normalize_key(key: &str) -> String {
    key.replace('_', "-").to_ascii_lowercase()
}

/// How analysis results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

/// Represents a rule-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct RuleConfig {
    /// Configuration values for the rule
    #[serde(flatten)]
    #[schemars(schema_with = "arbitrary_value_schema")]
    pub values: BTreeMap<String, toml::Value>,
}

/// Generate a JSON schema for arbitrary configuration values
fn arbitrary_value_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "additionalProperties": true
    })
}

/// Represents the complete configuration loaded from pagespeed.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[schemars(
    description = "pagespeed configuration. Rules can be configured individually using sections named after the rule, e.g. [InlinePreviewsOfVisibleImages]."
)]
pub struct Config {
    /// Global configuration options
    #[serde(default)]
    pub global: GlobalConfig,

    /// How much the client cares about each kind of saving
    #[serde(default)]
    pub client: ClientCharacteristics,

    /// Rule-specific configurations, keyed by rule name.
    ///
    /// Examples:
    /// - InlinePreviewsOfVisibleImages: min-inline-bytes
    /// - PreferAsyncResources: extra-script-patterns
    /// - MinifyCss, MinifyHtml: include-optimized-content
    #[serde(flatten)]
    pub rules: BTreeMap<String, RuleConfig>,

    /// Keys in `[global]` that no option matches. Filled in by [`Config::from_toml_str`].
    #[serde(skip)]
    #[schemars(skip)]
    pub unknown_global_keys: Vec<String>,
}

impl Config {
    /// Parse a config from TOML text. `source` names the file in error messages.
    pub fn from_toml_str(content: &str, source: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("{source}: {e}")))?;

        let raw: toml::Value =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("{source}: {e}")))?;
        if let Some(toml::Value::Table(global)) = raw.get("global") {
            config.unknown_global_keys = global
                .keys()
                .filter(|key| !KNOWN_GLOBAL_KEYS.contains(&normalize_key(key).as_str()))
                .cloned()
                .collect();
        }
        Ok(config)
    }

    /// Load `config_path`, or the first of [`CONFIG_FILES`] in the current directory, or
    /// the defaults when there is none.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_file(path);
        }
        for candidate in CONFIG_FILES {
            if Path::new(candidate).is_file() {
                log::debug!("Using config file {candidate}");
                return Self::load_file(candidate);
            }
        }
        Ok(Config::default())
    }

    fn load_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            source,
            path: path.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    /// The section for `rule_name`, matched case-insensitively.
    pub fn rule_config(&self, rule_name: &str) -> Option<&RuleConfig> {
        self.rules.get(rule_name).or_else(|| {
            self.rules
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(rule_name))
                .map(|(_, rc)| rc)
        })
    }

    pub fn rule_time_budget(&self) -> Option<std::time::Duration> {
        self.global.rule_time_budget_ms.map(std::time::Duration::from_millis)
    }
}

/// Global configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// Enabled rules. If non-empty, only these rules run.
    #[serde(default)]
    pub enable: Vec<String>,

    /// Disabled rules. "all" disables every rule not listed in `enable`.
    #[serde(default)]
    pub disable: Vec<String>,

    /// Output format for results ("text" or "json")
    #[serde(skip_serializing_if = "Option::is_none", alias = "output_format")]
    pub output_format: Option<OutputFormat>,

    /// Locale of the report. "raw" prints unformatted numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Message catalog used to translate the report into `locale`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Run rules in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Wall-clock budget per rule, in milliseconds. A rule that runs longer fails.
    #[serde(skip_serializing_if = "Option::is_none", alias = "rule_time_budget_ms")]
    pub rule_time_budget_ms: Option<u64>,

    /// Write the optimized versions of resources that rules produce
    #[serde(default, alias = "save_optimized_content")]
    pub save_optimized_content: bool,

    /// Where optimized content is written (default: ./optimized)
    #[serde(skip_serializing_if = "Option::is_none", alias = "optimized_content_dir")]
    pub optimized_content_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enable: Vec::new(),
            disable: Vec::new(),
            output_format: None,
            locale: None,
            catalog: None,
            parallel: true,
            rule_time_budget_ms: None,
            save_optimized_content: false,
            optimized_content_dir: None,
        }
    }
}

/// JSON schema of the config file.
///
/// Rule sections sit at the root next to `[global]` and `[client]`, so the root also
/// accepts any further table.
pub fn config_json_schema() -> Result<serde_json::Value, serde_json::Error> {
    let schema = schemars::schema_for!(Config);
    let mut schema_value = serde_json::to_value(&schema)?;
    if let Some(schema_obj) = schema_value.as_object_mut() {
        schema_obj.insert(
            "additionalProperties".to_string(),
            serde_json::json!({
                "type": "object",
                "additionalProperties": true
            }),
        );
    }
    Ok(schema_value)
}

/// Create a default configuration file at the specified path
pub fn create_default_config(path: &str) -> Result<(), ConfigError> {
    if Path::new(path).exists() {
        return Err(ConfigError::FileExists { path: path.to_string() });
    }

    let default_config = r#"# pagespeed configuration file

# Global configuration options
[global]
# List of rules to disable (uncomment and modify as needed)
# disable = ["MinifyHtml", "InlinePreviewsOfVisibleImages"]

# List of rules to enable exclusively (if provided, only these rules will run)
# enable = ["MinifyCss", "AvoidCssImport"]

# Output format: text or json
# output-format = "text"

# Locale of the report, and a message catalog to translate it with
# locale = "de"
# catalog = "pagespeed-de.toml"

# Run rules in parallel (default: true)
parallel = true

# Fail any rule that runs longer than this many milliseconds
# rule-time-budget-ms = 5000

# Write minified resources next to the report
save-optimized-content = false
# optimized-content-dir = "optimized"

# How much each kind of saving matters to the client
[client]
# dns-requests-weight = 1.0
# requests-weight = 1.0
# response-bytes-weight = 0.001
# request-bytes-weight = 0.001
# critical-path-length-weight = 1.0
# connections-weight = 1.0
# page-reflows-weight = 1.0
# mobile = false

# Rule-specific configurations (uncomment and modify as needed)

# [InlinePreviewsOfVisibleImages]
# min-inline-bytes = 20480

# [PreferAsyncResources]
# extra-script-patterns = [["cdn.example.com/", "/tracker.js"]]

# [MinifyCss]
# include-optimized-content = true
"#;

    fs::write(path, default_config).map_err(|err| ConfigError::IoError {
        source: err,
        path: path.to_string(),
    })
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file at {path}: {source}")]
    IoError { source: io::Error, path: String },

    /// Failed to parse the configuration content
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Configuration file already exists
    #[error("Configuration file already exists at {path}")]
    FileExists { path: String },
}

/// Get a rule-specific configuration value, accepting kebab-case and snake_case keys.
pub fn get_rule_config_value<T: serde::de::DeserializeOwned>(config: &Config, rule_name: &str, key: &str) -> Option<T> {
    let rule_config = config.rule_config(rule_name)?;

    let key_variants = [
        key.to_string(),
        normalize_key(key),
        key.replace('-', "_"),
        key.replace('_', "-"),
    ];

    for variant in &key_variants {
        if let Some(value) = rule_config.values.get(variant)
            && let Ok(result) = T::deserialize(value.clone())
        {
            return Some(result);
        }
    }

    None
}

/// Registry of all known rules and their config schemas
pub struct RuleRegistry {
    /// Map of rule name to its config keys and their default TOML values
    pub rule_schemas: BTreeMap<String, toml::map::Map<String, toml::Value>>,
}

impl RuleRegistry {
    /// Build a registry from a list of rules
    pub fn from_rules(rules: &[Box<dyn Rule>]) -> Self {
        let mut rule_schemas = BTreeMap::new();
        for rule in rules {
            if let Some((name, toml::Value::Table(table))) = rule.default_config_section() {
                rule_schemas.insert(name, table);
            } else {
                rule_schemas.insert(rule.name().to_string(), toml::map::Map::new());
            }
        }
        RuleRegistry { rule_schemas }
    }

    /// Get all known rule names
    pub fn rule_names(&self) -> BTreeSet<String> {
        self.rule_schemas.keys().cloned().collect()
    }

    /// Canonical spelling of `rule`, matched case-insensitively
    pub fn canonical_name(&self, rule: &str) -> Option<&str> {
        self.rule_schemas
            .keys()
            .find(|name| name.eq_ignore_ascii_case(rule))
            .map(String::as_str)
    }

    /// Get the valid configuration keys for a rule, in both kebab-case and snake_case
    pub fn config_keys_for(&self, rule: &str) -> Option<BTreeSet<String>> {
        self.rule_schemas.get(rule).map(|schema| {
            let mut all_keys = BTreeSet::new();
            for key in schema.keys() {
                all_keys.insert(key.clone());
                all_keys.insert(key.replace('-', "_"));
                all_keys.insert(normalize_key(key));
            }
            all_keys
        })
    }

    /// Get the expected value type for a rule's configuration key, trying variants
    pub fn expected_value_for(&self, rule: &str, key: &str) -> Option<&toml::Value> {
        let schema = self.rule_schemas.get(rule)?;
        schema
            .get(key)
            .or_else(|| schema.get(&normalize_key(key)))
            .or_else(|| schema.get(&key.replace('-', "_")))
    }
}

/// Represents a config validation warning or error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationWarning {
    pub message: String,
    pub rule: Option<String>,
    pub key: Option<String>,
}

/// Validate a loaded config against the rule registry
pub fn validate_config(config: &Config, registry: &RuleRegistry) -> Vec<ConfigValidationWarning> {
    let mut warnings = Vec::new();
    let known_rules: Vec<String> = registry.rule_names().into_iter().collect();

    // 1. Unknown rule sections
    for rule in config.rules.keys() {
        if registry.canonical_name(rule).is_none() {
            let message = match suggest_similar_key(rule, &known_rules) {
                Some(suggestion) => format!("Unknown rule in config: {rule} (did you mean: {suggestion}?)"),
                None => format!("Unknown rule in config: {rule}"),
            };
            warnings.push(ConfigValidationWarning {
                message,
                rule: Some(rule.clone()),
                key: None,
            });
        }
    }

    // 2. Unknown options and type mismatches
    for (rule, rule_cfg) in &config.rules {
        let Some(canonical) = registry.canonical_name(rule) else {
            continue;
        };
        let Some(valid_keys) = registry.config_keys_for(canonical) else {
            continue;
        };
        for (key, actual) in &rule_cfg.values {
            if !valid_keys.contains(key) {
                let valid_keys_vec: Vec<String> = valid_keys.iter().cloned().collect();
                let message = match suggest_similar_key(key, &valid_keys_vec) {
                    Some(suggestion) => format!("Unknown option for rule {rule}: {key} (did you mean: {suggestion}?)"),
                    None => format!("Unknown option for rule {rule}: {key}"),
                };
                warnings.push(ConfigValidationWarning {
                    message,
                    rule: Some(rule.clone()),
                    key: Some(key.clone()),
                });
            } else if let Some(expected) = registry.expected_value_for(canonical, key)
                && !toml_value_type_matches(expected, actual)
            {
                warnings.push(ConfigValidationWarning {
                    message: format!(
                        "Type mismatch for {}.{}: expected {}, got {}",
                        rule,
                        key,
                        toml_type_name(expected),
                        toml_type_name(actual)
                    ),
                    rule: Some(rule.clone()),
                    key: Some(key.clone()),
                });
            }
        }
    }

    // 3. Unknown rule names in enable/disable
    for name in config.global.enable.iter().chain(&config.global.disable) {
        if name != "all" && registry.canonical_name(name).is_none() {
            warnings.push(ConfigValidationWarning {
                message: format!("Unknown rule in enable/disable: {name}"),
                rule: Some(name.clone()),
                key: None,
            });
        }
    }

    // 4. Unknown global options
    let known_global_keys: Vec<String> = KNOWN_GLOBAL_KEYS.iter().map(|k| k.to_string()).collect();
    for key in &config.unknown_global_keys {
        let message = match suggest_similar_key(key, &known_global_keys) {
            Some(suggestion) => format!("Unknown global option: {key} (did you mean: {suggestion}?)"),
            None => format!("Unknown global option: {key}"),
        };
        warnings.push(ConfigValidationWarning {
            message,
            rule: None,
            key: Some(key.clone()),
        });
    }

    warnings
}

fn toml_type_name(val: &toml::Value) -> &'static str {
    match val {
        toml::Value::String(_) => "string",
        toml::Value::Integer(_) => "integer",
        toml::Value::Float(_) => "float",
        toml::Value::Boolean(_) => "boolean",
        toml::Value::Array(_) => "array",
        toml::Value::Table(_) => "table",
        toml::Value::Datetime(_) => "datetime",
    }
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let (len1, len2) = (s1_chars.len(), s2_chars.len());

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut prev_row: Vec<usize> = (0..=len2).collect();
    let mut curr_row = vec![0; len2 + 1];

    for i in 1..=len1 {
        curr_row[0] = i;
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            curr_row[j] = (prev_row[j] + 1).min(curr_row[j - 1] + 1).min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[len2]
}

/// Closest valid key within a small edit distance
fn suggest_similar_key(unknown: &str, valid_keys: &[String]) -> Option<String> {
    let unknown_lower = unknown.to_lowercase();
    let max_distance = 2.max(unknown.len() / 3);

    let mut best_match: Option<(String, usize)> = None;
    for valid in valid_keys {
        let distance = levenshtein_distance(&unknown_lower, &valid.to_lowercase());
        if distance <= max_distance && best_match.as_ref().is_none_or(|(_, best)| distance < *best) {
            best_match = Some((valid.clone(), distance));
        }
    }

    best_match.map(|(key, _)| key)
}

fn toml_value_type_matches(expected: &toml::Value, actual: &toml::Value) -> bool {
    use toml::Value::*;
    matches!(
        (expected, actual),
        (String(_), String(_))
            | (Integer(_), Integer(_))
            | (Float(_), Float(_))
            | (Boolean(_), Boolean(_))
            | (Array(_), Array(_))
            | (Table(_), Table(_))
            | (Datetime(_), Datetime(_))
            | (Float(_), Integer(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml_str(
            r#"
[global]
disable = ["MinifyHtml"]
output-format = "json"
rule-time-budget-ms = 250

[client]
requests-weight = 2.5
mobile = true

[InlinePreviewsOfVisibleImages]
min-inline-bytes = 1024
"#,
            "test",
        )
        .unwrap();
        assert_eq!(config.global.disable, vec!["MinifyHtml"]);
        assert_eq!(config.global.output_format, Some(OutputFormat::Json));
        assert_eq!(config.rule_time_budget(), Some(std::time::Duration::from_millis(250)));
        assert!(config.global.parallel);
        assert_eq!(config.client.requests_weight, 2.5);
        assert_eq!(config.client.response_bytes_weight, 0.001);
        assert!(config.client.mobile);
        assert_eq!(
            get_rule_config_value::<i64>(&config, "inlinepreviewsofvisibleimages", "min_inline_bytes"),
            Some(1024)
        );
        assert!(config.unknown_global_keys.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[global\n", "broken.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(msg) if msg.starts_with("broken.toml")));
    }

    #[test]
    fn test_load_explicit_path_and_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[global]\nenable = [\"MinifyCss\"]\n").unwrap();
        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.global.enable, vec!["MinifyCss"]);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(missing.to_str().unwrap())),
            Err(ConfigError::IoError { .. })
        ));
    }

    #[test]
    fn test_create_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pagespeed.toml");
        let path = path.to_str().unwrap();
        create_default_config(path).unwrap();
        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.global, GlobalConfig::default());
        assert!(matches!(create_default_config(path), Err(ConfigError::FileExists { .. })));
    }

    #[test]
    fn test_suggest_similar_key() {
        let keys = vec!["min-inline-bytes".to_string(), "extra-script-patterns".to_string()];
        assert_eq!(suggest_similar_key("min-inlin-bytes", &keys), Some("min-inline-bytes".to_string()));
        assert_eq!(suggest_similar_key("nothing-like-it", &keys), None);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_unknown_global_keys_are_collected() {
        let config = Config::from_toml_str("[global]\nparalel = false\nlocale = \"en\"\n", "test").unwrap();
        assert_eq!(config.unknown_global_keys, vec!["paralel"]);
    }
}
