/// Tests for JSON schema validation of pagespeed.toml configuration files
use pagespeed_lib::config::config_json_schema;

fn toml_to_json(toml_str: &str) -> serde_json::Value {
    let toml_value: toml::Value = toml::from_str(toml_str).expect("Failed to parse TOML");
    serde_json::to_value(&toml_value).expect("Failed to convert TOML to JSON")
}

fn validate_toml_config(toml_str: &str) -> Result<(), String> {
    let schema = config_json_schema().expect("Failed to generate schema");
    let instance = toml_to_json(toml_str);

    let compiled = jsonschema::validator_for(&schema).expect("Failed to compile schema");

    compiled
        .validate(&instance)
        .map_err(|err| format!("{} at {}", err, err.instance_path()))
}

#[test]
fn test_schema_header() {
    let schema = config_json_schema().unwrap();
    assert_eq!(schema["$schema"], "https://json-schema.org/draft/2020-12/schema");
    assert_eq!(schema["title"], "Config");
    assert!(schema["properties"]["global"].is_object());
    assert!(schema["properties"]["client"].is_object());
}

#[test]
fn test_empty_config_is_valid() {
    assert!(validate_toml_config("").is_ok());
}

#[test]
fn test_full_global_config() {
    let toml = r#"
[global]
disable = ["MinifyHtml"]
enable = ["MinifyCss", "AvoidCssImport"]
output-format = "json"
locale = "de"
catalog = "pagespeed-de.toml"
parallel = false
rule-time-budget-ms = 5000
save-optimized-content = true
optimized-content-dir = "out"
"#;
    let result = validate_toml_config(toml);
    if let Err(error) = &result {
        eprintln!("Validation error: {error}");
    }
    assert!(result.is_ok());
}

#[test]
fn test_client_weights() {
    let toml = r#"
[client]
requests-weight = 2.0
response-bytes-weight = 0.01
mobile = true
"#;
    assert!(validate_toml_config(toml).is_ok());
}

#[test]
fn test_rule_sections() {
    let toml = r#"
[InlinePreviewsOfVisibleImages]
min-inline-bytes = 4096

[PreferAsyncResources]
extra-script-patterns = [["cdn.example.com/", "/tracker.js"]]

[MinifyCss]
include-optimized-content = false
"#;
    assert!(validate_toml_config(toml).is_ok());
}

#[test]
fn test_generated_default_config_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pagespeed.toml");
    let path = path.to_str().unwrap();
    pagespeed_lib::config::create_default_config(path).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert!(validate_toml_config(&content).is_ok());
}

#[test]
fn test_invalid_output_format() {
    let toml = r#"
[global]
output-format = "xml"
"#;
    assert!(validate_toml_config(toml).is_err());
}

#[test]
fn test_invalid_types() {
    assert!(validate_toml_config("[global]\nparallel = \"yes\"\n").is_err());
    assert!(validate_toml_config("[global]\ndisable = \"MinifyCss\"\n").is_err());
    assert!(validate_toml_config("[client]\nrequests-weight = \"high\"\n").is_err());
}

#[test]
fn test_top_level_value_must_be_a_table() {
    assert!(validate_toml_config("verbose = true\n").is_err());
}
