//! Serde glue between rule config structs and the `[RuleName]` sections of a config.

use crate::config::Config;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A rule's typed configuration, read from the section named `RULE_NAME`.
pub trait RuleConfig: Serialize + DeserializeOwned + Default + Clone {
    const RULE_NAME: &'static str;
}

/// Deserialize the rule's section. A missing section gives the defaults, and so does an
/// invalid one, with a warning.
pub fn load_rule_config<T: RuleConfig>(config: &Config) -> T {
    let Some(rule_config) = config.rule_config(T::RULE_NAME) else {
        return T::default();
    };

    let mut table = toml::map::Map::new();
    for (key, value) in &rule_config.values {
        table.insert(crate::config::normalize_key(key), value.clone());
    }

    match toml::Value::Table(table).try_into::<T>() {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Invalid configuration for rule {}: {e}. Using defaults.", T::RULE_NAME);
            T::default()
        }
    }
}

/// Convert a JSON value to TOML. `None` for JSON null, which TOML cannot represent.
pub fn json_to_toml_value(json_val: &serde_json::Value) -> Option<toml::Value> {
    match json_val {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(toml::Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(toml::Value::Integer(i))
            } else {
                n.as_f64().map(toml::Value::Float)
            }
        }
        serde_json::Value::String(s) => Some(toml::Value::String(s.clone())),
        serde_json::Value::Array(arr) => {
            let toml_arr: Vec<_> = arr.iter().filter_map(json_to_toml_value).collect();
            Some(toml::Value::Array(toml_arr))
        }
        serde_json::Value::Object(obj) => {
            let mut table = toml::map::Map::new();
            for (k, v) in obj {
                if let Some(toml_v) = json_to_toml_value(v) {
                    table.insert(k.clone(), toml_v);
                }
            }
            Some(toml::Value::Table(table))
        }
    }
}

/// The defaults of `T` as a `[RULE_NAME]` section, or `None` if `T` has no options.
pub fn default_config_section<T: RuleConfig>() -> Option<(String, toml::Value)> {
    let json_value = serde_json::to_value(T::default()).ok()?;
    match json_to_toml_value(&json_value)? {
        toml::Value::Table(table) if !table.is_empty() => Some((T::RULE_NAME.to_string(), toml::Value::Table(table))),
        _ => None,
    }
}
