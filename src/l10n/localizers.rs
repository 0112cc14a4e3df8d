use super::Localizer;
use super::format_util::{format_bytes, format_percentage, format_time_duration};
use std::collections::HashMap;

/// English, with human-readable byte counts and durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicLocalizer;

impl Localizer for BasicLocalizer {
    fn locale(&self) -> &str {
        "en"
    }

    fn localize_string(&self, s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn localize_bytes(&self, bytes: i64) -> Option<String> {
        Some(format_bytes(bytes))
    }

    fn localize_time_duration(&self, millis: i64) -> Option<String> {
        Some(format_time_duration(millis))
    }

    fn localize_percentage(&self, percent: i64) -> Option<String> {
        Some(format_percentage(percent))
    }
}

/// Leaves every value as it is. Useful when the output is post-processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLocalizer;

impl Localizer for NullLocalizer {
    fn locale(&self) -> &str {
        ""
    }

    fn localize_string(&self, s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn localize_bytes(&self, bytes: i64) -> Option<String> {
        Some(bytes.to_string())
    }

    fn localize_time_duration(&self, millis: i64) -> Option<String> {
        Some(millis.to_string())
    }

    fn localize_percentage(&self, percent: i64) -> Option<String> {
        Some(percent.to_string())
    }
}

/// Translates format strings through a message catalog keyed by the English text.
/// Numbers are formatted the English way.
#[derive(Debug, Clone, Default)]
pub struct CatalogLocalizer {
    locale: String,
    messages: HashMap<String, String>,
}

impl CatalogLocalizer {
    pub fn new(locale: &str, messages: HashMap<String, String>) -> Self {
        Self {
            locale: locale.to_string(),
            messages,
        }
    }

    /// A catalog file is a flat TOML table of `"English text" = "translation"`.
    pub fn from_toml_str(locale: &str, text: &str) -> Result<Self, toml::de::Error> {
        let messages: HashMap<String, String> = toml::from_str(text)?;
        Ok(Self::new(locale, messages))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Localizer for CatalogLocalizer {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn localize_string(&self, s: &str) -> Option<String> {
        self.messages.get(s).cloned()
    }

    fn localize_bytes(&self, bytes: i64) -> Option<String> {
        BasicLocalizer.localize_bytes(bytes)
    }

    fn localize_time_duration(&self, millis: i64) -> Option<String> {
        BasicLocalizer.localize_time_duration(millis)
    }

    fn localize_percentage(&self, percent: i64) -> Option<String> {
        BasicLocalizer.localize_percentage(percent)
    }
}
