//! Localization of format strings and their typed arguments.
//!
//! Every call can fail on its own. The formatter falls back to the unlocalized value and
//! logs a warning, so one missing translation never drops a whole report.

mod format_util;
mod localizers;

pub use format_util::{format_bytes, format_percentage, format_time_duration};
pub use localizers::{BasicLocalizer, CatalogLocalizer, NullLocalizer};

pub trait Localizer: Send + Sync {
    fn locale(&self) -> &str;

    /// Translation of a format string, `None` if there is none.
    fn localize_string(&self, s: &str) -> Option<String>;

    fn localize_int(&self, value: i64) -> Option<String> {
        Some(value.to_string())
    }

    fn localize_url(&self, url: &str) -> Option<String> {
        Some(url.to_string())
    }

    fn localize_bytes(&self, bytes: i64) -> Option<String>;

    fn localize_time_duration(&self, millis: i64) -> Option<String>;

    fn localize_percentage(&self, percent: i64) -> Option<String>;
}

/// The localizer for a configured locale. English and no locale both get
/// [`BasicLocalizer`]; `"raw"` gets [`NullLocalizer`].
pub fn localizer_for(locale: Option<&str>, catalog: Option<CatalogLocalizer>) -> Box<dyn Localizer> {
    if let Some(catalog) = catalog {
        return Box::new(catalog);
    }
    match locale {
        Some("raw") => Box::new(NullLocalizer),
        Some(other) if !other.is_empty() && !other.starts_with("en") => {
            log::warn!("No message catalog for locale {other}, using English");
            Box::new(BasicLocalizer)
        }
        _ => Box::new(BasicLocalizer),
    }
}
