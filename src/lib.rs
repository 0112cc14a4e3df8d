pub mod browsing_context;
pub mod config;
pub mod css;
pub mod dom;
pub mod engine;
pub mod exit_codes;
pub mod formatter;
pub mod html;
pub mod image_attributes;
pub mod input;
pub mod instrumentation;
pub mod l10n;
pub mod resource;
pub mod resource_collection;
pub mod resource_util;
pub mod results;
pub mod rule;
pub mod rule_config_serde;
pub mod rules;
pub mod score;
pub mod snapshot;
pub mod uri_util;

// Native-only modules
#[cfg(feature = "native")]
pub mod output;

pub use engine::{Engine, EngineError};
pub use input::{InputCapabilities, PagespeedInput};
pub use results::{Finding, Results};
pub use rule::Rule;

use crate::config::Config;
use crate::results::OptimizedContent;

/// Report a broken programmer contract: logged as an error, and a panic in debug builds.
/// Callers go on to return their documented failure value.
#[macro_export]
macro_rules! contract_violation {
    ($($arg:tt)+) => {{
        log::error!($($arg)+);
        if cfg!(debug_assertions) {
            panic!($($arg)+);
        }
    }};
}

/// Build and initialize an engine with every registered rule, filtered and tuned by
/// `config`.
pub fn engine_from_config(config: &Config) -> Result<Engine, EngineError> {
    let all = rules::all_rules(config);
    let enabled = rules::filter_rules(&all, &config.global);
    log::debug!(
        "Running {} of {} rules: {}",
        enabled.len(),
        all.len(),
        enabled.iter().map(|rule| rule.name()).collect::<Vec<_>>().join(", ")
    );

    let mut engine = Engine::new(enabled)
        .with_parallel(config.global.parallel)
        .with_rule_time_budget(config.rule_time_budget());
    engine.init()?;
    Ok(engine)
}

/// Compute content hash for optimized content file names
///
/// blake3 in every build, so artifact names do not depend on the toolchain
fn compute_content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

const CONTENT_HASH_PREFIX_LEN: usize = 16;

fn extension_for_mime_type(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "text/css" => "css",
        "text/html" => "html",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
        _ => "bin",
    }
}

/// Name under which the optimized content of `finding` is saved,
/// `<content-hash-prefix>.<ext>`. `None` if the finding carries none.
pub fn optimized_content_filename(finding: &Finding) -> Option<String> {
    let OptimizedContent { mime_type, content } = finding.optimized_content.as_ref()?;
    let hash = compute_content_hash(content);
    let prefix = &hash[..hash.len().min(CONTENT_HASH_PREFIX_LEN)];
    Some(format!("{prefix}.{}", extension_for_mime_type(mime_type)))
}
