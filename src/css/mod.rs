//! Just enough CSS handling for the rules: tokenizing, comment removal, reference
//! discovery and minification.

pub mod external_resource_finder;
pub mod minifier;
pub mod tokenizer;

pub use external_resource_finder::{find_external_resources_in_css_block, find_external_resources_in_css_resource};
pub use minifier::minify_css;
pub use tokenizer::{CssToken, CssTokenType, CssTokenizer, remove_css_comments};
