mod minify;

mod avoid_css_import;
mod inline_previews_of_visible_images;
mod minify_css;
mod minify_html;
mod minimize_redirects;
mod optimize_the_order_of_styles_and_scripts;
mod prefer_async_resources;
mod serve_scaled_images;
mod specify_image_dimensions;

pub use avoid_css_import::AvoidCssImport;
pub use inline_previews_of_visible_images::{InlinePreviewsOfVisibleImages, InlinePreviewsOfVisibleImagesConfig};
pub use minify_css::{MinifyCss, MinifyCssConfig};
pub use minify_html::{MinifyHtml, MinifyHtmlConfig};
pub use minimize_redirects::MinimizeRedirects;
pub use optimize_the_order_of_styles_and_scripts::OptimizeTheOrderOfStylesAndScripts;
pub use prefer_async_resources::{PreferAsyncResources, PreferAsyncResourcesConfig};
pub use serve_scaled_images::ServeScaledImages;
pub use specify_image_dimensions::SpecifyImageDimensions;

use crate::config::GlobalConfig;
use crate::rule::Rule;
use std::collections::HashSet;

/// Returns all rule instances, in registration order
pub fn all_rules(config: &crate::config::Config) -> Vec<Box<dyn Rule>> {
    type RuleCtor = fn(&crate::config::Config) -> Box<dyn Rule>;
    const RULES: &[(&str, RuleCtor)] = &[
        ("AvoidCssImport", AvoidCssImport::from_config),
        ("InlinePreviewsOfVisibleImages", InlinePreviewsOfVisibleImages::from_config),
        ("MinifyCss", MinifyCss::from_config),
        ("MinifyHtml", MinifyHtml::from_config),
        ("MinimizeRedirects", MinimizeRedirects::from_config),
        ("OptimizeTheOrderOfStylesAndScripts", OptimizeTheOrderOfStylesAndScripts::from_config),
        ("PreferAsyncResources", PreferAsyncResources::from_config),
        ("ServeScaledImages", ServeScaledImages::from_config),
        ("SpecifyImageDimensions", SpecifyImageDimensions::from_config),
    ];
    RULES.iter().map(|(_, ctor)| ctor(config)).collect()
}

fn name_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|name| name.to_ascii_lowercase()).collect()
}

/// Apply `enable`/`disable` from the global config. Names match case-insensitively.
pub fn filter_rules(rules: &[Box<dyn Rule>], global_config: &GlobalConfig) -> Vec<Box<dyn Rule>> {
    let mut enabled_rules: Vec<Box<dyn Rule>> = Vec::new();
    let disabled_rules = name_set(&global_config.disable);
    let enabled_set = name_set(&global_config.enable);

    // Handle 'disable: ["all"]'
    if disabled_rules.contains("all") {
        // 'enable' overrides "disable all"
        for rule in rules {
            if enabled_set.contains(&rule.name().to_ascii_lowercase()) {
                enabled_rules.push(dyn_clone::clone_box(&**rule));
            }
        }
        return enabled_rules;
    }

    for rule in rules {
        let name = rule.name().to_ascii_lowercase();
        if disabled_rules.contains(&name) {
            continue;
        }
        if !enabled_set.is_empty() && !enabled_set.contains(&name) {
            continue;
        }
        enabled_rules.push(dyn_clone::clone_box(&**rule));
    }

    enabled_rules
}
