use crate::dom::{DomDocument, DomElement, DomStatus};
use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, PagespeedInput};
use crate::results::{Finding, ResultDetails};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use crate::uri_util;
use std::collections::BTreeMap;

fn check_document(input: &PagespeedInput, document: &dyn DomDocument, provider: &mut ResultProvider) {
    document.traverse(&mut |element: &dyn DomElement| match element.tag_name().as_str() {
        "IMG" => check_image(input, document, element, provider),
        "IFRAME" | "FRAME" => {
            if let Some(child) = element.content_document() {
                check_document(input, child.as_ref(), provider);
            }
        }
        _ => {}
    });
}

fn check_image(
    input: &PagespeedInput,
    document: &dyn DomDocument,
    element: &dyn DomElement,
    provider: &mut ResultProvider,
) {
    if !input.has_resource_with_url(&document.document_url()) {
        return;
    }
    let (DomStatus::Success(width_specified), DomStatus::Success(height_specified)) =
        (element.has_width_specified(), element.has_height_specified())
    else {
        return;
    };
    if width_specified && height_specified {
        return;
    }
    let Some(src) = element.attribute("src") else {
        return;
    };
    let Some(url) = document.resolve_uri(&src) else {
        return;
    };
    if !uri_util::is_external_resource_url(&url) {
        return;
    }

    let natural_size = input
        .resource_with_url(&url)
        .map(|resource| input.final_redirect_target(resource))
        .and_then(|resource| input.new_image_attributes(resource));

    let finding = provider.new_result();
    finding.resource_urls.push(url);
    finding.savings.page_reflows_saved = 1;
    if let Some(size) = natural_size {
        finding.details = ResultDetails::ImageDimensions {
            expected_width: size.width,
            expected_height: size.height,
            actual_width: None,
            actual_height: None,
        };
    }
}

#[derive(Clone, Default)]
pub struct SpecifyImageDimensions;

impl SpecifyImageDimensions {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for SpecifyImageDimensions {
    fn name(&self) -> &'static str {
        "SpecifyImageDimensions"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Specify image dimensions")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::DOM | InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        if let Some(document) = input.dom_document() {
            check_document(input, document, provider);
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }

        // One entry per URL, however many elements use it.
        let mut uses: BTreeMap<&str, (&Finding, i64)> = BTreeMap::new();
        for finding in results {
            let [url] = finding.resource_urls.as_slice() else {
                log::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    finding.resource_urls.len()
                );
                continue;
            };
            uses.entry(url.as_str()).or_insert((finding, 0)).1 += 1;
        }

        let mut block = formatter.add_url_block(
            UserFacingString::new("The following image(s) are missing width and/or height attributes."),
            &[],
        );
        for (url, (finding, count)) in uses {
            let ResultDetails::ImageDimensions {
                expected_width,
                expected_height,
                ..
            } = finding.details
            else {
                block.add_url(url);
                continue;
            };
            let mut args = vec![
                FormatArgument::url("URL", url),
                FormatArgument::int("WIDTH", i64::from(expected_width)),
                FormatArgument::int("HEIGHT", i64::from(expected_height)),
            ];
            if count > 1 {
                args.push(FormatArgument::int("COUNT", count));
                block.add_url_result(
                    UserFacingString::new("%(URL)s (Dimensions: %(WIDTH)s x %(HEIGHT)s) (%(COUNT)s uses)"),
                    &args,
                );
            } else {
                block.add_url_result(
                    UserFacingString::new("%(URL)s (Dimensions: %(WIDTH)s x %(HEIGHT)s)"),
                    &args,
                );
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(Self::new())
    }
}
