use crate::dom::{DomDocument, DomElement, DomStatus};
use crate::formatter::{FormatArgument, RuleFormatter, UserFacingString};
use crate::input::{InputCapabilities, PagespeedInput};
use crate::results::{Finding, ResultDetails};
use crate::rule::{ResultProvider, Rule, RuleError, RuleInput};
use std::collections::BTreeMap;

/// Natural and on-page size of one image URL, merged over every element that shows it.
#[derive(Debug, Clone, PartialEq)]
struct ImageData {
    natural_width: u32,
    natural_height: u32,
    client_width: u32,
    client_height: u32,
    size_mismatch: bool,
}

impl ImageData {
    fn new(natural_width: u32, natural_height: u32, client_width: u32, client_height: u32) -> Self {
        Self {
            natural_width,
            natural_height,
            client_width,
            client_height,
            size_mismatch: false,
        }
    }

    /// Merge another occurrence. The larger client size wins, so an image only counts
    /// as scaled down if it is scaled down everywhere.
    fn update(&mut self, url: &str, natural_width: u32, natural_height: u32, client_width: u32, client_height: u32) {
        if natural_width != self.natural_width || natural_height != self.natural_height {
            log::error!(
                "Mismatched width/height parameters while processing {url}. Got {natural_width}x{natural_height}, \
                 expected {}x{}.",
                self.natural_width,
                self.natural_height
            );
            self.size_mismatch = true;
            return;
        }
        self.client_width = self.client_width.max(client_width).min(natural_width);
        self.client_height = self.client_height.max(client_height).min(natural_height);
    }

    fn is_scalable(&self) -> bool {
        !self.size_mismatch && (self.client_width < self.natural_width || self.client_height < self.natural_height)
    }

    fn compression_factor(&self) -> f64 {
        let mut factor = 1.0;
        if self.is_scalable() {
            if self.client_width < self.natural_width {
                factor *= f64::from(self.client_width) / f64::from(self.natural_width);
            }
            if self.client_height < self.natural_height {
                factor *= f64::from(self.client_height) / f64::from(self.natural_height);
            }
        }
        factor
    }
}

type ImageDataMap = BTreeMap<String, ImageData>;

fn collect_images(input: &PagespeedInput, document: &dyn DomDocument, images: &mut ImageDataMap) {
    document.traverse(&mut |element: &dyn DomElement| match element.tag_name().as_str() {
        "IMG" => record_image(input, document, element, images),
        "IFRAME" | "FRAME" => {
            if let Some(child) = element.content_document() {
                collect_images(input, child.as_ref(), images);
            }
        }
        _ => {}
    });
}

fn record_image(input: &PagespeedInput, document: &dyn DomDocument, element: &dyn DomElement, images: &mut ImageDataMap) {
    if !input.has_resource_with_url(&document.document_url()) {
        return;
    }
    let Some(url) = element.attribute("src").and_then(|src| document.resolve_uri(&src)) else {
        return;
    };
    let Some(resource) = input.resource_with_url(&url) else {
        return;
    };
    let Some(natural) = input.new_image_attributes(input.final_redirect_target(resource)) else {
        return;
    };
    let (DomStatus::Success(width), DomStatus::Success(height)) = (element.actual_width(), element.actual_height())
    else {
        return;
    };
    let (Ok(client_width), Ok(client_height)) = (u32::try_from(width), u32::try_from(height)) else {
        log::info!("Negative client size {width}x{height} for {url}");
        return;
    };

    match images.get_mut(&url) {
        Some(data) => data.update(&url, natural.width, natural.height, client_width, client_height),
        None => {
            images.insert(
                url,
                ImageData::new(natural.width, natural.height, client_width, client_height),
            );
        }
    }
}

#[derive(Clone, Default)]
pub struct ServeScaledImages;

impl ServeScaledImages {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for ServeScaledImages {
    fn name(&self) -> &'static str {
        "ServeScaledImages"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Serve scaled images")
    }

    fn capability_requirements(&self) -> InputCapabilities {
        InputCapabilities::DOM | InputCapabilities::RESPONSE_BODY
    }

    fn append_results(&self, rule_input: &RuleInput<'_>, provider: &mut ResultProvider) -> Result<(), RuleError> {
        let input = rule_input.input();
        let Some(document) = input.dom_document() else {
            return Ok(());
        };

        let mut images = ImageDataMap::new();
        collect_images(input, document, &mut images);
        rule_input.check_budget()?;

        for (url, data) in &images {
            if !data.is_scalable() {
                continue;
            }
            let Some(resource) = input.resource_with_url(url) else {
                log::info!("No resource for url: {url}");
                continue;
            };
            let original_size = input.final_redirect_target(resource).response_body().len() as i64;
            let bytes_saved = original_size - (data.compression_factor() * original_size as f64) as i64;

            let finding = provider.new_result();
            finding.resource_urls.push(url.clone());
            finding.original_response_bytes = Some(original_size as u64);
            finding.savings.response_bytes_saved = bytes_saved;
            finding.details = ResultDetails::ImageDimensions {
                expected_width: data.natural_width,
                expected_height: data.natural_height,
                actual_width: Some(data.client_width),
                actual_height: Some(data.client_height),
            };
        }
        Ok(())
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }

        let total_original: i64 = results
            .iter()
            .map(|f| f.original_response_bytes.unwrap_or(0) as i64)
            .sum();
        let total_saved: i64 = results.iter().map(|f| f.savings.response_bytes_saved).sum();

        let mut block = formatter.add_url_block(
            UserFacingString::new(
                "The following images are resized in HTML or CSS. Serving scaled images could save \
                 %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).",
            ),
            &[
                FormatArgument::bytes("SIZE_IN_BYTES", total_saved),
                FormatArgument::percentage("PERCENTAGE", total_saved, total_original),
            ],
        );

        for finding in results {
            let [url] = finding.resource_urls.as_slice() else {
                log::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    finding.resource_urls.len()
                );
                continue;
            };
            let saved = finding.savings.response_bytes_saved;
            let original = finding.original_response_bytes.unwrap_or(0) as i64;

            match finding.details {
                ResultDetails::ImageDimensions {
                    expected_width,
                    expected_height,
                    actual_width: Some(actual_width),
                    actual_height: Some(actual_height),
                } => {
                    block.add_url_result(
                        UserFacingString::new(
                            "%(URL)s is resized in HTML or CSS from %(ORIGINAL_WIDTH)sx%(ORIGINAL_HEIGHT)s to \
                             %(FINAL_WIDTH)sx%(FINAL_HEIGHT)s. Serving a scaled image could save %(SIZE_IN_BYTES)s \
                             (%(PERCENTAGE)s reduction).",
                        ),
                        &[
                            FormatArgument::url("URL", url),
                            FormatArgument::int("ORIGINAL_WIDTH", i64::from(expected_width)),
                            FormatArgument::int("ORIGINAL_HEIGHT", i64::from(expected_height)),
                            FormatArgument::int("FINAL_WIDTH", i64::from(actual_width)),
                            FormatArgument::int("FINAL_HEIGHT", i64::from(actual_height)),
                            FormatArgument::bytes("SIZE_IN_BYTES", saved),
                            FormatArgument::percentage("PERCENTAGE", saved, original),
                        ],
                    );
                }
                _ => {
                    block.add_url_result(
                        UserFacingString::new(
                            "%(URL)s is resized in HTML or CSS. Serving a scaled image could save \
                             %(SIZE_IN_BYTES)s (%(PERCENTAGE)s reduction).",
                        ),
                        &[
                            FormatArgument::url("URL", url),
                            FormatArgument::bytes("SIZE_IN_BYTES", saved),
                            FormatArgument::percentage("PERCENTAGE", saved, original),
                        ],
                    );
                }
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
