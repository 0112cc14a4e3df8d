//! The page-load snapshot every rule reads.
//!
//! A [`PagespeedInput`] is filled in while it is being built, then frozen exactly once.
//! Freezing classifies resources by how the DOM references them, builds the request
//! order and redirect chains, totals [`InputInformation`] and finalizes the browsing
//! context tree. After that the input is read-only and may be shared between rules.

use crate::browsing_context::BrowsingContext;
use crate::contract_violation;
use crate::dom::{DomDocument, DomElement, traverse_external_resources};
use crate::image_attributes::{ImageAttributes, ImageAttributesFactory};
use crate::instrumentation::InstrumentationData;
use crate::resource::{Resource, ResourceType};
use crate::resource_collection::{ResourceCollection, ResourceFilter};
use crate::resource_util;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("input is frozen")]
    Frozen,
    #[error("input is not frozen")]
    NotFrozen,
    #[error("resource has an empty URL")]
    EmptyUrl,
    #[error("duplicate resource {0}")]
    DuplicateUrl(String),
    #[error("invalid status code {code} for {url}")]
    InvalidStatusCode { url: String, code: i32 },
    #[error("resource {0} rejected by filter")]
    Filtered(String),
    #[error("no resource with URL {0}")]
    UnknownResource(String),
    #[error("{0} already set")]
    AlreadySet(&'static str),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("browsing context for {0} failed to finalize")]
    BrowsingContext(String),
}

/// Which optional facts an input carries. Rules declare the ones they need.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputCapabilities(u32);

impl InputCapabilities {
    pub const NONE: Self = Self(0);
    pub const DOM: Self = Self(1 << 0);
    pub const ONLOAD: Self = Self(1 << 1);
    pub const REQUEST_HEADERS: Self = Self(1 << 2);
    pub const RESPONSE_BODY: Self = Self(1 << 3);
    pub const REQUEST_START_TIMES: Self = Self(1 << 4);
    pub const TIMELINE_DATA: Self = Self(1 << 5);
    pub const DEPENDENCY_DATA: Self = Self(1 << 6);
    pub const FIRST_BYTE_TIMES: Self = Self(1 << 7);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::DOM, "DOM"),
        (Self::ONLOAD, "ONLOAD"),
        (Self::REQUEST_HEADERS, "REQUEST_HEADERS"),
        (Self::RESPONSE_BODY, "RESPONSE_BODY"),
        (Self::REQUEST_START_TIMES, "REQUEST_START_TIMES"),
        (Self::TIMELINE_DATA, "TIMELINE_DATA"),
        (Self::DEPENDENCY_DATA, "DEPENDENCY_DATA"),
        (Self::FIRST_BYTE_TIMES, "FIRST_BYTE_TIMES"),
    ];

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn add(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True when every capability in `required` is present.
    pub fn satisfies(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.satisfies(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for InputCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InputCapabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for InputCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        f.write_str(&self.names().join("|"))
    }
}

impl fmt::Debug for InputCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputCapabilities({self})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnloadState {
    #[default]
    Unknown,
    NotYetFired,
    Fired,
}

fn default_weight() -> f64 {
    1.0
}

fn default_byte_weight() -> f64 {
    0.001
}

/// How much the client cares about each kind of saving. Multiplied with a finding's
/// [`Savings`](crate::results::Savings) to get its impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClientCharacteristics {
    #[serde(default = "default_weight")]
    pub dns_requests_weight: f64,
    #[serde(default = "default_weight")]
    pub requests_weight: f64,
    #[serde(default = "default_byte_weight")]
    pub response_bytes_weight: f64,
    #[serde(default = "default_byte_weight")]
    pub request_bytes_weight: f64,
    #[serde(default = "default_weight")]
    pub critical_path_length_weight: f64,
    #[serde(default = "default_weight")]
    pub connections_weight: f64,
    #[serde(default = "default_weight")]
    pub page_reflows_weight: f64,
    pub mobile: bool,
}

impl Default for ClientCharacteristics {
    fn default() -> Self {
        Self {
            dns_requests_weight: default_weight(),
            requests_weight: default_weight(),
            response_bytes_weight: default_byte_weight(),
            request_bytes_weight: default_byte_weight(),
            critical_path_length_weight: default_weight(),
            connections_weight: default_weight(),
            page_reflows_weight: default_weight(),
            mobile: false,
        }
    }
}

/// Totals over all resources, computed at freeze time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputInformation {
    pub total_request_bytes: u64,
    pub html_response_bytes: u64,
    pub text_response_bytes: u64,
    pub css_response_bytes: u64,
    pub image_response_bytes: u64,
    pub javascript_response_bytes: u64,
    pub flash_response_bytes: u64,
    pub other_response_bytes: u64,
    pub number_resources: usize,
    pub number_hosts: usize,
    pub number_css_resources: usize,
    pub number_js_resources: usize,
    pub number_static_resources: usize,
    pub client_characteristics: ClientCharacteristics,
}

impl InputInformation {
    pub fn total_response_bytes(&self) -> u64 {
        self.html_response_bytes
            + self.text_response_bytes
            + self.css_response_bytes
            + self.image_response_bytes
            + self.javascript_response_bytes
            + self.flash_response_bytes
            + self.other_response_bytes
    }

    fn add_resource(&mut self, resource: &Resource) {
        self.total_request_bytes += resource.estimate_request_bytes() as u64;
        let response_bytes = resource.estimate_response_bytes() as u64;
        match resource.resource_type() {
            ResourceType::Html => self.html_response_bytes += response_bytes,
            ResourceType::Text => self.text_response_bytes += response_bytes,
            ResourceType::Css => {
                self.css_response_bytes += response_bytes;
                self.number_css_resources += 1;
            }
            ResourceType::Image => self.image_response_bytes += response_bytes,
            ResourceType::Js => {
                self.javascript_response_bytes += response_bytes;
                self.number_js_resources += 1;
            }
            ResourceType::Flash => self.flash_response_bytes += response_bytes,
            ResourceType::Redirect | ResourceType::Media | ResourceType::Other => {
                self.other_response_bytes += response_bytes
            }
        }
        if resource_util::is_likely_static_resource(resource) {
            self.number_static_resources += 1;
        }
    }
}

/// Gets one chance to adjust the input while it is being frozen, after DOM
/// classification and before the indexes are built. Setters and `acquire_*` calls are
/// allowed; adding resources is not.
pub trait FreezeParticipant {
    fn on_freeze(&mut self, input: &mut PagespeedInput);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitializationState {
    Init,
    Finalize,
    Frozen,
}

pub struct PagespeedInput {
    resources: ResourceCollection,
    dom_document: Option<Box<dyn DomDocument>>,
    image_attributes_factory: Option<Box<dyn ImageAttributesFactory>>,
    instrumentation_data: Option<Vec<InstrumentationData>>,
    top_level_browsing_context: Option<BrowsingContext>,
    primary_resource_url: Option<String>,
    onload_state: OnloadState,
    onload_millis: Option<i64>,
    viewport: Option<(i32, i32)>,
    client_characteristics: ClientCharacteristics,
    input_information: InputInformation,
    state: InitializationState,
}

impl Default for PagespeedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PagespeedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagespeedInput")
            .field("resources", &self.resources)
            .field("primary_resource_url", &self.primary_resource_url)
            .field("has_dom", &self.dom_document.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl PagespeedInput {
    pub fn new() -> Self {
        Self::with_collection(ResourceCollection::new())
    }

    /// Resources refused by `filter` are dropped by [`add_resource`](Self::add_resource).
    pub fn with_filter(filter: Box<dyn ResourceFilter>) -> Self {
        Self::with_collection(ResourceCollection::with_filter(filter))
    }

    fn with_collection(resources: ResourceCollection) -> Self {
        Self {
            resources,
            dom_document: None,
            image_attributes_factory: None,
            instrumentation_data: None,
            top_level_browsing_context: None,
            primary_resource_url: None,
            onload_state: OnloadState::Unknown,
            onload_millis: None,
            viewport: None,
            client_characteristics: ClientCharacteristics::default(),
            input_information: InputInformation::default(),
            state: InitializationState::Init,
        }
    }

    fn check_mutable(&self, what: &str) -> Result<(), InputError> {
        if self.state == InitializationState::Frozen {
            contract_violation!("Can't set {} for frozen PagespeedInput", what);
            return Err(InputError::Frozen);
        }
        Ok(())
    }

    /// Take ownership of `resource`. Refused resources are dropped.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), InputError> {
        if self.state != InitializationState::Init {
            contract_violation!("Can't add resource {} to frozen PagespeedInput", resource.request_url());
            return Err(InputError::Frozen);
        }
        self.resources.add_resource(resource)
    }

    pub fn set_primary_resource_url(&mut self, url: &str) -> Result<(), InputError> {
        self.check_mutable("primary resource")?;
        let Some(idx) = self.resources.index_of_url(url) else {
            log::info!("No such primary resource {url}");
            return Err(InputError::UnknownResource(url.to_string()));
        };
        self.primary_resource_url = Some(self.resources.resource(idx).request_url().to_string());
        Ok(())
    }

    pub fn set_onload_state(&mut self, state: OnloadState) -> Result<(), InputError> {
        self.check_mutable("onload state")?;
        self.onload_state = state;
        Ok(())
    }

    /// Also marks onload as fired.
    pub fn set_onload_time_millis(&mut self, millis: i64) -> Result<(), InputError> {
        self.check_mutable("onload time")?;
        if millis < 0 {
            contract_violation!("Invalid onload time {}", millis);
            return Err(InputError::InvalidValue(format!("onload time {millis}")));
        }
        self.onload_state = OnloadState::Fired;
        self.onload_millis = Some(millis);
        Ok(())
    }

    pub fn set_client_characteristics(&mut self, client: ClientCharacteristics) -> Result<(), InputError> {
        self.check_mutable("client characteristics")?;
        self.client_characteristics = client;
        Ok(())
    }

    pub fn set_viewport_width_and_height(&mut self, width: i32, height: i32) -> Result<(), InputError> {
        self.check_mutable("viewport")?;
        if width < 0 || height < 0 {
            log::warn!("Invalid viewport {width}x{height}");
            return Err(InputError::InvalidValue(format!("viewport {width}x{height}")));
        }
        self.viewport = Some((width, height));
        Ok(())
    }

    pub fn acquire_dom_document(&mut self, document: Box<dyn DomDocument>) -> Result<(), InputError> {
        self.check_mutable("DOM document")?;
        if self.dom_document.is_some() {
            log::warn!("DOM document already set, ignoring {}", document.document_url());
            return Err(InputError::AlreadySet("DOM document"));
        }
        self.dom_document = Some(document);
        Ok(())
    }

    pub fn acquire_image_attributes_factory(
        &mut self,
        factory: Box<dyn ImageAttributesFactory>,
    ) -> Result<(), InputError> {
        self.check_mutable("image attributes factory")?;
        if self.image_attributes_factory.is_some() {
            log::warn!("Image attributes factory already set");
            return Err(InputError::AlreadySet("image attributes factory"));
        }
        self.image_attributes_factory = Some(factory);
        Ok(())
    }

    pub fn acquire_instrumentation_data(&mut self, data: Vec<InstrumentationData>) -> Result<(), InputError> {
        self.check_mutable("instrumentation data")?;
        if self.instrumentation_data.is_some() {
            log::warn!("Instrumentation data already set");
            return Err(InputError::AlreadySet("instrumentation data"));
        }
        self.instrumentation_data = Some(data);
        Ok(())
    }

    pub fn acquire_top_level_browsing_context(&mut self, context: BrowsingContext) -> Result<(), InputError> {
        self.check_mutable("browsing context")?;
        if self.top_level_browsing_context.is_some() {
            log::warn!("Top level browsing context already set");
            return Err(InputError::AlreadySet("browsing context"));
        }
        self.top_level_browsing_context = Some(context);
        Ok(())
    }

    pub fn freeze(&mut self) -> Result<(), InputError> {
        self.freeze_inner(None)
    }

    pub fn freeze_with(&mut self, participant: &mut dyn FreezeParticipant) -> Result<(), InputError> {
        self.freeze_inner(Some(participant))
    }

    fn freeze_inner(&mut self, participant: Option<&mut dyn FreezeParticipant>) -> Result<(), InputError> {
        if self.state != InitializationState::Init {
            contract_violation!("Can't freeze frozen PagespeedInput");
            return Err(InputError::Frozen);
        }
        self.state = InitializationState::Finalize;

        let types = self.resource_types_from_dom();
        for (idx, resource_type) in types {
            self.resources.resource_mut(idx).set_resource_type(resource_type);
        }

        if let Some(participant) = participant {
            participant.on_freeze(self);
        }

        self.resources.freeze();
        self.populate_input_information();

        if self.top_level_browsing_context.is_none()
            && let Some(document) = self.dom_document.as_deref()
        {
            self.top_level_browsing_context = Some(BrowsingContext::from_document(document));
        }

        self.state = InitializationState::Frozen;
        if let Some(context) = self.top_level_browsing_context.as_mut()
            && !context.finalize(&self.resources)
        {
            return Err(InputError::BrowsingContext(context.document_url().to_string()));
        }
        Ok(())
    }

    /// Type implied by every resource the DOM references. The first reference to a
    /// resource decides its type; later conflicting references are logged.
    fn resource_types_from_dom(&self) -> BTreeMap<usize, ResourceType> {
        let mut types = BTreeMap::new();
        let Some(document) = self.dom_document.as_deref() else {
            return types;
        };
        traverse_external_resources(document, &mut |element: &dyn DomElement, url: &str| {
            let Some(idx) = self.resources.index_of_url(url) else {
                log::info!("Unable to find resource {url}");
                return;
            };
            let Some(idx) = self.follow_redirects(idx) else {
                return;
            };
            let resource_type = match element.tag_name().as_str() {
                "IMG" => ResourceType::Image,
                "SCRIPT" => ResourceType::Js,
                "IFRAME" | "FRAME" => ResourceType::Html,
                "LINK" => ResourceType::Css,
                _ => return,
            };
            match types.get(&idx) {
                Some(existing) if *existing != resource_type => {
                    log::warn!(
                        "Multiple resource types for {}: keeping {existing}, ignoring {resource_type}",
                        self.resources.resource(idx).request_url()
                    );
                }
                Some(_) => {}
                None => {
                    types.insert(idx, resource_type);
                }
            }
        });
        types
    }

    /// End of the redirect chain starting at `idx`, read straight from the `Location`
    /// headers. `None` for loops and chains that leave the captured resources.
    fn follow_redirects(&self, mut idx: usize) -> Option<usize> {
        let mut seen = HashSet::new();
        while self.resources.resource(idx).resource_type() == ResourceType::Redirect {
            if !seen.insert(idx) {
                log::info!("Redirect loop at {}", self.resources.resource(idx).request_url());
                return None;
            }
            let target = resource_util::get_redirected_url(self.resources.resource(idx))?;
            idx = self.resources.index_of_url(&target)?;
        }
        Some(idx)
    }

    fn populate_input_information(&mut self) {
        let mut info = InputInformation {
            number_resources: self.resources.len(),
            number_hosts: self.resources.host_count(),
            client_characteristics: self.client_characteristics.clone(),
            ..Default::default()
        };
        for resource in self.resources.iter() {
            info.add_resource(resource);
        }
        self.input_information = info;
    }

    pub fn is_frozen(&self) -> bool {
        self.state == InitializationState::Frozen
    }

    /// What the frozen input can actually offer to rules. Empty for an input without
    /// resources.
    pub fn estimate_capabilities(&self) -> InputCapabilities {
        let mut capabilities = InputCapabilities::NONE;
        if !self.is_frozen() {
            contract_violation!("Can't estimate capabilities of non-frozen input");
            return capabilities;
        }
        if self.resources.is_empty() {
            return capabilities;
        }
        if self.dom_document.is_some() {
            capabilities |= InputCapabilities::DOM;
        }
        if self.instrumentation_data.as_ref().is_some_and(|data| !data.is_empty()) {
            capabilities |= InputCapabilities::TIMELINE_DATA;
        }
        if self.resources.resources_in_request_order().is_some() {
            capabilities |= InputCapabilities::REQUEST_START_TIMES;
        }
        if self.onload_state != OnloadState::Unknown {
            capabilities |= InputCapabilities::ONLOAD;
        }
        if self.resources.iter().all(|r| r.first_byte_millis().is_some()) {
            capabilities |= InputCapabilities::FIRST_BYTE_TIMES;
        }
        for resource in self.resources.iter() {
            if !resource.response_body().is_empty() {
                capabilities |= InputCapabilities::RESPONSE_BODY;
            }
            // One resource with a full set of request headers stands in for all of them.
            if !resource.request_header("referer").is_empty()
                && !resource.request_header("host").is_empty()
                && !resource.request_header("accept-encoding").is_empty()
            {
                capabilities |= InputCapabilities::REQUEST_HEADERS;
            }
        }
        capabilities
    }

    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, idx: usize) -> &Resource {
        self.resources.resource(idx)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn resource_collection(&self) -> &ResourceCollection {
        &self.resources
    }

    pub fn has_resource_with_url(&self, url: &str) -> bool {
        self.resources.has_resource_with_url(url)
    }

    pub fn resource_with_url(&self, url: &str) -> Option<&Resource> {
        self.resources.resource_with_url(url)
    }

    pub fn resources_for_host(&self, host: &str) -> Vec<&Resource> {
        self.resources.resources_for_host(host)
    }

    pub fn resources_in_request_order(&self) -> Option<Vec<&Resource>> {
        self.resources.resources_in_request_order()
    }

    pub fn final_redirect_target<'a>(&'a self, resource: &'a Resource) -> &'a Resource {
        self.resources.final_redirect_target(resource)
    }

    pub fn redirect_chains(&self) -> Vec<Vec<&Resource>> {
        self.resources.redirect_chains()
    }

    pub fn primary_resource_url(&self) -> Option<&str> {
        self.primary_resource_url.as_deref()
    }

    pub fn dom_document(&self) -> Option<&dyn DomDocument> {
        self.dom_document.as_deref()
    }

    pub fn instrumentation_data(&self) -> &[InstrumentationData] {
        self.instrumentation_data.as_deref().unwrap_or_default()
    }

    pub fn top_level_browsing_context(&self) -> Option<&BrowsingContext> {
        self.top_level_browsing_context.as_ref()
    }

    pub fn onload_state(&self) -> OnloadState {
        self.onload_state
    }

    pub fn onload_millis(&self) -> Option<i64> {
        self.onload_millis
    }

    pub fn viewport_width_and_height(&self) -> Option<(i32, i32)> {
        self.viewport
    }

    pub fn client_characteristics(&self) -> &ClientCharacteristics {
        &self.client_characteristics
    }

    pub fn input_information(&self) -> &InputInformation {
        &self.input_information
    }

    /// True only when onload is known to have fired before the resource was requested.
    pub fn is_resource_loaded_after_onload(&self, resource: &Resource) -> bool {
        if self.onload_state != OnloadState::Fired {
            return false;
        }
        match (resource.request_start_time_millis(), self.onload_millis) {
            (Some(start), Some(onload)) => start > onload,
            _ => false,
        }
    }

    pub fn new_image_attributes(&self, resource: &Resource) -> Option<ImageAttributes> {
        if self.state == InitializationState::Init {
            contract_violation!("Image attributes requested before freeze");
            return None;
        }
        self.image_attributes_factory.as_ref()?.new_image_attributes(resource)
    }
}
