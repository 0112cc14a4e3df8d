//! Owned storage for the captured resources, with URL, host and request-order indexes
//! and the redirect chains between them.

use crate::contract_violation;
use crate::input::InputError;
use crate::resource::Resource;
use crate::resource_util;
use crate::uri_util;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Decides whether a resource may enter the collection.
pub trait ResourceFilter: Send + Sync {
    fn is_accepted(&self, resource: &Resource) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllResourceFilter;

impl ResourceFilter for AllowAllResourceFilter {
    fn is_accepted(&self, _resource: &Resource) -> bool {
        true
    }
}

/// Accepts everything a predicate accepts.
pub struct FnResourceFilter<F>(pub F);

impl<F: Fn(&Resource) -> bool + Send + Sync> ResourceFilter for FnResourceFilter<F> {
    fn is_accepted(&self, resource: &Resource) -> bool {
        (self.0)(resource)
    }
}

/// Key a URL is stored under: canonical form when it parses, otherwise the raw URL
/// without its fragment.
pub(crate) fn url_key(url: &str) -> String {
    uri_util::canonicalize_url(url).unwrap_or_else(|| uri_util::uri_without_fragment(url).to_string())
}

pub struct ResourceCollection {
    resources: Vec<Resource>,
    url_index: HashMap<String, usize>,
    host_index: BTreeMap<String, Vec<usize>>,
    request_order: Option<Vec<usize>>,
    redirect_registry: RedirectRegistry,
    filter: Box<dyn ResourceFilter>,
    frozen: bool,
}

impl Default for ResourceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCollection")
            .field("resources", &self.resources.len())
            .field("hosts", &self.host_index.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::with_filter(Box::new(AllowAllResourceFilter))
    }

    pub fn with_filter(filter: Box<dyn ResourceFilter>) -> Self {
        Self {
            resources: Vec::new(),
            url_index: HashMap::new(),
            host_index: BTreeMap::new(),
            request_order: None,
            redirect_registry: RedirectRegistry::default(),
            filter,
            frozen: false,
        }
    }

    fn validate(&self, resource: &Resource, key: &str) -> Result<(), InputError> {
        let url = resource.request_url();
        if url.is_empty() {
            log::warn!("Refusing resource with empty URL");
            return Err(InputError::EmptyUrl);
        }
        if self.url_index.contains_key(key) {
            log::info!("Ignoring duplicate resource {url}");
            return Err(InputError::DuplicateUrl(url.to_string()));
        }
        let code = resource.response_status_code();
        if code <= 0 {
            log::warn!("Refusing resource with invalid status code {code}: {url}");
            return Err(InputError::InvalidStatusCode {
                url: url.to_string(),
                code,
            });
        }
        if !self.filter.is_accepted(resource) {
            log::debug!("Resource filter rejected {url}");
            return Err(InputError::Filtered(url.to_string()));
        }
        Ok(())
    }

    /// Take ownership of `resource`. On failure the resource is dropped.
    pub fn add_resource(&mut self, mut resource: Resource) -> Result<(), InputError> {
        if self.frozen {
            contract_violation!("Can't add resource {} to frozen collection", resource.request_url());
            return Err(InputError::Frozen);
        }
        let key = url_key(resource.request_url());
        self.validate(&resource, &key)?;

        resource.set_request_url(&key);
        let idx = self.resources.len();
        self.host_index
            .entry(resource.host().unwrap_or_default())
            .or_default()
            .push(idx);
        self.url_index.insert(key, idx);
        self.resources.push(resource);
        Ok(())
    }

    /// Build the request order and the redirect chains. Later additions are refused.
    pub(crate) fn freeze(&mut self) {
        if self.frozen {
            contract_violation!("Can't freeze frozen resource collection");
            return;
        }
        if self.resources.iter().all(|r| r.request_start_time_millis().is_some()) {
            let mut order: Vec<usize> = (0..self.resources.len()).collect();
            order.sort_by_key(|&idx| self.resources[idx].request_start_time_millis());
            self.request_order = Some(order);
        }
        for indices in self.host_index.values_mut() {
            indices.sort_by(|&a, &b| self.resources[a].request_url().cmp(self.resources[b].request_url()));
        }
        self.redirect_registry = RedirectRegistry::build(self);
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resource(&self, idx: usize) -> &Resource {
        &self.resources[idx]
    }

    pub(crate) fn resource_mut(&mut self, idx: usize) -> &mut Resource {
        &mut self.resources[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    pub fn index_of_url(&self, url: &str) -> Option<usize> {
        let key = url_key(url);
        let idx = self.url_index.get(&key).copied();
        if idx.is_some() && key != url {
            log::debug!("Lookup of {url} matched resource {key}");
        }
        idx
    }

    pub fn resource_with_url(&self, url: &str) -> Option<&Resource> {
        self.index_of_url(url).map(|idx| &self.resources[idx])
    }

    pub fn has_resource_with_url(&self, url: &str) -> bool {
        self.index_of_url(url).is_some()
    }

    /// Resources of a host, ordered by URL.
    pub fn resources_for_host(&self, host: &str) -> Vec<&Resource> {
        self.host_index
            .get(&host.to_ascii_lowercase())
            .map(|indices| indices.iter().map(|&idx| &self.resources[idx]).collect())
            .unwrap_or_default()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.host_index.keys().map(String::as_str)
    }

    pub fn host_count(&self) -> usize {
        self.host_index.len()
    }

    /// `None` unless every resource had a request start time.
    pub fn resources_in_request_order(&self) -> Option<Vec<&Resource>> {
        self.request_order
            .as_ref()
            .map(|order| order.iter().map(|&idx| &self.resources[idx]).collect())
    }

    pub fn redirect_registry(&self) -> &RedirectRegistry {
        &self.redirect_registry
    }

    /// The resource a redirect chain through `resource` ends at; `resource` itself when it
    /// is not part of a chain.
    pub fn final_redirect_target<'a>(&'a self, resource: &'a Resource) -> &'a Resource {
        self.index_of_url(resource.request_url())
            .and_then(|idx| self.redirect_registry.final_target(idx))
            .map_or(resource, |idx| &self.resources[idx])
    }

    pub fn redirect_chain(&self, resource: &Resource) -> Option<Vec<&Resource>> {
        let idx = self.index_of_url(resource.request_url())?;
        let chain = self.redirect_registry.chain_of(idx)?;
        Some(chain.iter().map(|&i| &self.resources[i]).collect())
    }

    pub fn redirect_chains(&self) -> Vec<Vec<&Resource>> {
        self.redirect_registry
            .chains()
            .iter()
            .map(|chain| chain.iter().map(|&i| &self.resources[i]).collect())
            .collect()
    }
}

/// Redirect chains over resource indexes, built once from the `Location` headers.
#[derive(Debug, Clone, Default)]
pub struct RedirectRegistry {
    chains: Vec<Vec<usize>>,
    chain_of: HashMap<usize, usize>,
}

impl RedirectRegistry {
    fn build(collection: &ResourceCollection) -> Self {
        let mut redirect_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut destinations: BTreeSet<String> = BTreeSet::new();
        for resource in collection.iter() {
            if let Some(target) = resource_util::get_redirected_url(resource) {
                let target = url_key(&target);
                redirect_map
                    .entry(resource.request_url().to_string())
                    .or_default()
                    .push(target.clone());
                destinations.insert(target);
            }
        }

        // Sources nobody redirects to start chains first; the rest catch loops.
        let (primary, secondary): (Vec<&String>, Vec<&String>) =
            redirect_map.keys().partition(|source| !destinations.contains(*source));

        let mut registry = RedirectRegistry::default();
        let mut processed: HashSet<String> = HashSet::new();
        for root in primary.into_iter().chain(secondary) {
            if processed.contains(root) {
                continue;
            }
            let chain = Self::walk_chain(collection, &redirect_map, root, &mut processed);
            registry.chains.push(chain);
        }

        for (chain_idx, chain) in registry.chains.iter().enumerate() {
            for &resource_idx in chain {
                registry.chain_of.insert(resource_idx, chain_idx);
            }
        }
        registry
    }

    fn walk_chain(
        collection: &ResourceCollection,
        redirect_map: &BTreeMap<String, Vec<String>>,
        root: &str,
        processed: &mut HashSet<String>,
    ) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut work_stack = vec![root.to_string()];
        while let Some(current) = work_stack.pop() {
            let Some(idx) = collection.index_of_url(&current) else {
                log::info!("Unable to find resource with URL {current}");
                continue;
            };
            chain.push(idx);
            // A revisit closes a loop; it is recorded once and not followed again.
            if !processed.insert(current.clone()) {
                continue;
            }
            if let Some(targets) = redirect_map.get(&current) {
                work_stack.extend(targets.iter().rev().cloned());
            }
        }
        chain
    }

    pub fn chains(&self) -> &[Vec<usize>] {
        &self.chains
    }

    pub fn chain_of(&self, resource_idx: usize) -> Option<&[usize]> {
        self.chain_of
            .get(&resource_idx)
            .map(|&chain_idx| self.chains[chain_idx].as_slice())
    }

    pub fn final_target(&self, resource_idx: usize) -> Option<usize> {
        self.chain_of(resource_idx).and_then(|chain| chain.last().copied())
    }
}
