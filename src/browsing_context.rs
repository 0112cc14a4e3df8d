//! The tree of documents a page load produced: the top-level document and one nested
//! context per frame.

use crate::contract_violation;
use crate::dom::{DomDocument, DomElement};
use crate::resource_collection::ResourceCollection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowsingContext {
    document_url: String,
    children: Vec<BrowsingContext>,
    finalized: bool,
}

impl BrowsingContext {
    pub fn new(document_url: &str) -> Self {
        Self {
            document_url: document_url.to_string(),
            children: Vec::new(),
            finalized: false,
        }
    }

    /// One context per document, nested the way the frames are.
    pub fn from_document(document: &dyn DomDocument) -> Self {
        let mut context = Self::new(&document.document_url());
        document.traverse(&mut |element: &dyn DomElement| {
            if !matches!(element.tag_name().as_str(), "IFRAME" | "FRAME") {
                return;
            }
            if let Some(child) = element.content_document() {
                context.children.push(Self::from_document(child.as_ref()));
            }
        });
        context
    }

    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    pub fn children(&self) -> &[BrowsingContext] {
        &self.children
    }

    pub fn add_child(&mut self, child: BrowsingContext) -> bool {
        if self.finalized {
            contract_violation!("Can't add a child to finalized browsing context {}", self.document_url);
            return false;
        }
        self.children.push(child);
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of contexts in this subtree, this one included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(BrowsingContext::len).sum::<usize>()
    }

    /// Check that every document is a captured resource (redirects followed) and lock
    /// the tree. Fails if any context in the subtree fails.
    pub fn finalize(&mut self, resources: &ResourceCollection) -> bool {
        if self.finalized {
            contract_violation!("Browsing context {} finalized twice", self.document_url);
            return false;
        }
        self.finalized = true;

        let mut ok = true;
        match resources.resource_with_url(&self.document_url) {
            Some(resource) => {
                let target = resources.final_redirect_target(resource);
                if target.request_url() != resource.request_url() {
                    log::debug!(
                        "Browsing context {} resolves through redirects to {}",
                        self.document_url,
                        target.request_url()
                    );
                }
            }
            None => {
                log::warn!("No resource for browsing context document {}", self.document_url);
                ok = false;
            }
        }
        for child in &mut self.children {
            if !child.finalize(resources) {
                ok = false;
            }
        }
        ok
    }
}
