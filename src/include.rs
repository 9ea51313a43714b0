//! Per-call memo of side-loaded resources.

use std::collections::HashSet;

use serde_json::Value;

/// Resources already side-loaded during one forward transform.
///
/// Keys are `(type, id)` pairs. A key is marked before the resource body is built,
/// so a relationship cycle that leads back to a resource being built only
/// re-emits its identifier. The first body built for a key is the one kept.
/// Hooks reach it through [`HookContext::include`] and
/// [`HookContext::is_included`].
///
/// [`HookContext::include`]: crate::HookContext::include
/// [`HookContext::is_included`]: crate::HookContext::is_included
#[derive(Debug, Default)]
pub(crate) struct IncludeSet {
    keys: HashSet<(String, String)>,
    resources: Vec<Value>,
}

impl IncludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource_type: &str, id: &str) -> (String, String) {
        (resource_type.to_string(), id.to_string())
    }

    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.keys.contains(&Self::key(resource_type, id))
    }

    /// Mark `(type, id)` as included. Returns false if it already was.
    pub fn mark(&mut self, resource_type: &str, id: &str) -> bool {
        self.keys.insert(Self::key(resource_type, id))
    }

    /// Append a materialized resource body.
    pub fn push(&mut self, resource: Value) {
        self.resources.push(resource);
    }

    /// Included resources in materialization order.
    pub fn into_resources(self) -> Vec<Value> {
        self.resources
    }
}
