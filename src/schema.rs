//! Per-type schemas: the hook record that drives both transform directions.
//!
//! A [`Schema`] is a fixed set of optional hooks. Hooks are plain closures
//! over a context value; absent hooks fall back to defaults filled in at
//! registration time (`type` returns the registered name, `id` stringifies
//! `data.id`) or are simply skipped.
//!
//! ```
//! use jsonapi_graph::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .attributes(|ctx| Ok(json!({ "title": ctx.data()["title"] })))
//!     .relationship("author", |ctx| {
//!         Ok(json!({
//!             "data": { "name": "user", "data": ctx.data()["author"], "included": true }
//!         }))
//!     })
//!     .build();
//! assert!(schema.has_relationship("author"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{HookError, SchemaError, TransformError};
use crate::types::Options;

/// Result type returned by every hook.
pub type HookResult<T = Value> = Result<T, HookError>;

/// Hook building one part of a resource (`type`, `id`, `attributes`,
/// a relationship, `links`, `meta`).
pub type ResourceHook = Arc<dyn Fn(&mut HookContext<'_>) -> HookResult + Send + Sync>;

/// Hook choosing the registered schema for one raw object.
pub type DataSchemaHook = Arc<dyn Fn(&DataSchemaContext<'_>) -> HookResult<String> + Send + Sync>;

/// Hook producing document-level `links` or `meta`.
pub type DocumentHook = Arc<dyn Fn(&DocumentContext<'_>) -> HookResult + Send + Sync>;

/// Hook producing an id or attributes when reading a document back.
pub type UntransformHook = Arc<dyn Fn(&UntransformContext<'_>) -> HookResult + Send + Sync>;

/// Hook choosing the registered schema for one parsed resource.
pub type UntransformDataSchemaHook =
    Arc<dyn Fn(&UntransformContext<'_>) -> HookResult<String> + Send + Sync>;

/// Mutable bag shared by the hooks building a single resource.
///
/// Each resource instance gets a fresh, empty state; it is never shared
/// with siblings, related resources or other calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformState {
    values: Map<String, Value>,
}

impl TransformState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Context passed to resource hooks.
///
/// Fields are filled in as the resource is built: `type` and `id` are
/// visible from `attributes` onwards, `attributes` from the relationship
/// hooks onwards, and so on. `links` and `meta` run last and see
/// everything.
pub struct HookContext<'a> {
    source: &'a Value,
    options: &'a Options,
    data: &'a Value,
    pub(crate) resource_type: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) attributes: Option<Value>,
    pub(crate) relationships: Option<Map<String, Value>>,
    pub(crate) links: Option<Value>,
    state: TransformState,
    includer: Option<&'a dyn Includer>,
}

/// Side-loading handle of the running transform.
pub(crate) trait Includer {
    fn include(&self, name: &str, data: &Value) -> Result<Value, TransformError>;
    fn is_included(&self, resource_type: &str, id: &str) -> bool;
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(source: &'a Value, options: &'a Options, data: &'a Value) -> Self {
        Self {
            source,
            options,
            data,
            resource_type: None,
            id: None,
            attributes: None,
            relationships: None,
            links: None,
            state: TransformState::new(),
            includer: None,
        }
    }

    pub(crate) fn with_includer(mut self, includer: &'a dyn Includer) -> Self {
        self.includer = Some(includer);
        self
    }

    /// The full source handed to `transform` (one object or an array).
    pub fn source(&self) -> &'a Value {
        self.source
    }

    /// Merged engine, schema and call options.
    pub fn options(&self) -> &'a Options {
        self.options
    }

    /// The raw object this resource is built from.
    pub fn data(&self) -> &'a Value {
        self.data
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Raw result of the `attributes` hook, if it ran.
    pub fn attributes(&self) -> Option<&Value> {
        self.attributes.as_ref()
    }

    /// Relationships kept so far (visible to `links` and `meta`).
    pub fn relationships(&self) -> Option<&Map<String, Value>> {
        self.relationships.as_ref()
    }

    /// Raw result of the `links` hook (visible to `meta`).
    pub fn links(&self) -> Option<&Value> {
        self.links.as_ref()
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TransformState {
        &mut self.state
    }

    /// Side-load the resource built from `data` by the schema registered as
    /// `name`, and return its `{ type, id }` identifier.
    ///
    /// This is the same path `included: true` takes on a relationship item:
    /// the pair is claimed before the body is built, so a resource already
    /// included (or being built further up) is never built twice and the
    /// first body wins.
    pub fn include(&self, name: &str, data: &Value) -> HookResult {
        let Some(includer) = self.includer else {
            return Err("include is only available while transforming".into());
        };
        includer.include(name, data).map_err(HookError::from)
    }

    /// Whether `(resource_type, id)` has already been claimed for `included`.
    ///
    /// The primary resources of the call are never in the set.
    pub fn is_included(&self, resource_type: &str, id: &str) -> bool {
        self.includer
            .is_some_and(|includer| includer.is_included(resource_type, id))
    }
}

/// Context passed to the `data_schema` dispatch hook.
pub struct DataSchemaContext<'a> {
    pub source: &'a Value,
    pub data: &'a Value,
    pub options: &'a Options,
}

/// Context passed to document-level `links` and `meta` hooks.
pub struct DocumentContext<'a> {
    pub source: &'a Value,
    pub options: &'a Options,
    /// Primary data already built (one resource or an array).
    pub data: &'a Value,
    pub included: &'a [Value],
}

/// Context passed to reverse-direction hooks.
pub struct UntransformContext<'a> {
    pub resource_type: &'a str,
    /// The parsed resource (or resource identifier for relationship data).
    pub resource: &'a Value,
    pub document: &'a Value,
    pub options: &'a Options,
}

/// Hooks describing how one resource type is produced and consumed.
#[derive(Clone, Default)]
pub struct Schema {
    pub(crate) resource_type: Option<ResourceHook>,
    pub(crate) id: Option<ResourceHook>,
    pub(crate) attributes: Option<ResourceHook>,
    pub(crate) relationships: Vec<(String, ResourceHook)>,
    pub(crate) links: Option<ResourceHook>,
    pub(crate) meta: Option<ResourceHook>,
    pub(crate) data_schema: Option<DataSchemaHook>,
    pub(crate) untransform_data_schema: Option<UntransformDataSchemaHook>,
    pub(crate) untransform_id: Option<UntransformHook>,
    pub(crate) untransform_attributes: Option<UntransformHook>,
    pub(crate) document_links: Option<DocumentHook>,
    pub(crate) document_meta: Option<DocumentHook>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.iter().any(|(rel, _)| rel == name)
    }

    /// Relationship names in declaration order.
    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.iter().map(|(rel, _)| rel.as_str())
    }

    /// Check the schema shape and fill in the default `type` and `id` hooks.
    pub(crate) fn validated(mut self, name: &str) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for (rel, _) in &self.relationships {
            if rel.is_empty() {
                return Err(SchemaError::InvalidSchemaProperty {
                    name: name.to_string(),
                    property: "data.relationships".to_string(),
                    message: "relationship names must be non-empty".to_string(),
                });
            }
            if !seen.insert(rel.as_str()) {
                return Err(SchemaError::InvalidSchemaProperty {
                    name: name.to_string(),
                    property: format!("data.relationships.{}", rel),
                    message: "relationship declared more than once".to_string(),
                });
            }
        }

        if self.resource_type.is_none() {
            let type_name = Value::String(name.to_string());
            self.resource_type = Some(resource_hook(move |_| Ok(type_name.clone())));
        }
        if self.id.is_none() {
            self.id = Some(resource_hook(default_id));
        }
        Ok(self)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type", &self.resource_type.is_some())
            .field("id", &self.id.is_some())
            .field("attributes", &self.attributes.is_some())
            .field(
                "relationships",
                &self.relationship_names().collect::<Vec<_>>(),
            )
            .field("links", &self.links.is_some())
            .field("meta", &self.meta.is_some())
            .field("data_schema", &self.data_schema.is_some())
            .field(
                "untransform_data_schema",
                &self.untransform_data_schema.is_some(),
            )
            .field("untransform_id", &self.untransform_id.is_some())
            .field(
                "untransform_attributes",
                &self.untransform_attributes.is_some(),
            )
            .field("document_links", &self.document_links.is_some())
            .field("document_meta", &self.document_meta.is_some())
            .finish()
    }
}

fn resource_hook<F>(hook: F) -> ResourceHook
where
    F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
{
    Arc::new(hook)
}

/// `String(data.id)`: strings pass through, numbers and booleans are
/// rendered, anything else yields `null` and fails the id check.
fn default_id(ctx: &mut HookContext<'_>) -> HookResult {
    Ok(match ctx.data().get("id") {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Number(n)) => Value::String(n.to_string()),
        Some(Value::Bool(b)) => Value::String(b.to_string()),
        _ => Value::Null,
    })
}

/// Builder for [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Override the resource type (defaults to the registered name).
    pub fn resource_type<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.resource_type = Some(Arc::new(hook));
        self
    }

    /// Override the resource id (defaults to `data.id` as a string).
    pub fn id<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.id = Some(Arc::new(hook));
        self
    }

    pub fn attributes<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.attributes = Some(Arc::new(hook));
        self
    }

    /// Declare a relationship. The hook returns
    /// `{ data?, links?, meta? }` where `data` holds relationship items
    /// `{ name, data, included?, meta?, links? }`.
    pub fn relationship<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.relationships.push((name.into(), Arc::new(hook)));
        self
    }

    pub fn links<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.links = Some(Arc::new(hook));
        self
    }

    pub fn meta<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.meta = Some(Arc::new(hook));
        self
    }

    /// Redirect individual raw objects to another registered schema.
    pub fn data_schema<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DataSchemaContext<'_>) -> HookResult<String> + Send + Sync + 'static,
    {
        self.schema.data_schema = Some(Arc::new(hook));
        self
    }

    pub fn untransform_data_schema<F>(mut self, hook: F) -> Self
    where
        F: Fn(&UntransformContext<'_>) -> HookResult<String> + Send + Sync + 'static,
    {
        self.schema.untransform_data_schema = Some(Arc::new(hook));
        self
    }

    pub fn untransform_id<F>(mut self, hook: F) -> Self
    where
        F: Fn(&UntransformContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.untransform_id = Some(Arc::new(hook));
        self
    }

    pub fn untransform_attributes<F>(mut self, hook: F) -> Self
    where
        F: Fn(&UntransformContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.untransform_attributes = Some(Arc::new(hook));
        self
    }

    /// Document-level `links`, used when this schema is the top-level one.
    pub fn document_links<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.document_links = Some(Arc::new(hook));
        self
    }

    /// Document-level `meta`, used when this schema is the top-level one.
    pub fn document_meta<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.schema.document_meta = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}
