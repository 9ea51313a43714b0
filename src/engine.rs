//! The engine: a registry of schemas plus engine-wide default options.

use serde_json::Value;

use crate::error::{SchemaError, TransformError, UntransformError};
use crate::graph::Buckets;
use crate::registry::{Registry, RegistryEntry};
use crate::schema::Schema;
use crate::types::{Options, UntransformOptions};
use crate::{transform, untransform};

/// Transforms object graphs to and from JSON:API documents.
///
/// Register every schema first, then call [`Engine::transform`] and
/// [`Engine::untransform`] as often as needed. Engines are independent of
/// each other; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: Registry,
    base_options: Options,
}

impl Engine {
    /// Create an engine with no default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine whose options are merged under every call's options.
    pub fn with_options(base_options: Options) -> Self {
        Self {
            registry: Registry::new(),
            base_options,
        }
    }

    /// Register `schema` under `name` with no schema-scoped options.
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn register(&mut self, name: &str, schema: Schema) -> Result<(), SchemaError> {
        self.registry.register(name, schema, None)
    }

    /// Register `schema` under `name` with schema-scoped default options.
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn register_with_options(
        &mut self,
        name: &str,
        schema: Schema,
        options: Options,
    ) -> Result<(), SchemaError> {
        self.registry.register(name, schema, Some(options))
    }

    /// Look up a registered schema.
    pub fn get_schema(&self, name: &str) -> Option<&RegistryEntry> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn base_options(&self) -> &Options {
        &self.base_options
    }

    /// Build a JSON:API document from `source` with the schema named `name`.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` for unknown schemas, non-string types or
    /// ids, malformed relationship items, and failing hooks.
    pub fn transform(
        &self,
        name: &str,
        source: &Value,
        options: Option<&Options>,
    ) -> Result<Value, TransformError> {
        transform::transform(&self.registry, &self.base_options, name, source, options)
    }

    /// Read a JSON:API document back into objects grouped by type.
    ///
    /// # Errors
    ///
    /// Returns `UntransformError` for invalid documents, unregistered types,
    /// failing hooks, and cycles that cannot be nested.
    pub fn untransform(
        &self,
        document: &Value,
        options: UntransformOptions,
    ) -> Result<Buckets, UntransformError> {
        untransform::untransform(&self.registry, &self.base_options, document, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn url_schema() -> Schema {
        Schema::builder()
            .links(|ctx| {
                let url = ctx.options()["url"].as_str().unwrap_or_default();
                Ok(json!({ "self": format!("{}/things/{}", url, ctx.id().unwrap_or_default()) }))
            })
            .build()
    }

    #[test]
    fn engines_are_independent() {
        let mut first = Engine::new();
        let second = Engine::new();
        first.register("thing", Schema::builder().build()).unwrap();

        assert!(first.get_schema("thing").is_some());
        assert!(second.get_schema("thing").is_none());
    }

    #[test]
    fn call_options_override_base_options() {
        let mut engine = Engine::with_options(options(json!({ "url": "https://a" })));
        engine.register("thing", url_schema()).unwrap();

        let doc = engine.transform("thing", &json!({ "id": 1 }), None).unwrap();
        assert_eq!(doc["data"]["links"]["self"], "https://a/things/1");

        let call = options(json!({ "url": "https://b" }));
        let doc = engine
            .transform("thing", &json!({ "id": 1 }), Some(&call))
            .unwrap();
        assert_eq!(doc["data"]["links"]["self"], "https://b/things/1");
    }

    #[test]
    fn schema_options_sit_between_base_and_call() {
        let mut engine = Engine::with_options(options(json!({ "url": "https://a" })));
        engine
            .register_with_options("thing", url_schema(), options(json!({ "url": "https://s" })))
            .unwrap();

        let doc = engine.transform("thing", &json!({ "id": 1 }), None).unwrap();
        assert_eq!(doc["data"]["links"]["self"], "https://s/things/1");
    }
}
