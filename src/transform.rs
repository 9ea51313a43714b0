//! Forward transform - raw objects into a JSON:API document.

use std::cell::RefCell;

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::error::TransformError;
use crate::include::IncludeSet;
use crate::registry::{Registry, RegistryEntry};
use crate::schema::{DataSchemaContext, DocumentContext, HookContext, Includer, ResourceHook};
use crate::types::{is_plain_object, merge_options, Options, JSONAPI_VERSION};

/// Build a document from `source` using the schema registered as `name`.
///
/// `source` may be a single object or an array; primary `data` mirrors
/// that shape. Related resources requested with `included: true`, or
/// through [`HookContext::include`], are side-loaded at most once each.
///
/// # Errors
///
/// Returns `TransformError` for unknown schema names, non-string types or
/// ids, relationship items without data, and failing hooks.
pub(crate) fn transform(
    registry: &Registry,
    base_options: &Options,
    name: &str,
    source: &Value,
    call_options: Option<&Options>,
) -> Result<Value, TransformError> {
    if name.is_empty() {
        return Err(TransformError::InvalidName);
    }
    let entry = registry
        .get(name)
        .ok_or_else(|| TransformError::MissingSchema {
            name: name.to_string(),
        })?;
    debug!(name, "transforming source");

    let transformer = Transformer {
        registry,
        base_options,
        call_options,
        source,
        included: RefCell::new(IncludeSet::new()),
    };

    let data = match source {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| transformer.transform_data(entry, item, None))
                .collect::<Result<_, _>>()?,
        ),
        other => transformer.transform_data(entry, other, None)?,
    };
    let included = transformer.included.into_inner().into_resources();

    let options = merge_options([Some(base_options), entry.options.as_ref(), call_options]);
    let ctx = DocumentContext {
        source,
        options: &options,
        data: &data,
        included: &included,
    };

    let mut document = Map::new();
    document.insert("jsonapi".to_string(), json!({ "version": JSONAPI_VERSION }));

    if let Some(hook) = &entry.schema.document_links {
        let links = hook(&ctx).map_err(|source| TransformError::Hook {
            schema: entry.name.clone(),
            hook: "links".to_string(),
            source,
        })?;
        if is_plain_object(&links) {
            document.insert("links".to_string(), links);
        }
    }
    if let Some(hook) = &entry.schema.document_meta {
        let meta = hook(&ctx).map_err(|source| TransformError::Hook {
            schema: entry.name.clone(),
            hook: "meta".to_string(),
            source,
        })?;
        if is_plain_object(&meta) {
            document.insert("meta".to_string(), meta);
        }
    }

    debug!(name, included = included.len(), "transformed source");
    document.insert("data".to_string(), data);
    if !included.is_empty() {
        document.insert("included".to_string(), Value::Array(included));
    }
    Ok(Value::Object(document))
}

/// State for a single `transform` call.
///
/// The include set is only borrowed for a mark or a push, never across a
/// hook call, so hooks may side-load through their context while the
/// resource that runs them is still being built.
struct Transformer<'r> {
    registry: &'r Registry,
    base_options: &'r Options,
    call_options: Option<&'r Options>,
    source: &'r Value,
    included: RefCell<IncludeSet>,
}

impl<'r> Transformer<'r> {
    fn lookup(&self, name: &str) -> Result<&'r RegistryEntry, TransformError> {
        self.registry
            .get(name)
            .ok_or_else(|| TransformError::MissingSchema {
                name: name.to_string(),
            })
    }

    fn options_for(&self, entry: &RegistryEntry) -> Options {
        merge_options([
            Some(self.base_options),
            entry.options.as_ref(),
            self.call_options,
        ])
    }

    /// Switch to the schema chosen by `data_schema`, if the entry has one.
    fn dispatch(
        &self,
        entry: &'r RegistryEntry,
        data: &Value,
    ) -> Result<&'r RegistryEntry, TransformError> {
        let Some(hook) = &entry.schema.data_schema else {
            return Ok(entry);
        };
        let options = self.options_for(entry);
        let ctx = DataSchemaContext {
            source: self.source,
            data,
            options: &options,
        };
        let name = hook(&ctx).map_err(|source| TransformError::Hook {
            schema: entry.name.clone(),
            hook: "dataSchema".to_string(),
            source,
        })?;
        if name == entry.name {
            return Ok(entry);
        }
        trace!(from = %entry.name, to = %name, "dispatching to schema");
        self.lookup(&name)
    }

    /// Build one resource. `forced` carries a type and id already computed
    /// for its identifier so the included body agrees with it.
    fn transform_data(
        &self,
        entry: &'r RegistryEntry,
        data: &Value,
        forced: Option<(String, String)>,
    ) -> Result<Value, TransformError> {
        let entry = self.dispatch(entry, data)?;
        let schema = &entry.schema;
        let options = self.options_for(entry);
        let mut ctx = HookContext::new(self.source, &options, data).with_includer(self);

        let (resource_type, id) = match forced {
            Some(pair) => pair,
            None => {
                let resource_type = resolve_type(entry, &mut ctx)?;
                ctx.resource_type = Some(resource_type.clone());
                let id = resolve_id(entry, &mut ctx)?;
                (resource_type, id)
            }
        };
        ctx.resource_type = Some(resource_type.clone());
        ctx.id = Some(id.clone());
        trace!(%resource_type, %id, schema = %entry.name, "building resource");

        if let Some(hook) = &schema.attributes {
            ctx.attributes = Some(call_hook(entry, "attributes", hook, &mut ctx)?);
        }

        if !schema.relationships.is_empty() {
            let mut relationships = Map::new();
            for (rel_name, hook) in &schema.relationships {
                let result = call_hook(entry, rel_name, hook, &mut ctx)?;
                if let Some(relationship) = self.build_relationship(entry, rel_name, result)? {
                    relationships.insert(rel_name.clone(), relationship);
                }
            }
            if !relationships.is_empty() {
                ctx.relationships = Some(relationships);
            }
        }

        if let Some(hook) = &schema.links {
            ctx.links = Some(call_hook(entry, "links", hook, &mut ctx)?);
        }
        let meta = match &schema.meta {
            Some(hook) => Some(call_hook(entry, "meta", hook, &mut ctx)?),
            None => None,
        };

        let mut resource = Map::new();
        resource.insert("type".to_string(), Value::String(resource_type));
        resource.insert("id".to_string(), Value::String(id));
        if let Some(attributes) = ctx.attributes.take().filter(is_plain_object) {
            resource.insert("attributes".to_string(), attributes);
        }
        if let Some(relationships) = ctx.relationships.take() {
            resource.insert("relationships".to_string(), Value::Object(relationships));
        }
        if let Some(meta) = meta.filter(is_plain_object) {
            resource.insert("meta".to_string(), meta);
        }
        if let Some(links) = ctx.links.take().filter(is_plain_object) {
            resource.insert("links".to_string(), links);
        }
        Ok(Value::Object(resource))
    }

    /// Turn a relationship hook result into a relationship object.
    ///
    /// Returns `None` when nothing usable is left: the hook returned a
    /// non-object, or none of `data`, `links`, `meta` survived.
    fn build_relationship(
        &self,
        entry: &RegistryEntry,
        rel_name: &str,
        result: Value,
    ) -> Result<Option<Value>, TransformError> {
        let Value::Object(result) = result else {
            return Ok(None);
        };

        let mut relationship = Map::new();
        match result.get("data") {
            Some(Value::Array(items)) => {
                let identifiers = items
                    .iter()
                    .map(|item| self.transform_relationship_data(entry, rel_name, item))
                    .collect::<Result<Vec<_>, _>>()?;
                relationship.insert("data".to_string(), Value::Array(identifiers));
            }
            Some(Value::Null) => {
                relationship.insert("data".to_string(), Value::Null);
            }
            Some(item @ Value::Object(_)) => {
                let identifier = self.transform_relationship_data(entry, rel_name, item)?;
                relationship.insert("data".to_string(), identifier);
            }
            // absent, or a scalar: no data member
            _ => {}
        }
        if let Some(links) = result.get("links").filter(|v| is_plain_object(v)) {
            relationship.insert("links".to_string(), links.clone());
        }
        if let Some(meta) = result.get("meta").filter(|v| is_plain_object(v)) {
            relationship.insert("meta".to_string(), meta.clone());
        }

        if relationship.is_empty() {
            trace!(relationship = rel_name, "omitting empty relationship");
            return Ok(None);
        }
        Ok(Some(Value::Object(relationship)))
    }

    /// Resolve one relationship item `{ name, data, included?, meta?, links? }`
    /// to a resource identifier, side-loading the full resource on request.
    fn transform_relationship_data(
        &self,
        parent: &RegistryEntry,
        rel_name: &str,
        item: &Value,
    ) -> Result<Value, TransformError> {
        let entry = match item.get("name") {
            Some(Value::String(name)) => self.lookup(name)?,
            other => {
                return Err(TransformError::MissingSchema {
                    name: other.map_or_else(|| "undefined".to_string(), Value::to_string),
                })
            }
        };
        let data = match item.get("data") {
            Some(data) if !data.is_null() => data,
            _ => {
                return Err(TransformError::MissingRelationshipData {
                    schema: parent.name.clone(),
                    relationship: rel_name.to_string(),
                    item: item.clone(),
                })
            }
        };

        let (resource_type, id) = self.identify(entry, data)?;

        let mut identifier = Map::new();
        identifier.insert("type".to_string(), Value::String(resource_type.clone()));
        identifier.insert("id".to_string(), Value::String(id.clone()));
        if let Some(meta) = item.get("meta").filter(|v| is_plain_object(v)) {
            identifier.insert("meta".to_string(), meta.clone());
        }
        if let Some(links) = item.get("links").filter(|v| is_plain_object(v)) {
            identifier.insert("links".to_string(), links.clone());
        }

        if item.get("included").and_then(Value::as_bool) == Some(true) {
            self.side_load(entry, data, resource_type, id)?;
        }

        Ok(Value::Object(identifier))
    }

    /// Type and id of the resource `entry` would build from `data`.
    fn identify(
        &self,
        entry: &RegistryEntry,
        data: &Value,
    ) -> Result<(String, String), TransformError> {
        let options = self.options_for(entry);
        let mut ctx = HookContext::new(self.source, &options, data).with_includer(self);
        let resource_type = resolve_type(entry, &mut ctx)?;
        ctx.resource_type = Some(resource_type.clone());
        let id = resolve_id(entry, &mut ctx)?;
        Ok((resource_type, id))
    }

    /// Build and append the included body for `(resource_type, id)` unless
    /// the pair is already claimed. The pair is marked before recursing so
    /// cycles through relationships terminate.
    fn side_load(
        &self,
        entry: &'r RegistryEntry,
        data: &Value,
        resource_type: String,
        id: String,
    ) -> Result<(), TransformError> {
        let claimed = self.included.borrow_mut().mark(&resource_type, &id);
        if !claimed {
            return Ok(());
        }
        trace!(%resource_type, %id, "including related resource");
        let resource = self.transform_data(entry, data, Some((resource_type, id)))?;
        self.included.borrow_mut().push(resource);
        Ok(())
    }
}

impl Includer for Transformer<'_> {
    fn include(&self, name: &str, data: &Value) -> Result<Value, TransformError> {
        let entry = self.lookup(name)?;
        let (resource_type, id) = self.identify(entry, data)?;
        let identifier = json!({ "type": resource_type, "id": id });
        self.side_load(entry, data, resource_type, id)?;
        Ok(identifier)
    }

    fn is_included(&self, resource_type: &str, id: &str) -> bool {
        self.included.borrow().contains(resource_type, id)
    }
}

fn call_hook(
    entry: &RegistryEntry,
    hook_name: &str,
    hook: &ResourceHook,
    ctx: &mut HookContext<'_>,
) -> Result<Value, TransformError> {
    hook(ctx).map_err(|source| TransformError::Hook {
        schema: entry.name.clone(),
        hook: hook_name.to_string(),
        source,
    })
}

fn resolve_type(
    entry: &RegistryEntry,
    ctx: &mut HookContext<'_>,
) -> Result<String, TransformError> {
    let value = match &entry.schema.resource_type {
        Some(hook) => call_hook(entry, "type", hook, ctx)?,
        None => Value::String(entry.name.clone()),
    };
    match value {
        Value::String(resource_type) => Ok(resource_type),
        other => Err(TransformError::InvalidType {
            schema: entry.name.clone(),
            value: other,
            data: ctx.data().clone(),
        }),
    }
}

fn resolve_id(
    entry: &RegistryEntry,
    ctx: &mut HookContext<'_>,
) -> Result<String, TransformError> {
    let value = match &entry.schema.id {
        Some(hook) => call_hook(entry, "id", hook, ctx)?,
        None => Value::Null,
    };
    match value {
        Value::String(id) => Ok(id),
        other => Err(TransformError::InvalidId {
            schema: entry.name.clone(),
            value: other,
            data: ctx.data().clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn registry_with(schemas: Vec<(&str, Schema)>) -> Registry {
        let mut registry = Registry::new();
        for (name, schema) in schemas {
            registry.register(name, schema, None).unwrap();
        }
        registry
    }

    fn run(registry: &Registry, name: &str, source: Value) -> Result<Value, TransformError> {
        transform(registry, &Options::new(), name, &source, None)
    }

    #[test]
    fn minimal_document() {
        let registry = registry_with(vec![("foo", Schema::builder().build())]);
        let doc = run(&registry, "foo", json!({ "id": 1 })).unwrap();

        assert_eq!(
            doc,
            json!({
                "jsonapi": { "version": "1.0" },
                "data": { "type": "foo", "id": "1" }
            })
        );
    }

    #[test]
    fn array_source_yields_array_data() {
        let registry = registry_with(vec![("foo", Schema::builder().build())]);
        let doc = run(&registry, "foo", json!([{ "id": 1 }, { "id": 2 }])).unwrap();
        assert_eq!(doc["data"].as_array().unwrap().len(), 2);
        assert_eq!(doc["data"][1]["id"], "2");
    }

    #[test]
    fn empty_name_is_invalid() {
        let registry = Registry::new();
        assert!(matches!(
            run(&registry, "", json!({})),
            Err(TransformError::InvalidName)
        ));
    }

    #[test]
    fn unknown_name_is_missing_schema() {
        let registry = Registry::new();
        assert!(matches!(
            run(&registry, "missing", json!({})),
            Err(TransformError::MissingSchema { name }) if name == "missing"
        ));
    }

    #[test]
    fn non_string_type_fails() {
        let registry = registry_with(vec![(
            "invalid-type",
            Schema::builder().resource_type(|_| Ok(json!(false))).build(),
        )]);
        assert!(matches!(
            run(&registry, "invalid-type", json!({})),
            Err(TransformError::InvalidType { .. })
        ));
    }

    #[test]
    fn non_string_id_fails() {
        let registry = registry_with(vec![(
            "invalid-id",
            Schema::builder().id(|_| Ok(json!(false))).build(),
        )]);
        assert!(matches!(
            run(&registry, "invalid-id", json!({})),
            Err(TransformError::InvalidId { value, .. }) if value == json!(false)
        ));
    }

    #[test]
    fn missing_default_id_fails() {
        let registry = registry_with(vec![("foo", Schema::builder().build())]);
        assert!(matches!(
            run(&registry, "foo", json!({ "name": "no id" })),
            Err(TransformError::InvalidId { .. })
        ));
    }

    #[test]
    fn hook_failure_propagates() {
        let registry = registry_with(vec![(
            "broken",
            Schema::builder()
                .attributes(|_| Err("database unavailable".into()))
                .build(),
        )]);
        let err = run(&registry, "broken", json!({ "id": 1 })).unwrap_err();
        match err {
            TransformError::Hook { hook, source, .. } => {
                assert_eq!(hook, "attributes");
                assert_eq!(source.to_string(), "database unavailable");
            }
            other => panic!("expected hook error, got {other:?}"),
        }
    }

    #[test]
    fn relationship_cycle_terminates() {
        let registry = registry_with(vec![
            (
                "a",
                Schema::builder()
                    .relationship("b", |ctx| {
                        Ok(json!({ "data": { "name": "b", "data": ctx.data()["b"], "included": true } }))
                    })
                    .build(),
            ),
            (
                "b",
                Schema::builder()
                    .relationship("a", |ctx| {
                        let a_id = ctx.data()["aId"].clone();
                        Ok(json!({ "data": { "name": "a", "data": { "id": a_id, "b": { "id": 2, "aId": a_id } }, "included": true } }))
                    })
                    .build(),
            ),
        ]);
        let doc = run(&registry, "a", json!({ "id": 1, "b": { "id": 2, "aId": 1 } })).unwrap();
        let included = doc["included"].as_array().unwrap();

        // a:1 is reached again through b but is side-loaded once, as is b:2
        let keys: Vec<String> = included
            .iter()
            .map(|r| format!("{}:{}", r["type"].as_str().unwrap(), r["id"].as_str().unwrap()))
            .collect();
        assert_eq!(keys, ["a:1", "b:2"]);
    }

    #[test]
    fn hook_include_marks_before_recursing() {
        let registry = registry_with(vec![(
            "a",
            Schema::builder()
                .relationship("self", |ctx| {
                    let identifier = ctx.include("a", ctx.data())?;
                    Ok(json!({ "data": null, "meta": { "target": identifier } }))
                })
                .build(),
        )]);
        let doc = run(&registry, "a", json!({ "id": 1 })).unwrap();

        // the nested build includes a:1 again, which is already claimed
        assert_eq!(doc["included"].as_array().unwrap().len(), 1);
        assert_eq!(
            doc["data"]["relationships"]["self"]["meta"]["target"],
            json!({ "type": "a", "id": "1" })
        );
    }

    #[test]
    fn scalar_relationship_data_is_dropped() {
        let registry = registry_with(vec![(
            "thing",
            Schema::builder()
                .relationship("other", |_| Ok(json!({ "data": 1, "meta": { "count": 1 } })))
                .build(),
        )]);
        let doc = run(&registry, "thing", json!({ "id": 1 })).unwrap();
        assert_eq!(
            doc["data"]["relationships"]["other"],
            json!({ "meta": { "count": 1 } })
        );
    }

    #[test]
    fn relationship_item_without_name_fails() {
        let registry = registry_with(vec![(
            "thing",
            Schema::builder()
                .relationship("other", |_| {
                    Ok(json!({ "data": { "name": 1, "data": { "id": 2 } } }))
                })
                .build(),
        )]);
        assert!(matches!(
            run(&registry, "thing", json!({ "id": 1 })),
            Err(TransformError::MissingSchema { name }) if name == "1"
        ));
    }

    #[test]
    fn relationship_item_without_data_fails() {
        let registry = registry_with(vec![(
            "thing",
            Schema::builder()
                .relationship("other", |_| Ok(json!({ "data": { "name": "thing" } })))
                .build(),
        )]);
        assert!(matches!(
            run(&registry, "thing", json!({ "id": 1 })),
            Err(TransformError::MissingRelationshipData { relationship, .. }) if relationship == "other"
        ));
    }
}
