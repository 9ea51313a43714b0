//! Reverse transform - a JSON:API document back into plain objects.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::UntransformError;
use crate::graph::{Buckets, NodeBuilder, ResourceGraph, Target};
use crate::registry::{Registry, RegistryEntry};
use crate::schema::UntransformContext;
use crate::types::{merge_options, Options, UntransformOptions};
use crate::validator::validate_document;

/// Read `document` back into objects grouped by resource type.
///
/// Each resource becomes `{ id, ...attributes }` with every relationship
/// reduced to `{ id }` placeholders (or an array of them). See
/// [`UntransformOptions`] for side-loaded resources, nesting and cycle
/// removal.
///
/// # Errors
///
/// Returns `UntransformError::InvalidDocument` for structurally invalid
/// documents, `MissingSchema` for unregistered resource types, and
/// `Hook` when a hook fails.
pub(crate) fn untransform(
    registry: &Registry,
    base_options: &Options,
    document: &Value,
    options: UntransformOptions,
) -> Result<Buckets, UntransformError> {
    validate_document(document)?;

    // hooks see the flags alongside the engine options
    let flags = match serde_json::to_value(options) {
        Ok(Value::Object(flags)) => Some(flags),
        _ => None,
    };
    let reader = Reader {
        registry,
        base_options,
        flags,
        document,
    };

    let mut graph = ResourceGraph::new();
    match document.get("data") {
        Some(Value::Array(resources)) => {
            for resource in resources {
                graph.push_primary(reader.untransform_resource(resource)?);
            }
        }
        Some(resource @ Value::Object(_)) => {
            graph.push_primary(reader.untransform_resource(resource)?);
        }
        _ => {}
    }

    if options.untransform_included {
        if let Some(Value::Array(resources)) = document.get("included") {
            for resource in resources {
                graph.push_included(reader.untransform_resource(resource)?);
            }
        }
    }

    debug!(
        nest = options.nest_included,
        remove_circular = options.remove_circular_dependencies,
        "untransformed document"
    );
    graph.into_buckets(
        options.nest_included,
        options.remove_circular_dependencies,
    )
}

/// State for a single `untransform` call.
struct Reader<'r> {
    registry: &'r Registry,
    base_options: &'r Options,
    flags: Option<Options>,
    document: &'r Value,
}

impl<'r> Reader<'r> {
    fn lookup(&self, name: &str) -> Result<&'r RegistryEntry, UntransformError> {
        self.registry
            .get(name)
            .ok_or_else(|| UntransformError::MissingSchema {
                name: name.to_string(),
            })
    }

    fn options_for(&self, entry: &RegistryEntry) -> Options {
        merge_options([
            Some(self.base_options),
            entry.options.as_ref(),
            self.flags.as_ref(),
        ])
    }

    /// Schema for a resource (or identifier) of `resource_type`, following
    /// `untransform_data_schema` redirection.
    fn schema_for(
        &self,
        resource_type: &str,
        resource: &Value,
    ) -> Result<&'r RegistryEntry, UntransformError> {
        let entry = self.lookup(resource_type)?;
        let Some(hook) = &entry.schema.untransform_data_schema else {
            return Ok(entry);
        };
        let options = self.options_for(entry);
        let ctx = UntransformContext {
            resource_type,
            resource,
            document: self.document,
            options: &options,
        };
        let name = hook(&ctx).map_err(|source| UntransformError::Hook {
            schema: entry.name.clone(),
            hook: "untransformDataSchema".to_string(),
            source,
        })?;
        if name == entry.name {
            return Ok(entry);
        }
        trace!(from = %entry.name, to = %name, "dispatching to schema");
        self.lookup(&name)
    }

    /// The output id for a resource or identifier: the `untransform_id`
    /// hook's result, falling back to the JSON:API id.
    fn untransform_id(
        &self,
        entry: &RegistryEntry,
        resource_type: &str,
        resource: &Value,
    ) -> Result<Value, UntransformError> {
        let fallback = || resource.get("id").cloned().unwrap_or(Value::Null);
        let Some(hook) = &entry.schema.untransform_id else {
            return Ok(fallback());
        };
        let options = self.options_for(entry);
        let ctx = UntransformContext {
            resource_type,
            resource,
            document: self.document,
            options: &options,
        };
        let id = hook(&ctx).map_err(|source| UntransformError::Hook {
            schema: entry.name.clone(),
            hook: "untransformId".to_string(),
            source,
        })?;
        Ok(if id.is_null() { fallback() } else { id })
    }

    fn untransform_attributes(
        &self,
        entry: &RegistryEntry,
        resource_type: &str,
        resource: &Value,
    ) -> Result<Value, UntransformError> {
        let fallback = || resource.get("attributes").cloned().unwrap_or(Value::Null);
        let Some(hook) = &entry.schema.untransform_attributes else {
            return Ok(fallback());
        };
        let options = self.options_for(entry);
        let ctx = UntransformContext {
            resource_type,
            resource,
            document: self.document,
            options: &options,
        };
        let attributes = hook(&ctx).map_err(|source| UntransformError::Hook {
            schema: entry.name.clone(),
            hook: "untransformAttributes".to_string(),
            source,
        })?;
        Ok(if attributes.is_null() {
            fallback()
        } else {
            attributes
        })
    }

    /// Build the `{ id }` placeholder for one resource identifier.
    fn placeholder(&self, identifier: &Value) -> Result<(Value, Target), UntransformError> {
        // identifiers are validated to carry string type and id
        let resource_type = identifier["type"].as_str().unwrap_or_default();
        let resource_id = identifier["id"].as_str().unwrap_or_default();
        let entry = self.schema_for(resource_type, identifier)?;
        let id = self.untransform_id(entry, resource_type, identifier)?;

        let mut placeholder = Map::new();
        placeholder.insert("id".to_string(), id);
        let target = Target {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        };
        Ok((Value::Object(placeholder), target))
    }

    fn untransform_resource(&self, resource: &Value) -> Result<NodeBuilder, UntransformError> {
        let resource_type = resource["type"].as_str().unwrap_or_default();
        let resource_id = resource.get("id").and_then(Value::as_str);
        let entry = self.schema_for(resource_type, resource)?;
        trace!(%resource_type, id = ?resource_id, schema = %entry.name, "untransforming resource");

        let mut object = Map::new();
        let id = self.untransform_id(entry, resource_type, resource)?;
        if !id.is_null() {
            object.insert("id".to_string(), id);
        }
        let attributes = self.untransform_attributes(entry, resource_type, resource)?;
        if let Value::Object(attributes) = attributes {
            object.extend(attributes);
        }

        let mut node = NodeBuilder::new(resource_type, resource_id, object);
        if let Some(Value::Object(relationships)) = resource.get("relationships") {
            for (rel_name, relationship) in relationships {
                match relationship.get("data") {
                    Some(Value::Array(identifiers)) => {
                        let slots = identifiers
                            .iter()
                            .map(|identifier| self.placeholder(identifier))
                            .collect::<Result<Vec<_>, _>>()?;
                        node.relate_many(rel_name, slots);
                    }
                    Some(identifier @ Value::Object(_)) => {
                        let (placeholder, target) = self.placeholder(identifier)?;
                        node.relate_one(rel_name, placeholder, target);
                    }
                    _ => node.relate_none(rel_name),
                }
            }
        }
        Ok(node)
    }
}
