//! JSON:API Graph
//!
//! Schema-driven transformation of application object graphs to and from
//! JSON:API documents.
//!
//! Behaviour per resource type is supplied as a [`Schema`]: a small set of
//! named hooks (`type`, `id`, `attributes`, relationships, `links`, `meta`,
//! and their reverse-direction counterparts). The engine expands
//! relationships, side-loads each related resource at most once, and can
//! read a document back into per-type objects, optionally re-linking them
//! into a nested graph with cycles cut.
//!
//! # Example
//!
//! ```
//! use jsonapi_graph::{Engine, Schema};
//! use serde_json::json;
//!
//! let mut engine = Engine::new();
//! engine
//!     .register(
//!         "article",
//!         Schema::builder()
//!             .attributes(|ctx| Ok(json!({ "title": ctx.data()["title"] })))
//!             .relationship("author", |ctx| {
//!                 Ok(json!({
//!                     "data": { "name": "user", "data": ctx.data()["author"], "included": true }
//!                 }))
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//! engine
//!     .register(
//!         "user",
//!         Schema::builder()
//!             .attributes(|ctx| Ok(json!({ "name": ctx.data()["name"] })))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let source = json!({ "id": 1, "title": "T", "author": { "id": 2, "name": "A" } });
//! let doc = engine.transform("article", &source, None).unwrap();
//!
//! assert_eq!(
//!     doc["data"],
//!     json!({
//!         "type": "article",
//!         "id": "1",
//!         "attributes": { "title": "T" },
//!         "relationships": { "author": { "data": { "type": "user", "id": "2" } } }
//!     })
//! );
//! assert_eq!(
//!     doc["included"],
//!     json!([{ "type": "user", "id": "2", "attributes": { "name": "A" } }])
//! );
//! ```
//!
//! # Relationship hooks
//!
//! A relationship hook returns `{ data?, links?, meta? }`. `data` holds one
//! item or an array of items of the form
//! `{ name, data, included?, meta?, links? }`, where `name` is the schema of
//! the related object and `data` the related raw object.
//!
//! | Hook result | Effect |
//! |-------------|--------|
//! | not an object, `{}` | relationship omitted |
//! | `{ "data": null }` | `{ "data": null }` (empty to-one) |
//! | `{ "data": 1, "meta": {...} }` | `data` dropped, `meta` kept |
//! | item with `"included": true` | identifier emitted, body side-loaded once |
//!
//! A hook can also side-load without emitting an identifier by calling
//! [`HookContext::include`] with a schema name and a raw object; it shares
//! the same once-per-`(type, id)` bookkeeping.
//!
//! # Reading documents back
//!
//! [`Engine::untransform`] returns objects grouped by type. With
//! [`UntransformOptions::nest_included`], `{ id }` placeholders are replaced
//! by the matching objects; with
//! [`UntransformOptions::remove_circular_dependencies`], edges that close a
//! cycle are left as `{ id }` stubs.

mod engine;
mod error;
mod graph;
mod include;
mod loader;
mod registry;
mod schema;
mod transform;
mod types;
mod untransform;
mod validator;

pub use engine::Engine;
pub use error::{
    DocumentViolation, HookError, LoadError, SchemaError, TransformError, UntransformError,
};
pub use graph::Buckets;
pub use loader::{is_url, load_document, load_document_auto, load_document_str};
pub use registry::{Registry, RegistryEntry};
pub use schema::{
    DataSchemaContext, DataSchemaHook, DocumentContext, DocumentHook, HookContext, HookResult,
    ResourceHook, Schema, SchemaBuilder, TransformState, UntransformContext,
    UntransformDataSchemaHook, UntransformHook,
};
pub use types::{
    is_plain_object, json_type_name, merge_options, Options, UntransformOptions, JSONAPI_VERSION,
};
pub use validator::validate_document;

#[cfg(feature = "remote")]
pub use loader::load_document_url;
