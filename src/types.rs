//! Core types shared by the forward and reverse transformers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON:API version advertised in every produced document.
pub const JSONAPI_VERSION: &str = "1.0";

/// Option bag handed to every hook.
///
/// Engine, schema and call options are merged key by key before a
/// resource is built; later layers win.
pub type Options = Map<String, Value>;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True for JSON objects (not arrays, not null).
///
/// This is the sole inclusion test for hook results: attributes, links and
/// meta are attached only when the hook produced an object.
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object()
}

/// Shallow merge of option layers, later layers overwriting earlier keys.
pub fn merge_options<'a, I>(layers: I) -> Options
where
    I: IntoIterator<Item = Option<&'a Options>>,
{
    let mut merged = Options::new();
    for layer in layers.into_iter().flatten() {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Options for the reverse transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UntransformOptions {
    /// Also untransform every entry of `document.included`.
    pub untransform_included: bool,
    /// Replace `{ id }` relationship placeholders with the bucketed objects.
    ///
    /// The output is an owned tree, so a document whose relationships form
    /// a cycle cannot be nested as is: without `remove_circular_dependencies`
    /// such a document fails with `UntransformError::CircularReference`.
    pub nest_included: bool,
    /// Cut circular references in the nested graph with `{ id }` stubs.
    /// Only meaningful together with `nest_included`.
    ///
    /// Nodes are marked when they are scheduled for a visit, not only while
    /// they are ancestors. Besides genuine back-edges this also stubs an
    /// edge into a sibling that is still waiting its turn: with
    /// `root -> [a, b]` and `a -> b`, `a.b` becomes `{ id }` while
    /// `root`'s own `b` slot is nested in full.
    pub remove_circular_dependencies: bool,
}

impl UntransformOptions {
    /// Options with everything disabled: primary data only, flat output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether included resources are untransformed.
    pub fn untransform_included(mut self, enabled: bool) -> Self {
        self.untransform_included = enabled;
        self
    }

    /// Set whether relationship placeholders are nested.
    pub fn nest_included(mut self, enabled: bool) -> Self {
        self.nest_included = enabled;
        self
    }

    /// Set whether circular references are replaced with stubs.
    pub fn remove_circular_dependencies(mut self, enabled: bool) -> Self {
        self.remove_circular_dependencies = enabled;
        self
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

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
        assert_eq!(json_type_name(&json!("x")), "string");
    }

    #[test]
    fn plain_object_excludes_arrays_and_null() {
        assert!(is_plain_object(&json!({})));
        assert!(is_plain_object(&json!({ "a": 1 })));
        assert!(!is_plain_object(&json!([])));
        assert!(!is_plain_object(&json!(null)));
        assert!(!is_plain_object(&json!("object")));
    }

    #[test]
    fn merge_options_later_layers_win() {
        let base = options(json!({ "url": "https://a", "count": 0 }));
        let schema = options(json!({ "count": 1 }));
        let call = options(json!({ "url": "https://b" }));

        let merged = merge_options([Some(&base), Some(&schema), Some(&call)]);
        assert_eq!(merged["url"], "https://b");
        assert_eq!(merged["count"], 1);
    }

    #[test]
    fn merge_options_skips_missing_layers() {
        let base = options(json!({ "url": "https://a" }));
        let merged = merge_options([Some(&base), None, None]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn untransform_options_builder() {
        let opts = UntransformOptions::new()
            .untransform_included(true)
            .nest_included(true);
        assert!(opts.untransform_included);
        assert!(opts.nest_included);
        assert!(!opts.remove_circular_dependencies);
    }

    #[test]
    fn untransform_options_from_camel_case_json() {
        let opts: UntransformOptions =
            serde_json::from_value(json!({ "nestIncluded": true })).unwrap();
        assert!(opts.nest_included);
        assert!(!opts.untransform_included);
    }
}
