//! Error types for schema registration, transformation and document loading.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::types::json_type_name;

/// Error returned by a caller-supplied hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid \"name\" property: expected a non-empty string")]
    InvalidName,

    #[error("invalid \"{property}\" property on schema '{name}': {message}")]
    InvalidSchemaProperty {
        name: String,
        property: String,
        message: String,
    },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors during the forward transform (objects to document).
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid \"name\" property: expected a non-empty string")]
    InvalidName,

    #[error("missing schema: {name}")]
    MissingSchema { name: String },

    #[error("invalid type from schema '{schema}': expected string, got {}", json_type_name(.value))]
    InvalidType {
        schema: String,
        value: Value,
        data: Value,
    },

    #[error("invalid id from schema '{schema}': expected string, got {}", json_type_name(.value))]
    InvalidId {
        schema: String,
        value: Value,
        data: Value,
    },

    #[error("missing relationship data in '{relationship}' of schema '{schema}'")]
    MissingRelationshipData {
        schema: String,
        relationship: String,
        item: Value,
    },

    #[error("hook '{hook}' of schema '{schema}' failed: {source}")]
    Hook {
        schema: String,
        hook: String,
        #[source]
        source: HookError,
    },
}

impl TransformError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// A structural violation found in a JSON:API document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentViolation {
    #[error("document must be an object")]
    NotAnObject,

    #[error("document must contain at least one of \"data\", \"errors\" or \"meta\"")]
    MissingTopLevelMember,

    #[error("document must not contain both \"data\" and \"errors\"")]
    DataAndErrors,

    #[error("document must not contain \"included\" without \"data\"")]
    IncludedWithoutData,

    #[error("primary data must be an object, an array or null")]
    InvalidData,

    #[error("\"included\" must be an array")]
    InvalidIncluded,

    #[error("resource must be an object")]
    ResourceNotAnObject,

    #[error("resource must have a non-empty string \"type\"")]
    MissingType,

    #[error("resource \"id\" must be a string")]
    InvalidId,

    #[error("included resource must have a string \"id\"")]
    MissingId,

    #[error("resource \"attributes\" must be an object")]
    InvalidAttributes,

    #[error("resource \"relationships\" must be an object")]
    InvalidRelationships,

    #[error("relationship must be an object")]
    RelationshipNotAnObject,

    #[error("relationship must have a \"data\" member")]
    MissingRelationshipData,

    #[error("resource identifier must have a string \"id\" and a non-empty string \"type\"")]
    InvalidIdentifier,
}

/// Errors during the reverse transform (document to objects).
#[derive(Debug, Error)]
pub enum UntransformError {
    #[error("invalid document at {path}: {violation}")]
    InvalidDocument {
        path: String,
        violation: DocumentViolation,
    },

    #[error("missing schema: {name}")]
    MissingSchema { name: String },

    #[error("circular reference at {resource_type}:{id}; enable circular dependency removal to nest this graph")]
    CircularReference { resource_type: String, id: String },

    #[error("hook '{hook}' of schema '{schema}' failed: {source}")]
    Hook {
        schema: String,
        hook: String,
        #[source]
        source: HookError,
    },
}

impl UntransformError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            UntransformError::InvalidDocument { .. } => 1,
            _ => 2,
        }
    }
}

/// Errors while loading a document from a file, string or URL.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("doc.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let source = serde_json::from_str::<Value>("nope").unwrap_err();
        let err = LoadError::InvalidJson { source };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn untransform_error_exit_codes() {
        let err = UntransformError::InvalidDocument {
            path: "/data".into(),
            violation: DocumentViolation::MissingType,
        };
        assert_eq!(err.exit_code(), 1);

        let err = UntransformError::MissingSchema {
            name: "book".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn invalid_document_display() {
        let err = UntransformError::InvalidDocument {
            path: "/included/0".into(),
            violation: DocumentViolation::MissingId,
        };
        assert_eq!(
            err.to_string(),
            "invalid document at /included/0: included resource must have a string \"id\""
        );
    }

    #[test]
    fn invalid_type_names_returned_json_type() {
        let err = TransformError::InvalidType {
            schema: "article".into(),
            value: json!(false),
            data: json!({}),
        };
        assert_eq!(
            err.to_string(),
            "invalid type from schema 'article': expected string, got boolean"
        );
    }

    #[test]
    fn schema_property_error_names_field() {
        let err = SchemaError::InvalidSchemaProperty {
            name: "book".into(),
            property: "data.relationships.author".into(),
            message: "duplicate relationship".into(),
        };
        assert!(err.to_string().contains("\"data.relationships.author\""));
    }
}
