//! Structural validation of JSON:API documents before they are read back.

use serde_json::{Map, Value};

use crate::error::{DocumentViolation, UntransformError};

/// Validate the structure of a JSON:API document.
///
/// Checks the top-level members, then every primary and included resource:
/// non-empty string `type`, string `id` (required for included resources), object
/// `attributes`, and `relationships` whose entries carry `data` made of
/// identifiers with string `id` and non-empty string `type`.
///
/// # Errors
///
/// Returns `UntransformError::InvalidDocument` with the JSON Pointer of the
/// first violation found.
pub fn validate_document(document: &Value) -> Result<(), UntransformError> {
    let Value::Object(doc) = document else {
        return Err(violation("", DocumentViolation::NotAnObject));
    };

    let has_data = doc.contains_key("data");
    let has_errors = doc.contains_key("errors");
    if !has_data && !has_errors && !doc.contains_key("meta") {
        return Err(violation("", DocumentViolation::MissingTopLevelMember));
    }
    if has_data && has_errors {
        return Err(violation("", DocumentViolation::DataAndErrors));
    }
    if doc.contains_key("included") && !has_data {
        return Err(violation("/included", DocumentViolation::IncludedWithoutData));
    }

    match doc.get("data") {
        None | Some(Value::Null) => {}
        Some(resource @ Value::Object(_)) => validate_resource(resource, "/data", false)?,
        Some(Value::Array(resources)) => {
            for (i, resource) in resources.iter().enumerate() {
                validate_resource(resource, &format!("/data/{}", i), false)?;
            }
        }
        Some(_) => return Err(violation("/data", DocumentViolation::InvalidData)),
    }

    match doc.get("included") {
        None => {}
        Some(Value::Array(resources)) => {
            for (i, resource) in resources.iter().enumerate() {
                validate_resource(resource, &format!("/included/{}", i), true)?;
            }
        }
        Some(_) => return Err(violation("/included", DocumentViolation::InvalidIncluded)),
    }

    Ok(())
}

fn violation(path: &str, violation: DocumentViolation) -> UntransformError {
    UntransformError::InvalidDocument {
        path: path.to_string(),
        violation,
    }
}

fn validate_resource(
    resource: &Value,
    path: &str,
    require_id: bool,
) -> Result<(), UntransformError> {
    let Value::Object(resource) = resource else {
        return Err(violation(path, DocumentViolation::ResourceNotAnObject));
    };

    if !is_resource_type(resource.get("type")) {
        return Err(violation(
            &format!("{}/type", path),
            DocumentViolation::MissingType,
        ));
    }

    match resource.get("id") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(violation(&format!("{}/id", path), DocumentViolation::InvalidId));
        }
        None if require_id => {
            return Err(violation(&format!("{}/id", path), DocumentViolation::MissingId));
        }
        None => {}
    }

    if let Some(attributes) = resource.get("attributes") {
        if !attributes.is_object() {
            return Err(violation(
                &format!("{}/attributes", path),
                DocumentViolation::InvalidAttributes,
            ));
        }
    }

    if let Some(relationships) = resource.get("relationships") {
        let Value::Object(relationships) = relationships else {
            return Err(violation(
                &format!("{}/relationships", path),
                DocumentViolation::InvalidRelationships,
            ));
        };
        validate_relationships(relationships, &format!("{}/relationships", path))?;
    }

    Ok(())
}

fn validate_relationships(
    relationships: &Map<String, Value>,
    path: &str,
) -> Result<(), UntransformError> {
    for (name, relationship) in relationships {
        let rel_path = format!("{}/{}", path, name);
        let Value::Object(relationship) = relationship else {
            return Err(violation(&rel_path, DocumentViolation::RelationshipNotAnObject));
        };
        let data_path = format!("{}/data", rel_path);
        match relationship.get("data") {
            None => {
                return Err(violation(&rel_path, DocumentViolation::MissingRelationshipData));
            }
            Some(Value::Null) => {}
            Some(Value::Array(identifiers)) => {
                for (i, identifier) in identifiers.iter().enumerate() {
                    validate_identifier(identifier, &format!("{}/{}", data_path, i))?;
                }
            }
            Some(identifier) => validate_identifier(identifier, &data_path)?,
        }
    }
    Ok(())
}

fn validate_identifier(identifier: &Value, path: &str) -> Result<(), UntransformError> {
    let valid = matches!(identifier.get("id"), Some(Value::String(_)))
        && is_resource_type(identifier.get("type"));
    if valid {
        Ok(())
    } else {
        Err(violation(path, DocumentViolation::InvalidIdentifier))
    }
}

// an empty type can never name a registered schema
fn is_resource_type(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(resource_type)) if !resource_type.is_empty())
}
