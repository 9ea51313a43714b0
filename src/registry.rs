//! Schema registry: one validated schema per registered name.

use std::collections::HashMap;

use tracing::debug;

use crate::error::SchemaError;
use crate::schema::Schema;
use crate::types::Options;

/// A validated schema plus its schema-scoped default options.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub schema: Schema,
    /// Merged under call options for every resource this schema builds.
    pub options: Option<Options>,
}

/// Registered schemas, keyed by name.
///
/// Registration is expected to happen up front; once populated the
/// registry is only read, so it can be shared freely between calls.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `schema` and store it under `name`, replacing any previous
    /// entry with the same name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidName` for an empty name, or
    /// `SchemaError::InvalidSchemaProperty` naming the offending field.
    pub fn register(
        &mut self,
        name: &str,
        schema: Schema,
        options: Option<Options>,
    ) -> Result<(), SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::InvalidName);
        }
        let schema = schema.validated(name)?;
        debug!(name, ?schema, "registered schema");

        let replaced = self.entries.insert(
            name.to_string(),
            RegistryEntry {
                name: name.to_string(),
                schema,
                options,
            },
        );
        if replaced.is_some() {
            debug!(name, "replaced existing schema");
        }
        Ok(())
    }

    /// Look up a registered schema.
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
