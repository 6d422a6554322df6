use std::fmt;
use std::path::Path;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::types::ConfigError;

const RULES_ENGINE_SCHEMA: &str = include_str!("rules_engine_schema.json");

/// A compiled JSON Schema that account configurations are checked against
/// before they are deserialized.
pub struct SchemaValidator {
    schema: JSONSchema,
}

impl SchemaValidator {
    /// Compile the schema shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded document does not compile.
    pub fn rules_engine() -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(RULES_ENGINE_SCHEMA)?;
        Self::from_value(&document)
    }

    /// Load and compile a schema document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Json`] if it is not JSON and
    /// [`ConfigError::SchemaDocument`] if it is not a valid schema.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)?;
        Self::from_value(&document)
    }

    /// Compile an already parsed schema document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaDocument`] if `document` is not a valid
    /// draft 7 schema.
    pub fn from_value(document: &Value) -> Result<Self, ConfigError> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(document)
            .map_err(|e| ConfigError::SchemaDocument(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Check `instance` against the schema, reporting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Schema`] listing each violation as
    /// `path: message`, where the root is written `(root)`.
    pub fn validate(&self, instance: &Value) -> Result<(), ConfigError> {
        self.schema.validate(instance).map_err(|errors| {
            let violations = errors
                .map(|e| {
                    let path = e.instance_path.clone().into_vec().join(".");
                    let path = if path.is_empty() { "(root)".to_owned() } else { path };
                    format!("{path}: {e}")
                })
                .collect();
            ConfigError::Schema { violations }
        })
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}
