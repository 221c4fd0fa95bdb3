//! Message validation against an optional JSON Schema.

use crate::error::PreprocessError;
use serde_json::Value;
use std::fs;

/// Compiled validation capability for one route.
///
/// The permissive variant is the explicit no-schema default rather than a
/// closure fallback: a route without a schema path accepts every well-formed
/// value.
pub enum Validator {
    /// No schema configured; everything validates.
    Permissive,
    /// Validate against the schema compiled from `path`.
    Schema {
        path: String,
        compiled: jsonschema::Validator,
    },
}

impl Validator {
    /// Compiles the validator for an optional schema path.
    ///
    /// `None` and the empty string both mean no validation. Read, parse, and
    /// compile failures are fatal to the route's startup and surface before
    /// any message is consumed.
    pub fn from_path(path: Option<&str>) -> Result<Self, PreprocessError> {
        let Some(path) = path.filter(|path| !path.is_empty()) else {
            return Ok(Validator::Permissive);
        };

        let text = fs::read_to_string(path).map_err(|source| PreprocessError::FileRead {
            kind: "schema",
            path: path.to_string(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&text).map_err(|err| PreprocessError::SchemaCompile {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        let compiled =
            jsonschema::validator_for(&document).map_err(|err| PreprocessError::SchemaCompile {
                path: path.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Validator::Schema {
            path: path.to_string(),
            compiled,
        })
    }

    /// Runs the predicate. Pure and side-effect-free; never panics for
    /// well-formed values.
    pub fn is_valid(&self, value: &Value) -> bool {
        match self {
            Validator::Permissive => true,
            Validator::Schema { compiled, .. } => compiled.is_valid(value),
        }
    }

    /// The configured schema path, used by validation-failure logs.
    pub fn schema_path(&self) -> Option<&str> {
        match self {
            Validator::Permissive => None,
            Validator::Schema { path, .. } => Some(path),
        }
    }
}
