//! Error types for route construction, startup, and the transport seam.

use thiserror::Error;

/// Failures raised while building or starting a route's processing pipeline.
///
/// Everything here is fatal to the affected route's startup and surfaces
/// before any message is consumed; per-delivery failures are a separate
/// category ([`DeliveryError`]) that never escapes the delivery handler.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// The configured route list could not be parsed or broke its shape rules.
    #[error("invalid route list: {0}")]
    InvalidRouteList(String),

    /// A schema or template file could not be read.
    #[error("unable to read {kind} file {path}: {source}")]
    FileRead {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A schema document failed to parse or compile.
    #[error("invalid JSON schema {path}: {reason}")]
    SchemaCompile { path: String, reason: String },

    /// A template failed to parse or compile.
    #[error("invalid template {path}: {reason}")]
    TemplateCompile { path: String, reason: String },

    /// The broker transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure surfaced by a broker transport implementation at the capability
/// seam. Deliberately opaque: the core treats every transport failure the
/// same way regardless of which binding produced it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Per-delivery failures caught at the handler boundary and converted into a
/// single reject disposition plus a log entry.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A binary body that does not decode as UTF-8.
    #[error("message body is not valid UTF-8: {0}")]
    BodyNotUtf8(#[from] std::string::FromUtf8Error),

    /// The decoded body is not valid JSON.
    #[error("message body is not valid JSON: {0}")]
    BodyNotJson(#[from] serde_json::Error),

    /// Template rendering failed, or rendered to something that is not JSON.
    #[error("template rendering failed: {0}")]
    Render(String),
}
