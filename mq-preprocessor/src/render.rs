//! Message transformation through an optional template.

use crate::error::{DeliveryError, PreprocessError};
use serde_json::Value;
use std::fs;

const TEMPLATE_NAME: &str = "route-template";

/// Compiled transformation capability for one route.
///
/// The identity variant is the explicit no-template default: the parsed
/// message is forwarded unchanged.
pub enum Renderer {
    /// No template configured.
    Identity,
    /// Substitute message fields into the template compiled from `path`.
    Template {
        path: String,
        env: minijinja::Environment<'static>,
    },
}

impl Renderer {
    /// Compiles the renderer for an optional template path.
    ///
    /// `None` and the empty string both mean identity. Read and compile
    /// failures are fatal to the route's startup, mirroring the validator.
    pub fn from_path(path: Option<&str>) -> Result<Self, PreprocessError> {
        let Some(path) = path.filter(|path| !path.is_empty()) else {
            return Ok(Renderer::Identity);
        };

        let text = fs::read_to_string(path).map_err(|source| PreprocessError::FileRead {
            kind: "template",
            path: path.to_string(),
            source,
        })?;
        let mut env = minijinja::Environment::new();
        env.add_template_owned(TEMPLATE_NAME.to_string(), text)
            .map_err(|err| PreprocessError::TemplateCompile {
                path: path.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Renderer::Template {
            path: path.to_string(),
            env,
        })
    }

    /// Renders one outgoing payload from one parsed message.
    ///
    /// Message fields referenced by the template but absent from the message
    /// render as empty strings. The rendered text becomes the outgoing body
    /// and must itself be valid JSON.
    pub fn render(&self, message: &Value) -> Result<Value, DeliveryError> {
        match self {
            Renderer::Identity => Ok(message.clone()),
            Renderer::Template { env, .. } => {
                let template = env
                    .get_template(TEMPLATE_NAME)
                    .map_err(|err| DeliveryError::Render(err.to_string()))?;
                let rendered = template
                    .render(minijinja::Value::from_serialize(message))
                    .map_err(|err| DeliveryError::Render(err.to_string()))?;
                serde_json::from_str(&rendered).map_err(|err| {
                    DeliveryError::Render(format!("rendered output is not valid JSON: {err}"))
                })
            }
        }
    }

    /// The configured template path, if any.
    pub fn template_path(&self) -> Option<&str> {
        match self {
            Renderer::Identity => None,
            Renderer::Template { path, .. } => Some(path),
        }
    }
}
