//! Queue-route model and route-list parsing.

use crate::error::PreprocessError;
use serde::Deserialize;

/// One forwarding path: consume from `from`, publish onto `to`, with
/// optional schema validation and template transformation in between.
///
/// Immutable once constructed. `schema` and `template` are file paths; an
/// absent or empty value disables the corresponding pipeline stage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct QueueRoute {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

impl QueueRoute {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            schema: None,
            template: None,
        }
    }

    pub fn with_schema(mut self, path: &str) -> Self {
        self.schema = Some(path.to_string());
        self
    }

    pub fn with_template(mut self, path: &str) -> Self {
        self.template = Some(path.to_string());
        self
    }

    /// Parses the configured route list.
    ///
    /// Parsing is atomic: a top level that is not an array, a non-object
    /// element, or any element missing (or blanking) `from`/`to` rejects the
    /// whole list — there is no partial acceptance.
    pub fn parse_list(json: &str) -> Result<Vec<QueueRoute>, PreprocessError> {
        let routes: Vec<QueueRoute> = serde_json::from_str(json)
            .map_err(|err| PreprocessError::InvalidRouteList(err.to_string()))?;

        for route in &routes {
            if route.from.is_empty() || route.to.is_empty() {
                return Err(PreprocessError::InvalidRouteList(format!(
                    "route {:?} -> {:?} must name both a source and a destination",
                    route.from, route.to
                )));
            }
        }
        Ok(routes)
    }
}
