//! Context providers
//!
//! A [`ContextProvider`] supplies runtime values for expressions (`env`,
//! `github`, ...) and extra valid values for schema entries whose legal
//! literals depend on the document. Providers are created per request by a
//! [`ContextProviderFactory`], scoped to the path being validated, completed
//! or hovered.

mod payloads;
mod static_provider;
mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::Value;

use crate::expressions::ExprValue;
use crate::parser::PropertyPath;

pub use static_provider::{StaticContextProvider, StaticContextProviderFactory};
pub use workflow::{WorkflowContextProvider, WorkflowContextProviderFactory};

/// Source of runtime values for one location of a document
#[tower_lsp::async_trait]
pub trait ContextProvider: Send + Sync {
    /// Value at a dotted path such as `env` or `github.event.ref`;
    /// `None` when unknown
    async fn resolve(&self, path: &str) -> Option<ExprValue>;

    /// Extra valid values for a context-resolved schema entry. An empty list
    /// means the provider cannot decide.
    async fn suggest_additional_values(&self, path: &str) -> Vec<String>;
}

/// Creates providers scoped to a path of the document
#[tower_lsp::async_trait]
pub trait ContextProviderFactory: Send + Sync {
    async fn get(&self, workflow: &Value, path: &PropertyPath) -> Arc<dyn ContextProvider>;
}

/// Settings for the editing context provider, read from the client's
/// `initializationOptions`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextConfig {
    pub owner: String,
    pub repository: String,
    /// Secret names; each resolves to a masked value
    pub secrets: Vec<String>,
    /// Event payloads replacing the built-in samples, by event name
    pub event_payloads: HashMap<String, serde_json::Value>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            owner: "owner".to_string(),
            repository: "repository".to_string(),
            secrets: Vec::new(),
            event_payloads: HashMap::new(),
        }
    }
}

impl ContextConfig {
    /// Read the configuration, falling back to defaults when absent or malformed
    pub fn from_initialization_options(options: Option<serde_json::Value>) -> Self {
        let Some(options) = options else {
            return Self::default();
        };
        match serde_json::from_value(options) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Ignoring malformed initialization options: {}", err);
                Self::default()
            }
        }
    }
}

/// Walk the remaining segments of a dotted path below a resolved root
pub(crate) fn lookup(root: ExprValue, rest: &[&str]) -> ExprValue {
    rest.iter().fold(root, |value, segment| value.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_options() {
        let options = serde_json::json!({
            "owner": "octo-org",
            "secrets": ["NPM_TOKEN"],
            "eventPayloads": { "push": { "ref": "refs/heads/dev" } }
        });
        let config = ContextConfig::from_initialization_options(Some(options));

        assert_eq!(config.owner, "octo-org");
        assert_eq!(config.repository, "repository");
        assert_eq!(config.secrets, vec!["NPM_TOKEN".to_string()]);
        assert!(config.event_payloads.contains_key("push"));
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let config =
            ContextConfig::from_initialization_options(Some(serde_json::json!({ "secrets": 3 })));
        assert_eq!(config.owner, "owner");
        assert!(config.secrets.is_empty());

        let config = ContextConfig::from_initialization_options(None);
        assert_eq!(config.repository, "repository");
    }

    #[test]
    fn test_lookup_walks_segments() {
        let event = ExprValue::object([("ref", ExprValue::from("main"))]);
        let root = ExprValue::object([("event", event)]);
        assert_eq!(lookup(root.clone(), &["event", "ref"]), ExprValue::from("main"));
        assert_eq!(lookup(root, &["event", "missing"]), ExprValue::Undefined);
    }
}
