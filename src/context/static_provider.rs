//! Context provider with fixed values

use std::collections::HashMap;
use std::sync::Arc;

use serde_yaml::Value;

use super::{lookup, ContextProvider, ContextProviderFactory};
use crate::expressions::ExprValue;
use crate::parser::PropertyPath;

/// Answers every request from values set up front
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    values: Vec<(String, ExprValue)>,
    suggestions: HashMap<String, Vec<String>>,
}

impl StaticContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a root namespace
    pub fn with_value(mut self, name: &str, value: ExprValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    pub fn with_suggestions(mut self, path: &str, values: &[&str]) -> Self {
        self.suggestions.insert(
            path.to_string(),
            values.iter().map(|value| value.to_string()).collect(),
        );
        self
    }
}

#[tower_lsp::async_trait]
impl ContextProvider for StaticContextProvider {
    async fn resolve(&self, path: &str) -> Option<ExprValue> {
        let segments: Vec<&str> = path.split('.').collect();
        let (root, rest) = segments.split_first()?;
        let value = self
            .values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(root))
            .map(|(_, value)| value.clone())?;

        let value = lookup(value, rest);
        (!value.is_undefined()).then_some(value)
    }

    async fn suggest_additional_values(&self, path: &str) -> Vec<String> {
        self.suggestions.get(path).cloned().unwrap_or_default()
    }
}

/// Hands out the same [`StaticContextProvider`] for every path
#[derive(Debug, Clone, Default)]
pub struct StaticContextProviderFactory {
    provider: Arc<StaticContextProvider>,
}

impl StaticContextProviderFactory {
    pub fn new(provider: StaticContextProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

#[tower_lsp::async_trait]
impl ContextProviderFactory for StaticContextProviderFactory {
    async fn get(&self, _workflow: &Value, _path: &PropertyPath) -> Arc<dyn ContextProvider> {
        self.provider.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_dotted_path() {
        let provider = StaticContextProvider::new().with_value(
            "github",
            ExprValue::object([("event_name", ExprValue::from("push"))]),
        );

        assert_eq!(
            provider.resolve("github.event_name").await,
            Some(ExprValue::from("push"))
        );
        assert_eq!(provider.resolve("GITHUB.EVENT_NAME").await, Some(ExprValue::from("push")));
        assert_eq!(provider.resolve("github.sha").await, None);
        assert_eq!(provider.resolve("env").await, None);
    }

    #[tokio::test]
    async fn test_suggestions() {
        let factory = StaticContextProviderFactory::new(
            StaticContextProvider::new().with_suggestions("jobs", &["build", "test"]),
        );
        let provider = factory.get(&Value::Null, &PropertyPath::root()).await;

        assert_eq!(provider.suggest_additional_values("jobs").await, vec!["build", "test"]);
        assert!(provider.suggest_additional_values("runner.labels").await.is_empty());
    }
}
