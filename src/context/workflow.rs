//! Context provider derived from the workflow being edited

use std::sync::Arc;

use serde_yaml::Value;

use super::payloads::sample_payload;
use super::{lookup, ContextConfig, ContextProvider, ContextProviderFactory};
use crate::expressions::{contains_expression, evaluate_template, ExprValue};
use crate::parser::PropertyPath;
use crate::schema::RUNNER_LABELS;

/// Resolves contexts from the workflow itself, sample event payloads and
/// the configured repository
#[derive(Debug, Clone)]
pub struct WorkflowContextProvider {
    workflow: Value,
    path: PropertyPath,
    config: Arc<ContextConfig>,
    /// Cleared while evaluating env values so they cannot reference each other
    include_env: bool,
}

impl WorkflowContextProvider {
    pub fn new(workflow: Value, path: PropertyPath, config: Arc<ContextConfig>) -> Self {
        Self {
            workflow,
            path,
            config,
            include_env: true,
        }
    }

    /// Id of the job the provider's path points into
    fn job_id(&self) -> Option<&str> {
        match self.path.key_at(0) {
            Some("jobs") => self.path.key_at(1),
            _ => None,
        }
    }

    fn job(&self) -> Option<&Value> {
        self.workflow.get("jobs")?.get(self.job_id()?)
    }

    fn step(&self) -> Option<&Value> {
        if self.path.key_at(2) != Some("steps") {
            return None;
        }
        self.job()?.get("steps")?.get(self.path.index_at(3)?)
    }

    /// First event the workflow triggers on
    fn event_name(&self) -> Option<String> {
        match self.workflow.get("on")? {
            Value::String(event) => Some(event.clone()),
            Value::Sequence(events) => events.first()?.as_str().map(str::to_string),
            Value::Mapping(events) => events.keys().next()?.as_str().map(str::to_string),
            _ => None,
        }
    }

    async fn env(&self) -> ExprValue {
        let scopes = [
            self.workflow.get("env"),
            self.job().and_then(|job| job.get("env")),
            self.step().and_then(|step| step.get("env")),
        ];
        let without_env = Self {
            include_env: false,
            ..self.clone()
        };

        let mut vars: Vec<(String, ExprValue)> = Vec::new();
        for scope in scopes.into_iter().flatten() {
            let Some(mapping) = scope.as_mapping() else {
                continue;
            };
            for (key, value) in mapping {
                let name = ExprValue::from(key).to_string();
                let value = match value {
                    Value::String(text) if contains_expression(text) => {
                        ExprValue::String(evaluate_template(text, &without_env).await)
                    }
                    value => ExprValue::from(value),
                };
                vars.retain(|(existing, _)| existing != &name);
                vars.push((name, value));
            }
        }

        ExprValue::Object(vars)
    }

    fn github(&self) -> ExprValue {
        let event_name = self.event_name();
        let event = match &event_name {
            Some(name) => match self.config.event_payloads.get(name) {
                Some(payload) => ExprValue::from(payload),
                None => ExprValue::from(&sample_payload(name)),
            },
            None => ExprValue::Object(Vec::new()),
        };
        let git_ref = match event.get("ref") {
            ExprValue::String(git_ref) => git_ref,
            _ => "refs/heads/main".to_string(),
        };
        let actor = match event.get("sender").get("login") {
            ExprValue::String(login) => login,
            _ => self.config.owner.clone(),
        };
        let workflow = self
            .workflow
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        ExprValue::object([
            ("event", event),
            ("event_name", ExprValue::from(event_name.unwrap_or_default())),
            (
                "repository",
                ExprValue::from(format!("{}/{}", self.config.owner, self.config.repository)),
            ),
            ("repository_owner", ExprValue::from(self.config.owner.as_str())),
            ("ref", ExprValue::from(git_ref)),
            ("sha", ExprValue::from("ffac537e6cbbf934b08745a378932722df287a53")),
            ("workflow", ExprValue::from(workflow)),
            ("job", ExprValue::from(self.job_id().unwrap_or_default())),
            ("actor", ExprValue::from(actor)),
        ])
    }

    fn secrets(&self) -> ExprValue {
        let mut names = vec!["GITHUB_TOKEN".to_string()];
        names.extend(self.config.secrets.iter().cloned());
        ExprValue::Object(
            names
                .into_iter()
                .map(|name| (name, ExprValue::from("***")))
                .collect(),
        )
    }

    fn runner() -> ExprValue {
        ExprValue::object([
            ("os", ExprValue::from("Linux")),
            ("arch", ExprValue::from("X64")),
            ("temp", ExprValue::from("/home/runner/work/_temp")),
            ("tool_cache", ExprValue::from("/opt/hostedtoolcache")),
        ])
    }

    /// First value of every matrix axis of the current job
    fn matrix(&self) -> ExprValue {
        let matrix = self
            .job()
            .and_then(|job| job.get("strategy"))
            .and_then(|strategy| strategy.get("matrix"))
            .and_then(Value::as_mapping);
        let Some(matrix) = matrix else {
            return ExprValue::Object(Vec::new());
        };

        ExprValue::Object(
            matrix
                .iter()
                .filter_map(|(axis, values)| {
                    let axis = axis.as_str()?;
                    if axis == "include" || axis == "exclude" {
                        return None;
                    }
                    let first = values.as_sequence()?.first()?;
                    Some((axis.to_string(), ExprValue::from(first)))
                })
                .collect(),
        )
    }
}

#[tower_lsp::async_trait]
impl ContextProvider for WorkflowContextProvider {
    async fn resolve(&self, path: &str) -> Option<ExprValue> {
        let segments: Vec<&str> = path.split('.').collect();
        let (root, rest) = segments.split_first()?;

        let value = match root.to_ascii_lowercase().as_str() {
            "env" if self.include_env => self.env().await,
            "github" => self.github(),
            "secrets" => self.secrets(),
            "runner" => Self::runner(),
            "job" => ExprValue::object([("status", ExprValue::from("success"))]),
            "matrix" => self.matrix(),
            _ => return None,
        };

        let value = lookup(value, rest);
        (!value.is_undefined()).then_some(value)
    }

    async fn suggest_additional_values(&self, path: &str) -> Vec<String> {
        match path {
            "jobs" => {
                let current = self.job_id();
                self.workflow
                    .get("jobs")
                    .and_then(Value::as_mapping)
                    .map(|jobs| {
                        jobs.keys()
                            .filter_map(Value::as_str)
                            .filter(|id| Some(*id) != current)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            }
            "runner.labels" => RUNNER_LABELS
                .iter()
                .filter(|label| **label != "self-hosted")
                .map(|label| label.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Creates [`WorkflowContextProvider`]s sharing one configuration
#[derive(Debug, Clone, Default)]
pub struct WorkflowContextProviderFactory {
    config: Arc<ContextConfig>,
}

impl WorkflowContextProviderFactory {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[tower_lsp::async_trait]
impl ContextProviderFactory for WorkflowContextProviderFactory {
    async fn get(&self, workflow: &Value, path: &PropertyPath) -> Arc<dyn ContextProvider> {
        Arc::new(WorkflowContextProvider::new(
            workflow.clone(),
            path.clone(),
            self.config.clone(),
        ))
    }
}
