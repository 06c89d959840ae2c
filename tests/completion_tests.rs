//! Completion against the workflow schema

use actions_yaml_lsp::completion::complete;
use actions_yaml_lsp::context::StaticContextProviderFactory;
use actions_yaml_lsp::schema::{events, workflow_schema};

/// `|` in the input marks the cursor
async fn complete_simple(input: &str) -> Vec<String> {
    let offset = input.find('|').expect("cursor marker");
    let text = input.replace('|', "");
    let factory = StaticContextProviderFactory::default();

    complete(&text, offset, &workflow_schema(), &factory)
        .await
        .into_iter()
        .map(|suggestion| suggestion.value)
        .collect()
}

fn event_names() -> Vec<String> {
    events().into_iter().map(|event| event.value).collect()
}

// Every job property in declared order. This is the full job schema, wider
// than the env/runs-on/steps subset older workflow schemas offered.
const JOB_KEYS: &[&str] = &[
    "name",
    "needs",
    "runs-on",
    "if",
    "env",
    "strategy",
    "timeout-minutes",
    "continue-on-error",
    "outputs",
    "steps",
];

#[tokio::test]
async fn test_top_level_keys() {
    assert_eq!(complete_simple("|").await, vec!["env", "jobs", "name", "on"]);
    assert_eq!(complete_simple("n|").await, vec!["name"]);
    assert_eq!(
        complete_simple("name: workflow\n|").await,
        vec!["env", "jobs", "on"]
    );
}

#[tokio::test]
async fn test_top_level_key_after_nested_block() {
    assert_eq!(
        complete_simple("name: test\non:\n  pull_request:\n    types:\n    - assigned\n|").await,
        vec!["env", "jobs"]
    );
}

#[tokio::test]
async fn test_event_value() {
    assert_eq!(complete_simple("on: |").await, event_names());
}

#[tokio::test]
async fn test_event_value_with_partial_input() {
    assert_eq!(complete_simple("on: check_r|").await, vec!["check_run"]);
}

#[tokio::test]
async fn test_event_map() {
    assert_eq!(complete_simple("on:\n  |").await, event_names());
}

#[tokio::test]
async fn test_event_map_with_partial_input() {
    assert_eq!(
        complete_simple("on:\n  check_|").await,
        vec!["check_run", "check_suite"]
    );
}

#[tokio::test]
async fn test_event_sequence() {
    assert_eq!(complete_simple("on:\n  - |").await, event_names());
}

#[tokio::test]
async fn test_activity_types() {
    assert_eq!(
        complete_simple("on:\n  issues:\n    types:\n      - |").await,
        vec![
            "assigned",
            "closed",
            "deleted",
            "demilestoned",
            "edited",
            "labeled",
            "locked",
            "milestoned",
            "opened",
            "pinned",
            "reopened",
            "transferred",
            "unassigned",
            "unlabeled",
            "unlocked",
            "unpinned",
        ]
    );
}

#[tokio::test]
async fn test_job_keys() {
    assert_eq!(complete_simple("jobs:\n  build:\n    |").await, JOB_KEYS);
}

#[tokio::test]
async fn test_job_keys_skip_existing() {
    let expected: Vec<&str> = JOB_KEYS
        .iter()
        .copied()
        .filter(|key| *key != "runs-on")
        .collect();

    assert_eq!(
        complete_simple("jobs:\n  build:\n    runs-on: ubuntu-latest\n    |").await,
        expected
    );
}

#[tokio::test]
async fn test_runner_labels() {
    let labels = complete_simple("on: push\njobs:\n  build:\n    runs-on: ubuntu|").await;
    assert_eq!(
        labels,
        vec!["ubuntu-latest", "ubuntu-20.04", "ubuntu-18.04", "ubuntu-16.04"]
    );
}
