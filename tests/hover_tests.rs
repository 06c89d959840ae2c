//! Hover against the workflow schema

use actions_yaml_lsp::context::WorkflowContextProviderFactory;
use actions_yaml_lsp::hover::hover;
use actions_yaml_lsp::schema::workflow_schema;

const CHECK_RUN: &str = "Runs your workflow anytime the check_run event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/checks/runs.";

/// `|` in the input marks the cursor
async fn hover_simple(input: &str) -> String {
    let offset = input.find('|').expect("cursor marker");
    let text = input.replace('|', "");
    let factory = WorkflowContextProviderFactory::default();

    hover(&text, offset, &workflow_schema(), &factory)
        .await
        .expect("expected a hover result")
        .description
}

#[tokio::test]
async fn test_event_value() {
    assert_eq!(hover_simple("on: check|_run").await, CHECK_RUN);
}

#[tokio::test]
async fn test_event_in_flow_sequence() {
    assert_eq!(hover_simple("on: [ push, check|_run ]").await, CHECK_RUN);
}

#[tokio::test]
async fn test_event_in_block_sequence() {
    assert_eq!(hover_simple("on:\n  - check|_run").await, CHECK_RUN);
}

#[tokio::test]
async fn test_event_map_key() {
    assert_eq!(hover_simple("on:\n  check|_run:").await, CHECK_RUN);
}

#[tokio::test]
async fn test_job_key() {
    assert_eq!(
        hover_simple("on: push\njobs:\n  build:\n    runs|-on: ubuntu-latest").await,
        "The type of machine to run the job on. The machine can be either a GitHub-hosted runner, or a self-hosted runner."
    );
}

#[tokio::test]
async fn test_simple_expression() {
    let text = "env:\n  WF_VALUE: 42\njobs:\n  build:\n    name: ${{ env.WF|_VALUE }}";
    assert_eq!(hover_simple(text).await, "Evaluates to: `42`");
}

#[tokio::test]
async fn test_multiple_expressions() {
    let text = "env:\n  WF_VALUE: 42\n  WF2: 23\n\
                jobs:\n  build:\n    name: ${{ env.WF|_VALUE }} -- ${{ env.WF2 }}";
    assert_eq!(hover_simple(text).await, "Evaluates to: `42 -- 23`");
}

#[tokio::test]
async fn test_comparison_expression() {
    let text = "env:\n  WF_VALUE: 42\n  WF2: 23\n\
                jobs:\n  build:\n    name: ${{ env.WF|_VALUE == env.WF2 }}";
    assert_eq!(hover_simple(text).await, "Evaluates to: `false`");
}

#[tokio::test]
async fn test_expression_referencing_env() {
    let text = "on:\n  push:\n\nenv:\n  WF_VALUE: 42\n  WF2: ${{ github.event.ref }}\n\
                jobs:\n  build:\n    name: ${{ env.W|F2 }}";
    assert_eq!(hover_simple(text).await, "Evaluates to: `refs/tags/simple-tag`");
}
