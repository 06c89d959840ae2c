//! Sample webhook payloads used as `github.event` while editing

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_yaml::Value;

const REPOSITORY: &str = r#"
repository:
  id: 186853002
  name: Hello-World
  full_name: Codertocat/Hello-World
  private: false
  owner:
    login: Codertocat
    type: User
  html_url: https://github.com/Codertocat/Hello-World
  default_branch: master
sender:
  login: Codertocat
  type: User
"#;

const PUSH: &str = r#"
ref: refs/tags/simple-tag
before: 6113728f27ae82c7b1a177c8d03f9e96e0adf246
after: "0000000000000000000000000000000000000000"
created: false
deleted: true
forced: false
base_ref: null
compare: https://github.com/Codertocat/Hello-World/compare/6113728f27ae...000000000000
commits: []
head_commit: null
pusher:
  name: Codertocat
  email: 21031067+Codertocat@users.noreply.github.com
"#;

const PULL_REQUEST: &str = r#"
action: opened
number: 2
pull_request:
  number: 2
  state: open
  locked: false
  title: Update the README with new information.
  body: This is a pretty simple change that we need to pull into master.
  draft: false
  merged: false
  user:
    login: Codertocat
  head:
    label: Codertocat:changes
    ref: changes
    sha: ec26c3e57ca3a959ca5aad62de7213c562f8c821
  base:
    label: Codertocat:master
    ref: master
    sha: f95f852bd8fca8fcc58a9a2d6c842781e32a215e
  labels: []
"#;

const ISSUES: &str = r#"
action: edited
issue:
  number: 1
  title: Spelling error in the README file
  state: open
  locked: false
  body: It looks like you accidentally spelled 'commit' with two 't's.
  user:
    login: Codertocat
  labels:
    - name: bug
      color: d73a4a
      default: true
"#;

const RELEASE: &str = r#"
action: published
release:
  tag_name: 0.0.1
  target_commitish: master
  name: null
  draft: false
  prerelease: false
  author:
    login: Codertocat
"#;

const WORKFLOW_DISPATCH: &str = r#"
ref: refs/heads/master
workflow: .github/workflows/dispatch.yml
inputs:
  name: Mona the Octocat
"#;

const SCHEDULE: &str = r#"
schedule: "*/15 * * * *"
"#;

lazy_static! {
    static ref SAMPLES: HashMap<&'static str, Value> = {
        let mut samples = HashMap::new();
        for (event, payload) in [
            ("push", PUSH),
            ("pull_request", PULL_REQUEST),
            ("pull_request_target", PULL_REQUEST),
            ("issues", ISSUES),
            ("release", RELEASE),
            ("workflow_dispatch", WORKFLOW_DISPATCH),
            ("schedule", SCHEDULE),
        ] {
            samples.insert(event, with_repository(payload));
        }
        samples
    };
}

/// Merge an event specific sample with the repository and sender every
/// payload carries
fn with_repository(payload: &str) -> Value {
    let mut merged = parse(REPOSITORY);
    if let (Value::Mapping(target), Value::Mapping(extra)) = (&mut merged, parse(payload)) {
        target.extend(extra);
    }
    merged
}

fn parse(payload: &str) -> Value {
    serde_yaml::from_str(payload).unwrap_or_else(|err| {
        tracing::warn!("Invalid sample payload: {}", err);
        Value::Null
    })
}

/// Sample payload for an event; events without a dedicated sample get the
/// common repository and sender fields
pub fn sample_payload(event: &str) -> Value {
    SAMPLES
        .get(event)
        .cloned()
        .unwrap_or_else(|| parse(REPOSITORY))
}
