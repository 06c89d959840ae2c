//! GitHub Actions workflow schema
//!
//! Events, jobs, steps and runner selection for `.github/workflows/*.yml`.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::{AllowedValue, NodeDesc, ObjectDesc, Schema, ValueDesc};

/// Extra keys an event accepts besides `types`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filters {
    None,
    Push,
    PullRequest,
    Schedule,
    Dispatch,
    RepositoryDispatch,
    WorkflowRun,
}

struct Event {
    name: &'static str,
    description: &'static str,
    types: &'static [&'static str],
    filters: Filters,
}

const PULL_REQUEST_TYPES: &[&str] = &[
    "assigned",
    "unassigned",
    "labeled",
    "unlabeled",
    "opened",
    "edited",
    "closed",
    "reopened",
    "synchronize",
    "ready_for_review",
    "locked",
    "unlocked",
    "review_requested",
    "review_request_removed",
];

const EVENTS: &[Event] = &[
    Event {
        name: "check_run",
        description: "Runs your workflow anytime the check_run event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/checks/runs.",
        types: &["created", "rerequested", "completed", "requested_action"],
        filters: Filters::None,
    },
    Event {
        name: "check_suite",
        description: "Runs your workflow anytime the check_suite event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/checks/suites/.",
        types: &["completed", "requested", "rerequested"],
        filters: Filters::None,
    },
    Event {
        name: "create",
        description: "Runs your workflow anytime someone creates a branch or tag, which triggers the create event. For information about the REST API, see https://developer.github.com/v3/git/refs/#create-a-reference.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "delete",
        description: "Runs your workflow anytime someone deletes a branch or tag, which triggers the delete event. For information about the REST API, see https://developer.github.com/v3/git/refs/#delete-a-reference.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "deployment",
        description: "Runs your workflow anytime someone creates a deployment, which triggers the deployment event. Deployments created with a commit SHA may not have a Git ref. For information about the REST API, see https://developer.github.com/v3/repos/deployments/.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "deployment_status",
        description: "Runs your workflow anytime a third party provides a deployment status, which triggers the deployment_status event. Deployments created with a commit SHA may not have a Git ref. For information about the REST API, see https://developer.github.com/v3/repos/deployments/#create-a-deployment-status.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "fork",
        description: "Runs your workflow anytime when someone forks a repository, which triggers the fork event. For information about the REST API, see https://developer.github.com/v3/repos/forks/#create-a-fork.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "gollum",
        description: "Runs your workflow when someone creates or updates a Wiki page, which triggers the gollum event.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "issue_comment",
        description: "Runs your workflow anytime the issue_comment event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/issues/comments/.",
        types: &["created", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "issues",
        description: "Runs your workflow anytime the issues event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/issues.",
        types: &[
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
        ],
        filters: Filters::None,
    },
    Event {
        name: "label",
        description: "Runs your workflow anytime the label event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/issues/labels/.",
        types: &["created", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "milestone",
        description: "Runs your workflow anytime the milestone event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/issues/milestones/.",
        types: &["created", "closed", "opened", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "page_build",
        description: "Runs your workflow anytime someone pushes to a GitHub Pages-enabled branch, which triggers the page_build event. For information about the REST API, see https://developer.github.com/v3/repos/pages/.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "project",
        description: "Runs your workflow anytime the project event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/projects/.",
        types: &["created", "updated", "closed", "reopened", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "project_card",
        description: "Runs your workflow anytime the project_card event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/projects/cards.",
        types: &["created", "moved", "converted", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "project_column",
        description: "Runs your workflow anytime the project_column event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/projects/columns.",
        types: &["created", "updated", "moved", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "public",
        description: "Runs your workflow anytime someone makes a private repository public, which triggers the public event. For information about the REST API, see https://developer.github.com/v3/repos/#edit.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "pull_request",
        description: "Runs your workflow anytime the pull_request event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/pulls.",
        types: PULL_REQUEST_TYPES,
        filters: Filters::PullRequest,
    },
    Event {
        name: "pull_request_review",
        description: "Runs your workflow anytime the pull_request_review event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/pulls/reviews.",
        types: &["submitted", "edited", "dismissed"],
        filters: Filters::None,
    },
    Event {
        name: "pull_request_review_comment",
        description: "Runs your workflow anytime a comment on a pull request's unified diff is modified, which triggers the pull_request_review_comment event. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/pulls/comments.",
        types: &["created", "edited", "deleted"],
        filters: Filters::None,
    },
    Event {
        name: "pull_request_target",
        description: "Runs your workflow anytime the pull_request_target event occurs, in the context of the base of the pull request. More than one activity type triggers this event.",
        types: PULL_REQUEST_TYPES,
        filters: Filters::PullRequest,
    },
    Event {
        name: "push",
        description: "Runs your workflow when someone pushes to a repository branch, which triggers the push event.",
        types: &[],
        filters: Filters::Push,
    },
    Event {
        name: "registry_package",
        description: "Runs your workflow anytime a package is published or updated. For more information, see https://help.github.com/en/github/managing-packages-with-github-packages.",
        types: &["published", "updated"],
        filters: Filters::None,
    },
    Event {
        name: "release",
        description: "Runs your workflow anytime the release event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/repos/releases/.",
        types: &[
            "published",
            "unpublished",
            "created",
            "edited",
            "deleted",
            "prereleased",
            "released",
        ],
        filters: Filters::None,
    },
    Event {
        name: "repository_dispatch",
        description: "You can use the GitHub API to trigger a webhook event called repository_dispatch when you want to trigger a workflow for activity that happens outside of GitHub. For more information, see https://developer.github.com/v3/repos/#create-a-repository-dispatch-event.",
        types: &[],
        filters: Filters::RepositoryDispatch,
    },
    Event {
        name: "schedule",
        description: "You can schedule a workflow to run at specific UTC times using POSIX cron syntax. Scheduled workflows run on the latest commit on the default or base branch. The shortest interval you can run scheduled workflows is once every 5 minutes.",
        types: &[],
        filters: Filters::Schedule,
    },
    Event {
        name: "status",
        description: "Runs your workflow anytime the status of a Git commit changes, which triggers the status event. For information about the REST API, see https://developer.github.com/v3/repos/statuses/.",
        types: &[],
        filters: Filters::None,
    },
    Event {
        name: "watch",
        description: "Runs your workflow anytime the watch event occurs. More than one activity type triggers this event. For information about the REST API, see https://developer.github.com/v3/activity/starring/.",
        types: &["started"],
        filters: Filters::None,
    },
    Event {
        name: "workflow_dispatch",
        description: "You can now create workflows that are manually triggered with the new workflow_dispatch event. You will then see a 'Run workflow' button on the Actions tab, enabling you to easily trigger a run.",
        types: &[],
        filters: Filters::Dispatch,
    },
    Event {
        name: "workflow_run",
        description: "This event occurs when a workflow run is requested or completed, and allows you to execute a workflow based on the finished result of another workflow.",
        types: &["completed", "requested"],
        filters: Filters::WorkflowRun,
    },
];

/// Labels of GitHub-hosted runners, plus `self-hosted`
pub const RUNNER_LABELS: &[&str] = &[
    "ubuntu-latest",
    "ubuntu-20.04",
    "ubuntu-18.04",
    "ubuntu-16.04",
    "windows-latest",
    "windows-2019",
    "macos-latest",
    "macos-11.0",
    "macos-10.15",
    "self-hosted",
];

const SHELLS: &[&str] = &["bash", "pwsh", "python", "sh", "cmd", "powershell"];

lazy_static! {
    static ref WORKFLOW_SCHEMA: Arc<Schema> = Arc::new(build_schema());
    static ref JOB_ID_RE: Regex = Regex::new(r"^[_a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
}

/// The shared workflow schema
pub fn workflow_schema() -> Arc<Schema> {
    WORKFLOW_SCHEMA.clone()
}

/// Every trigger event, in catalog order
pub fn events() -> Vec<AllowedValue> {
    EVENTS
        .iter()
        .map(|event| AllowedValue::new(event.name).with_description(event.description))
        .collect()
}

fn literals(values: &[&str]) -> ValueDesc {
    ValueDesc::literals(values.iter().map(|value| AllowedValue::new(value)).collect())
}

fn boolean() -> NodeDesc {
    NodeDesc::value(literals(&["true", "false"]))
}

fn string_list() -> NodeDesc {
    NodeDesc::array(NodeDesc::string())
}

fn string_map() -> NodeDesc {
    NodeDesc::object(ObjectDesc::new().pattern(None, NodeDesc::string()))
}

fn event_config(event: &Event) -> NodeDesc {
    if event.filters == Filters::Schedule {
        let entry = ObjectDesc::new().required(
            "cron",
            NodeDesc::string().with_description("A POSIX cron expression, in UTC."),
        );
        return NodeDesc::array(NodeDesc::object(entry)).with_description(event.description);
    }

    let mut config = ObjectDesc::new();
    if !event.types.is_empty() {
        config = config.property(
            "types",
            NodeDesc::array(NodeDesc::value(literals(event.types)))
                .with_description("Selects the types of activity that will trigger a workflow run."),
        );
    }

    let filter = |config: ObjectDesc, name: &str| config.property(name, string_list());
    config = match event.filters {
        Filters::Push => ["branches", "branches-ignore", "tags", "tags-ignore", "paths", "paths-ignore"]
            .into_iter()
            .fold(config, filter),
        Filters::PullRequest => ["branches", "branches-ignore", "paths", "paths-ignore"]
            .into_iter()
            .fold(config, filter),
        Filters::WorkflowRun => ["workflows", "branches", "branches-ignore"]
            .into_iter()
            .fold(config, filter),
        Filters::RepositoryDispatch => config.property(
            "types",
            string_list().with_description("Custom webhook event types that trigger a workflow run."),
        ),
        Filters::Dispatch => config.property(
            "inputs",
            NodeDesc::object(ObjectDesc::new().pattern(
                None,
                NodeDesc::object(
                    ObjectDesc::new()
                        .required("description", NodeDesc::string())
                        .property("required", boolean())
                        .property("default", NodeDesc::string()),
                ),
            ))
            .with_description("Input parameters shown on the 'Run workflow' form."),
        ),
        Filters::None | Filters::Schedule => config,
    };

    NodeDesc::object(config).with_description(event.description)
}

fn on() -> NodeDesc {
    let catalog = || NodeDesc::value(ValueDesc::literals(events()));
    let configs = EVENTS
        .iter()
        .fold(ObjectDesc::new(), |object, event| {
            object.property(event.name, event_config(event))
        });

    NodeDesc::one_of(vec![
        catalog(),
        NodeDesc::array(catalog()),
        NodeDesc::object(configs),
    ])
    .with_description("The name of the GitHub event that triggers the workflow. You can provide a single event string, array of events, array of event types, or an event configuration map that schedules a workflow or restricts the execution of a workflow to specific files, tags, or branch changes.")
}

fn runs_on() -> NodeDesc {
    let label = || {
        NodeDesc::value(
            literals(RUNNER_LABELS)
                .suggest_only()
                .from_context("runner.labels"),
        )
    };
    NodeDesc::one_of(vec![label(), NodeDesc::array(label())])
        .with_description("The type of machine to run the job on. The machine can be either a GitHub-hosted runner, or a self-hosted runner.")
}

fn needs() -> NodeDesc {
    let job = || NodeDesc::value(ValueDesc::any().from_context("jobs"));
    NodeDesc::one_of(vec![job(), NodeDesc::array(job())])
        .with_description("Identifies any jobs that must complete successfully before this job will run. It can be a string or array of strings.")
}

fn strategy() -> NodeDesc {
    let matrix = ObjectDesc::new()
        .property("include", NodeDesc::array(NodeDesc::reference("any")))
        .property("exclude", NodeDesc::array(NodeDesc::reference("any")))
        .pattern(None, NodeDesc::reference("any"));

    NodeDesc::object(
        ObjectDesc::new()
            .property(
                "matrix",
                NodeDesc::object(matrix).with_description("A build matrix is a set of different configurations of the virtual environment."),
            )
            .property(
                "fail-fast",
                boolean().with_description("When set to true, GitHub cancels all in-progress jobs if any matrix job fails."),
            )
            .property(
                "max-parallel",
                NodeDesc::string().with_description("The maximum number of jobs that can run simultaneously when using a matrix job strategy."),
            ),
    )
    .with_description("A strategy creates a build matrix for your jobs.")
}

fn step() -> NodeDesc {
    NodeDesc::object(
        ObjectDesc::new()
            .property(
                "id",
                NodeDesc::value(ValueDesc { expressions: false, ..ValueDesc::any() })
                    .with_description("A unique identifier for the step. You can use the id to reference the step in contexts."),
            )
            .property("name", NodeDesc::string().with_description("A name for your step to display on GitHub."))
            .property(
                "if",
                NodeDesc::string().with_description("You can use the if conditional to prevent a step from running unless a condition is met."),
            )
            .property(
                "uses",
                NodeDesc::string().with_description("Selects an action to run as part of a step in your job. An action is a reusable unit of code."),
            )
            .property(
                "run",
                NodeDesc::string().with_description("Runs command-line programs using the operating system's shell."),
            )
            .property(
                "shell",
                NodeDesc::value(literals(SHELLS).suggest_only())
                    .with_description("You can override the default shell settings in the runner's operating system using the shell keyword."),
            )
            .property(
                "with",
                string_map().with_description("A map of the input parameters defined by the action."),
            )
            .property("env", NodeDesc::reference("env").with_description("Sets environment variables for steps to use in the runner environment."))
            .property(
                "working-directory",
                NodeDesc::string().with_description("Using the working-directory keyword, you can specify the working directory of where to run the command."),
            )
            .property(
                "continue-on-error",
                boolean().with_description("Prevents a job from failing when a step fails. Set to true to allow a job to pass when this step fails."),
            )
            .property(
                "timeout-minutes",
                NodeDesc::string().with_description("The maximum number of minutes to run the step before killing the process."),
            ),
    )
}

fn job() -> NodeDesc {
    NodeDesc::object(
        ObjectDesc::new()
            .property("name", NodeDesc::string().with_description("The name of the job displayed on GitHub."))
            .property("needs", needs())
            .required("runs-on", runs_on())
            .property(
                "if",
                NodeDesc::string().with_description("You can use the if conditional to prevent a job from running unless a condition is met."),
            )
            .property("env", NodeDesc::reference("env").with_description("A map of environment variables that are available to all steps in the job."))
            .property("strategy", strategy())
            .property(
                "timeout-minutes",
                NodeDesc::string().with_description("The maximum number of minutes to let a job run before GitHub automatically cancels it. Default: 360"),
            )
            .property(
                "continue-on-error",
                boolean().with_description("Prevents a workflow run from failing when a job fails."),
            )
            .property(
                "outputs",
                string_map().with_description("A map of outputs for a job. Job outputs are available to all downstream jobs that depend on this job."),
            )
            .property(
                "steps",
                NodeDesc::array(step()).with_description("A job contains a sequence of tasks called steps. Steps can run commands, run setup tasks, or run an action in your repository, a public repository, or an action published in a Docker registry."),
            ),
    )
}

fn build_schema() -> Schema {
    let root = ObjectDesc::new()
        .property(
            "env",
            NodeDesc::reference("env").with_description("A map of environment variables that are available to all jobs and steps in the workflow."),
        )
        .required(
            "jobs",
            NodeDesc::object(ObjectDesc::new().pattern(Some(JOB_ID_RE.clone()), job()))
                .with_description("A workflow run is made up of one or more jobs. Jobs run in parallel by default. To run jobs sequentially, you can define dependencies on other jobs using the jobs.<job_id>.needs keyword."),
        )
        .property(
            "name",
            NodeDesc::string().with_description("The name of your workflow. GitHub displays the names of your workflows on your repository's actions page. If you omit name, GitHub sets it to the workflow file path relative to the root of the repository."),
        )
        .required("on", on());

    Schema::new(NodeDesc::object(root))
        .define("env", string_map())
        .define(
            "any",
            NodeDesc::one_of(vec![
                NodeDesc::string(),
                NodeDesc::array(NodeDesc::reference("any")),
                NodeDesc::object(ObjectDesc::new().pattern(None, NodeDesc::reference("any"))),
            ]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PathSegment;
    use crate::schema::DescKind;
    use assert_matches::assert_matches;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    #[test]
    fn test_top_level_order() {
        let schema = workflow_schema();
        let DescKind::Object(root) = &schema.root.kind else {
            panic!("root is an object");
        };
        let names: Vec<&str> = root.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["env", "jobs", "name", "on"]);

        let required: Vec<&str> = root
            .properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(required, vec!["jobs", "on"]);
    }

    #[test]
    fn test_event_catalog() {
        let events = events();
        assert_eq!(events.len(), 30);
        assert_eq!(events[0].value, "check_run");
        assert!(events.iter().all(|event| event.description.is_some()));
    }

    #[test]
    fn test_job_ids_follow_pattern() {
        let schema = workflow_schema();
        let jobs = schema.child(&schema.root, &key("jobs")).expect("jobs");
        assert!(schema.child(&jobs, &key("build_1")).is_some());
        assert!(schema.child(&jobs, &key("1build")).is_none());
    }

    #[test]
    fn test_env_definition_is_shared() {
        let schema = workflow_schema();
        let mut desc = schema.root.clone();
        for segment in [key("jobs"), key("build"), key("steps"), PathSegment::Index(0), key("env"), key("TOKEN")] {
            desc = schema.child(&desc, &segment).expect("child");
        }
        assert_matches!(desc.kind, DescKind::Value(_));
    }
}
