//! Tests for comment dispatch: authorization, parsing failures, duplicate
//! rejection, sequential execution, and end-to-end GitHub API wiring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use prbot_commands::comment_event::IssueCommentEventPayload;
use serde_json::json;

use super::{
    run_comment_command_bot, CommentCommandBotConfig, CommentCommandRuntime, CommentDispatchConfig,
    DispatchOutcome,
};
use crate::ci_command::{CiCommandConfig, DispatchRef};
use crate::command_model::tests::{registry_with_label_command, test_event};
use crate::command_model::{BotCommand, CommandOutcome, CommandRegistry};
use crate::fake_platform::{PlatformCall, RecordingPlatform};
use crate::platform::{
    CiPlatform, CommitDetails, MergeableState, PullRequestDetails, WorkflowRunSummary,
};

const BOT_RUN_URL: &str = "https://github.com/owner/repo/actions/runs/42";

fn fast_ci_config() -> CiCommandConfig {
    CiCommandConfig {
        dispatch_ref: DispatchRef::Named("main".to_string()),
        mergeable_retry_delay: Duration::ZERO,
        ..CiCommandConfig::default()
    }
}

fn mergeable_platform() -> RecordingPlatform {
    RecordingPlatform::new()
        .with_pull_requests([PullRequestDetails {
            number: 7,
            mergeable: MergeableState::Mergeable,
            merge_commit_sha: Some("merge-sha".to_string()),
        }])
        .with_commit(CommitDetails {
            sha: "merge-sha".to_string(),
            committer_date: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 5)
                .single()
                .expect("timestamp"),
        })
        .with_runs([WorkflowRunSummary {
            id: 501,
            name: Some("#7 - corr-0".to_string()),
            html_url: "https://github.com/owner/repo/actions/runs/501".to_string(),
            status: Some("in_progress".to_string()),
        }])
}

fn runtime_with(
    platform: Arc<RecordingPlatform>,
    registry: CommandRegistry,
) -> CommentCommandRuntime {
    CommentCommandRuntime::new(platform, registry, CommentDispatchConfig::new(BOT_RUN_URL))
}

fn default_runtime(platform: Arc<RecordingPlatform>) -> CommentCommandRuntime {
    runtime_with(platform, CommandRegistry::with_default_commands(fast_ci_config()))
}

#[tokio::test]
async fn unit_comment_without_commands_posts_nothing() {
    let platform = Arc::new(mergeable_platform());
    let runtime = default_runtime(platform.clone());
    for body in ["", "LGTM!", "please run /ci later", "/deploy now\n/unknown"] {
        let report = runtime
            .handle_comment(&test_event(body))
            .await
            .expect("handle");
        assert_eq!(report.outcome, DispatchOutcome::NoCommands, "{body}");
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn unit_unauthorized_author_is_ignored_silently() {
    let platform = Arc::new(mergeable_platform());
    let runtime = default_runtime(platform.clone());
    let mut event = test_event("/ci");
    event.author_association = "CONTRIBUTOR".to_string();
    let report = runtime.handle_comment(&event).await.expect("handle");
    assert_eq!(report.outcome, DispatchOutcome::Unauthorized);
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn functional_duplicate_commands_post_one_rejection_and_run_nothing() {
    let platform = Arc::new(mergeable_platform());
    let runtime = default_runtime(platform.clone());
    let report = runtime
        .handle_comment(&test_event("/ci\nand again\n/ci cancel"))
        .await
        .expect("handle");
    assert_eq!(report.outcome, DispatchOutcome::DuplicateCommands);
    assert_eq!(report.commands_executed, 0);
    assert_eq!(
        platform.comments(),
        vec!["@alice you can't use the same command more than once! 🙅".to_string()]
    );
    assert!(platform.dispatches().is_empty());
    assert!(platform.cancelled_runs().is_empty());
}

#[tokio::test]
async fn functional_named_arguments_before_any_command_are_a_no_op() {
    let platform = Arc::new(mergeable_platform());
    let runtime = default_runtime(platform.clone());
    let report = runtime
        .handle_comment(&test_event("+1\n+workflow:timeout 30"))
        .await
        .expect("handle");
    assert_eq!(report.outcome, DispatchOutcome::NoCommands);
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn functional_named_arguments_on_unsupported_command_post_apology() {
    let platform = Arc::new(mergeable_platform());
    let runtime = runtime_with(platform.clone(), registry_with_label_command());
    let report = runtime
        .handle_comment(&test_event("/ci\n/label\n+color red"))
        .await
        .expect("handle");
    assert_eq!(report.outcome, DispatchOutcome::ParseFailed);
    let comments = platform.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].starts_with("@alice I didn't understand [that]"));
    assert!(comments[0].contains("https://github.com/owner/repo/pull/7#issuecomment-1"));
    assert!(comments[0].contains(BOT_RUN_URL));
    assert!(platform.dispatches().is_empty());
}

#[tokio::test]
async fn integration_ci_trigger_dispatches_once_without_reply() {
    let platform = Arc::new(mergeable_platform());
    let runtime = default_runtime(platform.clone());
    let report = runtime
        .handle_comment(&test_event("/ci\n+workflow:timeout 30"))
        .await
        .expect("handle");
    assert_eq!(report.outcome, DispatchOutcome::Executed);
    assert_eq!(report.commands_executed, 1);
    assert_eq!(report.replies_posted, 0);
    let dispatches = platform.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].inputs["timeout"], "30");
    assert_eq!(dispatches[0].inputs["pr_number"], "7");
    assert!(platform.comments().is_empty());
}

#[tokio::test]
async fn integration_commands_run_sequentially_in_comment_order() {
    let platform = Arc::new(mergeable_platform());
    let runtime = runtime_with(platform.clone(), registry_with_label_command());
    let report = runtime
        .handle_comment(&test_event("/label\n/ci cancel"))
        .await
        .expect("handle");
    assert_eq!(report.commands_executed, 2);
    assert_eq!(report.replies_posted, 1);
    let reply = "@alice cancelled [CI run](https://github.com/owner/repo/actions/runs/501). 🛑";
    assert_eq!(
        platform.calls(),
        vec![
            PlatformCall::ListWorkflowRuns {
                workflow_id: "ci-manual.yaml".to_string(),
                status: "in_progress".to_string(),
            },
            PlatformCall::CancelWorkflowRun(501),
            PlatformCall::CreateIssueComment {
                issue_number: 7,
                body: reply.to_string(),
            },
        ]
    );
}

#[derive(Debug)]
struct FailingCommand;

#[async_trait]
impl BotCommand for FailingCommand {
    fn kind(&self) -> &'static str {
        "explode"
    }

    async fn run(&self, _platform: &dyn CiPlatform) -> Result<CommandOutcome> {
        anyhow::bail!("platform contract violated")
    }
}

#[derive(Debug)]
struct QuietCommand;

#[async_trait]
impl BotCommand for QuietCommand {
    fn kind(&self) -> &'static str {
        "quiet"
    }

    async fn run(&self, _platform: &dyn CiPlatform) -> Result<CommandOutcome> {
        Ok(CommandOutcome::Silent)
    }
}

#[tokio::test]
async fn regression_command_failure_propagates_and_stops_later_commands() {
    let platform = Arc::new(mergeable_platform());
    let registry = CommandRegistry::with_default_commands(fast_ci_config())
        .register("explode", |_event, _args| {
            Box::new(FailingCommand) as Box<dyn BotCommand>
        })
        .register("quiet", |_event, _args| {
            Box::new(QuietCommand) as Box<dyn BotCommand>
        });
    let runtime = runtime_with(platform.clone(), registry);

    let quiet = runtime
        .handle_comment(&test_event("/quiet"))
        .await
        .expect("quiet command");
    assert_eq!(quiet.commands_executed, 1);
    assert_eq!(quiet.replies_posted, 0);

    let error = runtime
        .handle_comment(&test_event("/explode\n/ci"))
        .await
        .expect_err("failure must propagate");
    assert!(error.to_string().contains("platform contract violated"));
    assert!(platform.dispatches().is_empty());
    assert!(platform.comments().is_empty());
}

fn bot_config(base_url: &str) -> CommentCommandBotConfig {
    CommentCommandBotConfig {
        api_base: base_url.to_string(),
        token: "test-token".to_string(),
        server_url: "https://github.com".to_string(),
        run_id: "42".to_string(),
        correlation_id: "corr-e2e".to_string(),
        trusted_associations: vec!["OWNER".to_string(), "MEMBER".to_string()],
        request_timeout_ms: 3_000,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
        ci: CiCommandConfig {
            dispatch_ref: DispatchRef::DefaultBranch,
            mergeable_retry_delay: Duration::ZERO,
            ..CiCommandConfig::default()
        },
    }
}

fn comment_payload(body: &str, created_at: &str) -> IssueCommentEventPayload {
    serde_json::from_value(json!({
        "action": "created",
        "comment": {
            "user": {"login": "alice"},
            "author_association": "OWNER",
            "body": body,
            "html_url": "https://github.com/owner/repo/pull/7#issuecomment-1",
            "created_at": created_at
        },
        "issue": {"number": 7, "pull_request": {}},
        "repository": {"name": "repo", "owner": {"login": "owner"}}
    }))
    .expect("payload")
}

#[tokio::test]
async fn integration_bot_dispatches_ci_workflow_through_github_api() {
    let server = MockServer::start();
    let pull = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/7");
        then.status(200).json_body(json!({
            "number": 7,
            "mergeable": true,
            "merge_commit_sha": "abc123"
        }));
    });
    let _commit = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/commits/abc123");
        then.status(200).json_body(json!({
            "sha": "abc123",
            "commit": {"committer": {"date": "2026-01-01T00:00:05Z"}}
        }));
    });
    let _repository = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo");
        then.status(200).json_body(json!({
            "default_branch": "main"
        }));
    });
    let dispatch = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/actions/workflows/ci-manual.yaml/dispatches")
            .body_includes("\"ref\":\"main\"")
            .body_includes("\"uuid\":\"corr-e2e\"")
            .body_includes("\"pr_number\":\"7\"")
            .body_includes("\"git_sha\":\"abc123\"")
            .body_includes("\"requester\":\"alice\"")
            .body_includes("\"timeout\":\"30\"");
        then.status(204);
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments");
        then.status(201).json_body(json!({
            "id": 1,
            "html_url": "https://example.test/c/1"
        }));
    });

    let report = run_comment_command_bot(
        bot_config(&server.base_url()),
        comment_payload("/ci\n+workflow:timeout 30", "2026-01-01T00:00:10Z"),
    )
    .await
    .expect("bot run");
    assert_eq!(report.outcome, DispatchOutcome::Executed);
    pull.assert_calls(1);
    dispatch.assert_calls(1);
    comment.assert_calls(0);
}

#[tokio::test]
async fn integration_bot_replies_when_pull_request_has_conflicts() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/7");
        then.status(200).json_body(json!({
            "number": 7,
            "mergeable": false,
            "merge_commit_sha": null
        }));
    });
    let dispatch = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/actions/workflows/ci-manual.yaml/dispatches");
        then.status(204);
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments")
            .body_includes("not currently mergeable");
        then.status(201).json_body(json!({
            "id": 2,
            "html_url": "https://example.test/c/2"
        }));
    });

    run_comment_command_bot(
        bot_config(&server.base_url()),
        comment_payload("/ci test", "2026-01-01T00:00:10Z"),
    )
    .await
    .expect("bot run");
    comment.assert_calls(1);
    dispatch.assert_calls(0);
}

#[tokio::test]
async fn integration_bot_cancel_reports_missing_runs() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/repos/owner/repo/actions/workflows/ci-manual.yaml/runs")
            .query_param("status", "in_progress");
        then.status(200).json_body(json!({
            "total_count": 1,
            "workflow_runs": [{
                "id": 9,
                "name": "#70 - corr",
                "html_url": "https://github.com/owner/repo/actions/runs/9",
                "status": "in_progress"
            }]
        }));
    });
    let cancel = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/actions/runs/9/cancel");
        then.status(202).json_body(json!({}));
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments")
            .body_includes("no running CI found for this PR.");
        then.status(201).json_body(json!({
            "id": 3,
            "html_url": "https://example.test/c/3"
        }));
    });

    run_comment_command_bot(
        bot_config(&server.base_url()),
        comment_payload("/ci cancel", "2026-01-01T00:00:10Z"),
    )
    .await
    .expect("bot run");
    comment.assert_calls(1);
    cancel.assert_calls(0);
}

#[tokio::test]
async fn regression_bot_fails_invocation_on_unknown_mergeable_value() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/7");
        then.status(200).json_body(json!({
            "number": 7,
            "mergeable": "maybe",
            "merge_commit_sha": "abc123"
        }));
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments");
        then.status(201).json_body(json!({
            "id": 4,
            "html_url": "https://example.test/c/4"
        }));
    });

    let error = run_comment_command_bot(
        bot_config(&server.base_url()),
        comment_payload("/ci", "2026-01-01T00:00:10Z"),
    )
    .await
    .expect_err("unknown mergeable value must fail the run");
    assert!(format!("{error:#}").contains("unknown mergeable value"));
    comment.assert_calls(0);
}

#[tokio::test]
async fn regression_bot_skips_payload_without_comment_before_any_request() {
    let server = MockServer::start();
    let any_request = server.mock(|_when, then| {
        then.status(500);
    });
    let payload: IssueCommentEventPayload = serde_json::from_value(json!({
        "action": "opened",
        "issue": {"number": 7, "pull_request": {}},
        "repository": {"name": "repo", "owner": {"login": "owner"}}
    }))
    .expect("payload");
    let report = run_comment_command_bot(bot_config(&server.base_url()), payload)
        .await
        .expect("bot run");
    assert_eq!(
        report.outcome,
        DispatchOutcome::Skipped {
            reason: "missing_comment"
        }
    );
    any_request.assert_calls(0);
}
