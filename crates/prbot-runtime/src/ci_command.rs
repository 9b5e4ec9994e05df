//! `/ci` command: trigger or cancel the manual CI workflow for a pull request.
//!
//! `/ci` and `/ci test` dispatch the workflow against the PR's merge commit
//! once GitHub reports the PR as mergeable and the merge commit is not newer
//! than the request. `/ci cancel` cancels the most recent in-progress run whose
//! name carries this PR's number. Lines of the form `+workflow:<input> <value>`
//! after `/ci` override individual workflow inputs.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prbot_commands::comment_event::{CommentEvent, RepoRef};
use prbot_commands::comment_reply::{
    render_ci_cancelled_reply, render_merge_status_pending_reply, render_no_running_ci_reply,
    render_not_mergeable_reply, render_stale_request_reply,
};

use crate::command_model::{BotCommand, CommandOutcome, NamedArguments};
use crate::platform::{CiPlatform, MergeableState, WorkflowDispatchRequest};

pub const CI_COMMAND_NAME: &str = "ci";
pub const CI_DEFAULT_GOAL: &str = "test";
pub const CI_CANCEL_GOAL: &str = "cancel";
pub const CI_DEFAULT_WORKFLOW_ID: &str = "ci-manual.yaml";
/// Named arguments with this prefix are passed straight through as workflow inputs.
pub const WORKFLOW_INPUT_PREFIX: &str = "workflow:";
const IN_PROGRESS_RUN_STATUS: &str = "in_progress";
const DEFAULT_MERGEABLE_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_MERGEABLE_RETRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `DispatchRef` values.
pub enum DispatchRef {
    /// Resolve the repository's default branch at dispatch time.
    DefaultBranch,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiCommandConfig {
    pub workflow_id: String,
    pub dispatch_ref: DispatchRef,
    pub mergeable_retry_attempts: usize,
    pub mergeable_retry_delay: Duration,
}

impl Default for CiCommandConfig {
    fn default() -> Self {
        Self {
            workflow_id: CI_DEFAULT_WORKFLOW_ID.to_string(),
            dispatch_ref: DispatchRef::DefaultBranch,
            mergeable_retry_attempts: DEFAULT_MERGEABLE_RETRY_ATTEMPTS,
            mergeable_retry_delay: Duration::from_millis(DEFAULT_MERGEABLE_RETRY_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiCommand {
    repo: RepoRef,
    pr_number: u64,
    author: String,
    comment_url: String,
    comment_created_at: DateTime<Utc>,
    correlation_id: String,
    goal: String,
    named_arguments: NamedArguments,
    config: CiCommandConfig,
}

impl CiCommand {
    pub fn new(event: &CommentEvent, args: Option<&str>, config: CiCommandConfig) -> Self {
        let goal = match args {
            Some(args) if !args.is_empty() => args.to_string(),
            _ => CI_DEFAULT_GOAL.to_string(),
        };
        Self {
            repo: event.repo.clone(),
            pr_number: event.issue_number,
            author: event.author_login.clone(),
            comment_url: event.comment_url.clone(),
            comment_created_at: event.created_at,
            correlation_id: event.correlation_id.clone(),
            goal,
            named_arguments: NamedArguments::new(),
            config,
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Display-name prefix of workflow runs dispatched for this PR.
    fn run_name_prefix(&self) -> String {
        format!("#{} - ", self.pr_number)
    }

    async fn cancel_ci(&self, platform: &dyn CiPlatform) -> Result<CommandOutcome> {
        let runs = platform
            .list_workflow_runs(&self.config.workflow_id, IN_PROGRESS_RUN_STATUS)
            .await?;
        let prefix = self.run_name_prefix();
        let Some(most_recent) = runs.iter().find(|run| {
            run.name
                .as_deref()
                .is_some_and(|name| name.starts_with(&prefix))
        }) else {
            return Ok(CommandOutcome::Reply(render_no_running_ci_reply(
                &self.author,
            )));
        };

        tracing::info!(
            run_id = most_recent.id,
            run_name = most_recent.name.as_deref().unwrap_or_default(),
            run_status = most_recent.status.as_deref().unwrap_or("unknown"),
            pr_number = self.pr_number,
            "cancelling ci run"
        );
        platform.cancel_workflow_run(most_recent.id).await?;
        Ok(CommandOutcome::Reply(render_ci_cancelled_reply(
            &self.author,
            &most_recent.html_url,
        )))
    }

    async fn trigger_ci(&self, platform: &dyn CiPlatform) -> Result<CommandOutcome> {
        let mut pull_request = platform.get_pull_request(self.pr_number).await?;

        // GitHub computes mergeability asynchronously, so the first read may be null.
        let mut retries = 0_usize;
        while pull_request.mergeable == MergeableState::Pending
            && retries < self.config.mergeable_retry_attempts
        {
            retries += 1;
            tracing::info!(
                pr_number = self.pr_number,
                retry = retries,
                "merge status still pending, rechecking"
            );
            tokio::time::sleep(self.config.mergeable_retry_delay).await;
            pull_request = platform.get_pull_request(self.pr_number).await?;
        }

        tracing::debug!(
            pr_number = pull_request.number,
            mergeable = ?pull_request.mergeable,
            "merge status settled"
        );
        match pull_request.mergeable {
            MergeableState::Mergeable => {}
            MergeableState::Conflicting => {
                return Ok(CommandOutcome::Reply(render_not_mergeable_reply(
                    &self.author,
                )));
            }
            MergeableState::Pending => {
                return Ok(CommandOutcome::Reply(render_merge_status_pending_reply(
                    &self.author,
                )));
            }
        }

        let merge_commit_sha = pull_request
            .merge_commit_sha
            .as_deref()
            .filter(|sha| !sha.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "pull request #{} is mergeable but has no merge commit",
                    self.pr_number
                )
            })?;
        let merge_commit = platform.get_commit(merge_commit_sha).await?;
        if self.comment_created_at < merge_commit.committer_date {
            tracing::info!(
                comment_created_at = %self.comment_created_at,
                merge_commit = %merge_commit.sha,
                merge_commit_date = %merge_commit.committer_date,
                "pull request changed after the request"
            );
            return Ok(CommandOutcome::Reply(render_stale_request_reply(
                &self.author,
            )));
        }

        let git_ref = match &self.config.dispatch_ref {
            DispatchRef::Named(git_ref) => git_ref.clone(),
            DispatchRef::DefaultBranch => platform.get_default_branch().await?,
        };
        let request = WorkflowDispatchRequest {
            workflow_id: self.config.workflow_id.clone(),
            git_ref,
            inputs: self.dispatch_inputs(merge_commit_sha),
        };
        tracing::info!(
            workflow = %request.workflow_id,
            git_ref = %request.git_ref,
            inputs = ?request.inputs,
            "dispatching workflow"
        );
        platform.create_workflow_dispatch(&request).await?;
        Ok(CommandOutcome::Note(format!(
            "dispatched {} on {} for #{}",
            request.workflow_id, request.git_ref, self.pr_number
        )))
    }

    fn dispatch_inputs(&self, merge_commit_sha: &str) -> BTreeMap<String, String> {
        let mut inputs = BTreeMap::from([
            ("uuid".to_string(), self.correlation_id.clone()),
            ("pr_number".to_string(), self.pr_number.to_string()),
            ("git_sha".to_string(), merge_commit_sha.to_string()),
            ("requester".to_string(), self.author.clone()),
            ("comment_url".to_string(), self.comment_url.clone()),
        ]);
        for (name, args) in &self.named_arguments {
            let Some(input) = name.strip_prefix(WORKFLOW_INPUT_PREFIX) else {
                continue;
            };
            match args {
                Some(value) => {
                    inputs.insert(input.to_string(), value.clone());
                }
                // A bare `+workflow:<input>` falls back to the workflow's own default.
                None => {
                    inputs.remove(input);
                }
            }
        }
        inputs
    }
}

#[async_trait]
impl BotCommand for CiCommand {
    fn kind(&self) -> &'static str {
        CI_COMMAND_NAME
    }

    fn named_arguments_mut(&mut self) -> Option<&mut NamedArguments> {
        Some(&mut self.named_arguments)
    }

    async fn run(&self, platform: &dyn CiPlatform) -> Result<CommandOutcome> {
        tracing::info!(
            repo = %self.repo.as_slug(),
            pr_number = self.pr_number,
            goal = %self.goal,
            "running ci command"
        );
        if self.goal == CI_CANCEL_GOAL {
            return self.cancel_ci(platform).await;
        }
        self.trigger_ci(platform).await
    }
}
