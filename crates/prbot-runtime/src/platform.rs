//! Narrow capability surface the bot needs from the hosting platform.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// GitHub's tri-state `mergeable` flag.
pub enum MergeableState {
    Mergeable,
    Conflicting,
    /// GitHub has not finished computing the merge result yet.
    Pending,
}

impl MergeableState {
    /// Map the raw API value; anything other than `true`/`false`/`null` is a contract violation.
    pub fn from_api_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(true) => Ok(Self::Mergeable),
            Value::Bool(false) => Ok(Self::Conflicting),
            Value::Null => Ok(Self::Pending),
            other => bail!("unknown mergeable value: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDetails {
    pub number: u64,
    pub mergeable: MergeableState,
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetails {
    pub sha: String,
    pub committer_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRunSummary {
    pub id: u64,
    pub name: Option<String>,
    pub html_url: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDispatchRequest {
    pub workflow_id: String,
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

#[async_trait]
/// Trait contract for `CiPlatform` behavior, scoped to one repository.
pub trait CiPlatform: Send + Sync {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails>;

    async fn get_commit(&self, reference: &str) -> Result<CommitDetails>;

    /// Runs are returned in platform order (most recent first).
    async fn list_workflow_runs(
        &self,
        workflow_id: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRunSummary>>;

    async fn cancel_workflow_run(&self, run_id: u64) -> Result<()>;

    async fn create_workflow_dispatch(&self, request: &WorkflowDispatchRequest) -> Result<()>;

    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<()>;

    async fn get_default_branch(&self) -> Result<String>;
}
