//! In-memory `CiPlatform` that replays scripted responses and records every call.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::platform::{
    CiPlatform, CommitDetails, PullRequestDetails, WorkflowDispatchRequest, WorkflowRunSummary,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformCall {
    GetPullRequest(u64),
    GetCommit(String),
    ListWorkflowRuns { workflow_id: String, status: String },
    CancelWorkflowRun(u64),
    CreateWorkflowDispatch(WorkflowDispatchRequest),
    CreateIssueComment { issue_number: u64, body: String },
    GetDefaultBranch,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingPlatform {
    pull_requests: Mutex<VecDeque<PullRequestDetails>>,
    commit: Option<CommitDetails>,
    runs: Vec<WorkflowRunSummary>,
    default_branch: Option<String>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl RecordingPlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Responses are served in order; the last one repeats once the script runs out.
    pub(crate) fn with_pull_requests(
        self,
        pull_requests: impl IntoIterator<Item = PullRequestDetails>,
    ) -> Self {
        *self.pull_requests.lock().expect("pull request lock") =
            pull_requests.into_iter().collect();
        self
    }

    pub(crate) fn with_commit(mut self, commit: CommitDetails) -> Self {
        self.commit = Some(commit);
        self
    }

    pub(crate) fn with_runs(mut self, runs: impl IntoIterator<Item = WorkflowRunSummary>) -> Self {
        self.runs = runs.into_iter().collect();
        self
    }

    pub(crate) fn with_default_branch(mut self, branch: &str) -> Self {
        self.default_branch = Some(branch.to_string());
        self
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().expect("calls lock").push(call);
    }

    pub(crate) fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count_calls(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub(crate) fn comments(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::CreateIssueComment { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn dispatches(&self) -> Vec<WorkflowDispatchRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::CreateWorkflowDispatch(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn cancelled_runs(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::CancelWorkflowRun(run_id) => Some(run_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CiPlatform for RecordingPlatform {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails> {
        self.record(PlatformCall::GetPullRequest(number));
        let mut scripted = self.pull_requests.lock().expect("pull request lock");
        if scripted.len() > 1 {
            return scripted
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted pull request"));
        }
        scripted
            .front()
            .cloned()
            .ok_or_else(|| anyhow!("no scripted pull request"))
    }

    async fn get_commit(&self, reference: &str) -> Result<CommitDetails> {
        self.record(PlatformCall::GetCommit(reference.to_string()));
        self.commit
            .clone()
            .ok_or_else(|| anyhow!("no scripted commit for {reference}"))
    }

    async fn list_workflow_runs(
        &self,
        workflow_id: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRunSummary>> {
        self.record(PlatformCall::ListWorkflowRuns {
            workflow_id: workflow_id.to_string(),
            status: status.to_string(),
        });
        Ok(self.runs.clone())
    }

    async fn cancel_workflow_run(&self, run_id: u64) -> Result<()> {
        self.record(PlatformCall::CancelWorkflowRun(run_id));
        Ok(())
    }

    async fn create_workflow_dispatch(&self, request: &WorkflowDispatchRequest) -> Result<()> {
        self.record(PlatformCall::CreateWorkflowDispatch(request.clone()));
        Ok(())
    }

    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        self.record(PlatformCall::CreateIssueComment {
            issue_number,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn get_default_branch(&self) -> Result<String> {
        self.record(PlatformCall::GetDefaultBranch);
        self.default_branch
            .clone()
            .ok_or_else(|| anyhow!("no scripted default branch"))
    }
}
