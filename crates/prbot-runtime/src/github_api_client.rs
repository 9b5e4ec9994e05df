use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prbot_commands::comment_event::RepoRef;
use prbot_commands::github_transport_helpers::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::platform::{
    CiPlatform, CommitDetails, MergeableState, PullRequestDetails, WorkflowDispatchRequest,
    WorkflowRunSummary,
};

const WORKFLOW_RUNS_PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, Deserialize)]
struct GithubCommentCreateResponse {
    id: u64,
    html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequestResponse {
    number: u64,
    /// Required; an absent key is not the same as `null` (still computing).
    mergeable: Value,
    #[serde(default)]
    merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommitIdentity {
    date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubGitCommit {
    #[serde(default)]
    committer: Option<GithubCommitIdentity>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommitResponse {
    sha: String,
    commit: GithubGitCommit,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubWorkflowRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    html_url: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubWorkflowRunsResponse {
    #[serde(default)]
    workflow_runs: Vec<GithubWorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRepositoryResponse {
    default_branch: String,
}

#[derive(Clone)]
pub(crate) struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub(crate) fn new(
        api_base: &str,
        token: &str,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("prbot-comment-commands"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}",
            self.api_base, self.repo.owner, self.repo.name
        );
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(
                    "x-prbot-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tracing::warn!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "retrying github api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tracing::warn!(operation, attempt, "retrying github api transport error");
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, request_builder)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }

    async fn request_no_content<F>(&self, operation: &str, request_builder: F) -> Result<()>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, request_builder).await?;
        Ok(())
    }
}

#[async_trait]
impl CiPlatform for GithubApiClient {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails> {
        let url = self.repo_url(&format!("pulls/{number}"));
        let pull_request: GithubPullRequestResponse = self
            .request_json("get pull request", || self.http.get(&url))
            .await?;
        let mergeable = MergeableState::from_api_value(&pull_request.mergeable)
            .with_context(|| format!("pull request #{number} reported an invalid merge status"))?;
        Ok(PullRequestDetails {
            number: pull_request.number,
            mergeable,
            merge_commit_sha: pull_request.merge_commit_sha,
        })
    }

    async fn get_commit(&self, reference: &str) -> Result<CommitDetails> {
        let url = self.repo_url(&format!("commits/{reference}"));
        let commit: GithubCommitResponse = self
            .request_json("get commit", || self.http.get(&url))
            .await?;
        let committer = commit
            .commit
            .committer
            .ok_or_else(|| anyhow!("commit {} has no committer metadata", commit.sha))?;
        Ok(CommitDetails {
            sha: commit.sha,
            committer_date: committer.date,
        })
    }

    async fn list_workflow_runs(
        &self,
        workflow_id: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let url = self.repo_url(&format!("actions/workflows/{workflow_id}/runs"));
        let runs: GithubWorkflowRunsResponse = self
            .request_json("list workflow runs", || {
                self.http
                    .get(&url)
                    .query(&[("status", status), ("per_page", WORKFLOW_RUNS_PAGE_SIZE)])
            })
            .await?;
        Ok(runs
            .workflow_runs
            .into_iter()
            .map(|run| WorkflowRunSummary {
                id: run.id,
                name: run.name,
                html_url: run.html_url,
                status: run.status,
            })
            .collect())
    }

    async fn cancel_workflow_run(&self, run_id: u64) -> Result<()> {
        let url = self.repo_url(&format!("actions/runs/{run_id}/cancel"));
        self.request_no_content("cancel workflow run", || self.http.post(&url))
            .await
    }

    async fn create_workflow_dispatch(&self, request: &WorkflowDispatchRequest) -> Result<()> {
        let url = self.repo_url(&format!(
            "actions/workflows/{}/dispatches",
            request.workflow_id
        ));
        let payload = json!({
            "ref": request.git_ref,
            "inputs": request.inputs,
        });
        self.request_no_content("create workflow dispatch", || {
            self.http.post(&url).json(&payload)
        })
        .await
    }

    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        let payload = json!({ "body": body });
        let created: GithubCommentCreateResponse = self
            .request_json("create issue comment", || self.http.post(&url).json(&payload))
            .await?;
        tracing::debug!(
            issue_number,
            comment_id = created.id,
            html_url = created.html_url.as_deref().unwrap_or("unknown"),
            "posted reply comment"
        );
        Ok(())
    }

    async fn get_default_branch(&self) -> Result<String> {
        let url = self.repo_url("");
        let repository: GithubRepositoryResponse = self
            .request_json("get repository", || self.http.get(&url))
            .await?;
        Ok(repository.default_branch)
    }
}
