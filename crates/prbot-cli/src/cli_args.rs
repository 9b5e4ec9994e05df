use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use prbot_runtime::{CiCommandConfig, CommentCommandBotConfig, DispatchRef};
use tracing::level_filters::LevelFilter;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    value
        .trim()
        .parse::<LevelFilter>()
        .map_err(|error| format!("invalid log level '{value}': {error}"))
}

#[derive(Debug, Parser)]
#[command(
    name = "prbot",
    about = "Run pull-request comment commands (/ci, /ci cancel) from a GitHub issue_comment event",
    version
)]
/// Public struct `Cli` used by the `prbot` binary.
pub struct Cli {
    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the issue_comment webhook payload JSON"
    )]
    pub event_path: PathBuf,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API access"
    )]
    pub github_token: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "GitHub API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-server-url",
        env = "GITHUB_SERVER_URL",
        default_value = "https://github.com",
        help = "GitHub web URL used to link this run's logs"
    )]
    pub github_server_url: String,

    #[arg(
        long = "github-run-id",
        env = "GITHUB_RUN_ID",
        help = "Workflow run id of this bot invocation"
    )]
    pub github_run_id: String,

    #[arg(
        long = "correlation-id",
        env = "PRBOT_CORRELATION_ID",
        help = "Value of the dispatched workflow's `uuid` input (random UUID when unset)"
    )]
    pub correlation_id: Option<String>,

    #[arg(
        long = "ci-workflow",
        env = "PRBOT_CI_WORKFLOW",
        default_value = prbot_runtime::ci_command::CI_DEFAULT_WORKFLOW_ID,
        help = "Workflow file or id dispatched by /ci and searched by /ci cancel"
    )]
    pub ci_workflow: String,

    #[arg(
        long = "ci-dispatch-ref",
        env = "PRBOT_CI_DISPATCH_REF",
        help = "Git ref the CI workflow is dispatched on (repository default branch when unset)"
    )]
    pub ci_dispatch_ref: Option<String>,

    #[arg(
        long = "mergeable-retry-attempts",
        env = "PRBOT_MERGEABLE_RETRY_ATTEMPTS",
        default_value_t = 3,
        help = "Extra pull request fetches while GitHub is still computing merge status"
    )]
    pub mergeable_retry_attempts: usize,

    #[arg(
        long = "mergeable-retry-delay-ms",
        env = "PRBOT_MERGEABLE_RETRY_DELAY_MS",
        default_value_t = 2_000,
        help = "Fixed delay in milliseconds between merge status rechecks"
    )]
    pub mergeable_retry_delay_ms: u64,

    #[arg(
        long = "trusted-association",
        env = "PRBOT_TRUSTED_ASSOCIATION",
        value_delimiter = ',',
        default_value = "OWNER,MEMBER",
        help = "Comment author associations allowed to run commands"
    )]
    pub trusted_association: Vec<String>,

    #[arg(
        long = "request-timeout-ms",
        env = "PRBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 15_000,
        help = "Timeout in milliseconds for each GitHub API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "github-retry-max-attempts",
        env = "PRBOT_GITHUB_RETRY_MAX_ATTEMPTS",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Attempts per GitHub API request on rate-limit or server errors (1 disables retries)"
    )]
    pub github_retry_max_attempts: usize,

    #[arg(
        long = "github-retry-base-delay-ms",
        env = "PRBOT_GITHUB_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base backoff delay in milliseconds for GitHub API retries"
    )]
    pub github_retry_base_delay_ms: u64,

    #[arg(
        long = "log-level",
        env = "PRBOT_LOG",
        default_value = "info",
        value_parser = parse_log_level,
        help = "Default log level when RUST_LOG is unset (error, warn, info, debug, trace, off)"
    )]
    pub log_level: LevelFilter,
}

impl Cli {
    pub fn bot_config(&self, correlation_id: String) -> CommentCommandBotConfig {
        let dispatch_ref = match self.ci_dispatch_ref.as_deref().map(str::trim) {
            Some(git_ref) if !git_ref.is_empty() => DispatchRef::Named(git_ref.to_string()),
            _ => DispatchRef::DefaultBranch,
        };
        CommentCommandBotConfig {
            api_base: self.github_api_base.clone(),
            token: self.github_token.clone(),
            server_url: self.github_server_url.clone(),
            run_id: self.github_run_id.clone(),
            correlation_id,
            trusted_associations: self.trusted_association.clone(),
            request_timeout_ms: self.request_timeout_ms,
            retry_max_attempts: self.github_retry_max_attempts,
            retry_base_delay_ms: self.github_retry_base_delay_ms,
            ci: CiCommandConfig {
                workflow_id: self.ci_workflow.clone(),
                dispatch_ref,
                mergeable_retry_attempts: self.mergeable_retry_attempts,
                mergeable_retry_delay: Duration::from_millis(self.mergeable_retry_delay_ms),
            },
        }
    }
}
