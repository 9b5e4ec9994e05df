//! Comment-event orchestration: authorization, parsing, duplicate rejection,
//! sequential command execution, and reply posting.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use prbot_commands::comment_auth::{
    build_trusted_author_associations, default_trusted_author_associations,
    is_trusted_author_association,
};
use prbot_commands::comment_event::{CommentEvent, CommentEventSelection, IssueCommentEventPayload};
use prbot_commands::comment_reply::{
    bot_run_url, render_duplicate_command_reply, render_parse_failure_reply,
};

use crate::ci_command::CiCommandConfig;
use crate::command_model::{parse_comment_commands, CommandOutcome, CommandRegistry};
use crate::github_api_client::GithubApiClient;
use crate::platform::CiPlatform;

#[derive(Debug, Clone)]
/// Runtime configuration for one bot invocation.
pub struct CommentCommandBotConfig {
    pub api_base: String,
    pub token: String,
    pub server_url: String,
    pub run_id: String,
    pub correlation_id: String,
    pub trusted_associations: Vec<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub ci: CiCommandConfig,
}

#[derive(Debug, Clone)]
pub struct CommentDispatchConfig {
    pub trusted_associations: HashSet<String>,
    /// Link to this invocation's log, included in parse-failure replies.
    pub bot_run_url: String,
}

impl CommentDispatchConfig {
    pub fn new(bot_run_url: impl Into<String>) -> Self {
        Self {
            trusted_associations: default_trusted_author_associations(),
            bot_run_url: bot_run_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `DispatchOutcome` values.
pub enum DispatchOutcome {
    Skipped { reason: &'static str },
    Unauthorized,
    ParseFailed,
    NoCommands,
    DuplicateCommands,
    Executed,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Unauthorized => "unauthorized",
            Self::ParseFailed => "parse_failed",
            Self::NoCommands => "no_commands",
            Self::DuplicateCommands => "duplicate_commands",
            Self::Executed => "executed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub commands_parsed: usize,
    pub commands_executed: usize,
    pub replies_posted: usize,
}

impl DispatchReport {
    fn finished(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            commands_parsed: 0,
            commands_executed: 0,
            replies_posted: 0,
        }
    }
}

/// Processes comment events against one repository's platform client.
pub struct CommentCommandRuntime {
    platform: Arc<dyn CiPlatform>,
    registry: CommandRegistry,
    config: CommentDispatchConfig,
}

impl CommentCommandRuntime {
    pub fn new(
        platform: Arc<dyn CiPlatform>,
        registry: CommandRegistry,
        config: CommentDispatchConfig,
    ) -> Self {
        Self {
            platform,
            registry,
            config,
        }
    }

    pub async fn handle_comment(&self, event: &CommentEvent) -> Result<DispatchReport> {
        let author = event.author_login.as_str();
        if !is_trusted_author_association(
            &event.author_association,
            &self.config.trusted_associations,
        ) {
            tracing::info!(
                author,
                association = %event.author_association,
                "comment author is not authorized"
            );
            return Ok(DispatchReport::finished(DispatchOutcome::Unauthorized));
        }
        tracing::info!(author, "comment author is authorized");

        let commands = match parse_comment_commands(event, &self.registry) {
            Ok(commands) => commands,
            Err(error) => {
                tracing::warn!(%error, "failed to parse comment commands");
                let reply = render_parse_failure_reply(
                    author,
                    &event.comment_url,
                    &self.config.bot_run_url,
                );
                self.post_reply(event, &reply).await?;
                let mut report = DispatchReport::finished(DispatchOutcome::ParseFailed);
                report.replies_posted = 1;
                return Ok(report);
            }
        };
        if commands.is_empty() {
            tracing::info!("no commands found in comment body");
            return Ok(DispatchReport::finished(DispatchOutcome::NoCommands));
        }

        let mut report = DispatchReport::finished(DispatchOutcome::Executed);
        report.commands_parsed = commands.len();
        let unique_kinds = commands
            .iter()
            .map(|command| command.kind())
            .collect::<HashSet<_>>();
        if unique_kinds.len() != commands.len() {
            self.post_reply(event, &render_duplicate_command_reply(author))
                .await?;
            report.outcome = DispatchOutcome::DuplicateCommands;
            report.replies_posted = 1;
            return Ok(report);
        }
        tracing::info!(count = commands.len(), "command(s) found in comment body");

        // One at a time; later commands observe the side effects of earlier ones.
        for command in &commands {
            let outcome = command.run(self.platform.as_ref()).await?;
            report.commands_executed += 1;
            match outcome {
                CommandOutcome::Reply(reply) => {
                    self.post_reply(event, &reply).await?;
                    report.replies_posted += 1;
                }
                CommandOutcome::Note(note) => {
                    tracing::info!(command = command.kind(), note = %note, "command returned");
                }
                CommandOutcome::Silent => {
                    tracing::info!(command = command.kind(), "command did not return a reply");
                }
            }
        }
        Ok(report)
    }

    async fn post_reply(&self, event: &CommentEvent, reply: &str) -> Result<()> {
        self.platform
            .create_issue_comment(event.issue_number, reply)
            .await
    }
}

/// Runs the bot for one `issue_comment` payload against the GitHub API.
pub async fn run_comment_command_bot(
    config: CommentCommandBotConfig,
    payload: IssueCommentEventPayload,
) -> Result<DispatchReport> {
    let selection = payload.select_comment_event(&config.correlation_id);
    let event = match selection {
        CommentEventSelection::Selected(event) => event,
        CommentEventSelection::Skipped { reason } => {
            tracing::info!(reason, "no comment to process");
            return Ok(DispatchReport::finished(DispatchOutcome::Skipped { reason }));
        }
    };

    let github_client = GithubApiClient::new(
        &config.api_base,
        &config.token,
        event.repo.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;
    let mut trusted_associations = build_trusted_author_associations(
        config.trusted_associations.iter().map(String::as_str),
    );
    if trusted_associations.is_empty() {
        trusted_associations = default_trusted_author_associations();
    }
    let dispatch_config = CommentDispatchConfig {
        trusted_associations,
        bot_run_url: bot_run_url(&config.server_url, &event.repo, &config.run_id),
    };
    let runtime = CommentCommandRuntime::new(
        Arc::new(github_client),
        CommandRegistry::with_default_commands(config.ci),
        dispatch_config,
    );
    runtime.handle_comment(&event).await
}

#[cfg(test)]
mod tests;
