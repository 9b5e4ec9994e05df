//! Runtime for the PR comment-command bot.
//!
//! Turns one `issue_comment` event into zero or more actions against GitHub:
//! the authorization gate, command parsing, duplicate rejection, and the CI
//! trigger/cancel command all run from [`run_comment_command_bot`].

pub mod ci_command;
pub mod command_model;
pub mod comment_dispatch;
mod github_api_client;
pub mod platform;

#[cfg(test)]
mod fake_platform;

pub use ci_command::{CiCommand, CiCommandConfig, DispatchRef};
pub use command_model::{
    parse_comment_commands, BotCommand, CommandOutcome, CommandParseError, CommandRegistry,
    NamedArguments,
};
pub use comment_dispatch::{
    run_comment_command_bot, CommentCommandBotConfig, CommentCommandRuntime,
    CommentDispatchConfig, DispatchOutcome, DispatchReport,
};
pub use platform::{
    CiPlatform, CommitDetails, MergeableState, PullRequestDetails, WorkflowDispatchRequest,
    WorkflowRunSummary,
};
