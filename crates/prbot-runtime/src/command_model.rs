//! Command model, registry, and comment-to-command parsing.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use prbot_commands::comment_event::CommentEvent;
use prbot_commands::comment_line_parser::{
    parse_comment_line, split_comment_lines, ParsedCommentLine,
};
use thiserror::Error;

use crate::ci_command::{CiCommand, CiCommandConfig, CI_COMMAND_NAME};
use crate::platform::CiPlatform;

/// Named arguments attached to a command; a missing tail is stored as `None`.
pub type NamedArguments = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of running one command.
pub enum CommandOutcome {
    /// Posted as a new comment on the PR.
    Reply(String),
    /// Logged only.
    Note(String),
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Structural errors raised while turning a comment into commands.
pub enum CommandParseError {
    #[error(
        "named arguments `{name}` follow command ({command}), which does not support arguments"
    )]
    NamedArgumentsUnsupported {
        command: &'static str,
        name: String,
        args: Option<String>,
    },
}

#[async_trait]
/// Trait contract for `BotCommand` behavior.
pub trait BotCommand: fmt::Debug + Send + Sync {
    /// Kind tag; two commands of the same kind may not appear in one comment.
    fn kind(&self) -> &'static str;

    /// Sink for `+name args` lines, or `None` when the command takes no named arguments.
    fn named_arguments_mut(&mut self) -> Option<&mut NamedArguments> {
        None
    }

    async fn run(&self, platform: &dyn CiPlatform) -> Result<CommandOutcome>;
}

type CommandConstructor =
    Box<dyn Fn(&CommentEvent, Option<&str>) -> Box<dyn BotCommand> + Send + Sync>;

/// Maps command name tokens to constructors.
pub struct CommandRegistry {
    entries: Vec<(&'static str, CommandConstructor)>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with every command the bot ships with.
    pub fn with_default_commands(ci_config: CiCommandConfig) -> Self {
        Self::empty().register(CI_COMMAND_NAME, move |event, args| {
            Box::new(CiCommand::new(event, args, ci_config.clone())) as Box<dyn BotCommand>
        })
    }

    pub fn register<F>(mut self, name: &'static str, constructor: F) -> Self
    where
        F: Fn(&CommentEvent, Option<&str>) -> Box<dyn BotCommand> + Send + Sync + 'static,
    {
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, Box::new(constructor)));
        self
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn build(
        &self,
        name: &str,
        event: &CommentEvent,
        args: Option<&str>,
    ) -> Option<Box<dyn BotCommand>> {
        self.entries
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, constructor)| constructor(event, args))
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.command_names())
            .finish()
    }
}

/// Parse every line of the comment body into commands, folding named-argument
/// lines into the command that precedes them.
pub fn parse_comment_commands(
    event: &CommentEvent,
    registry: &CommandRegistry,
) -> std::result::Result<Vec<Box<dyn BotCommand>>, CommandParseError> {
    let mut commands: Vec<Box<dyn BotCommand>> = Vec::new();
    for line in split_comment_lines(&event.body) {
        tracing::debug!(line, "parsing comment line");
        match parse_comment_line(line) {
            ParsedCommentLine::Command { name, args } => match registry.build(name, event, args) {
                Some(command) => commands.push(command),
                None => tracing::info!(command = name, "unknown command"),
            },
            ParsedCommentLine::NamedArguments { name, args } => {
                let Some(previous) = commands.last_mut() else {
                    // Likely someone '+1'-ing rather than a misplaced argument.
                    tracing::info!(
                        name,
                        args = args.unwrap_or_default(),
                        "parsed named arguments with no previous command"
                    );
                    continue;
                };
                let kind = previous.kind();
                let Some(named_arguments) = previous.named_arguments_mut() else {
                    return Err(CommandParseError::NamedArgumentsUnsupported {
                        command: kind,
                        name: name.to_string(),
                        args: args.map(ToOwned::to_owned),
                    });
                };
                named_arguments.insert(name.to_string(), args.map(ToOwned::to_owned));
            }
            ParsedCommentLine::Ignored => {}
        }
    }
    Ok(commands)
}
