mod bootstrap_helpers;
mod cli_args;
mod event_source;

use anyhow::Result;
use clap::Parser;
use prbot_runtime::run_comment_command_bot;

use crate::bootstrap_helpers::{init_tracing, render_actions_error_annotation};
use crate::cli_args::Cli;
use crate::event_source::load_event_payload;

async fn run_cli(cli: Cli) -> Result<()> {
    let payload = load_event_payload(&cli.event_path)?;
    let correlation_id = cli
        .correlation_id
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::debug!(correlation_id = %correlation_id, "starting comment command bot");

    let report = run_comment_command_bot(cli.bot_config(correlation_id), payload).await?;
    tracing::info!(
        outcome = report.outcome.as_str(),
        commands_parsed = report.commands_parsed,
        commands_executed = report.commands_executed,
        replies_posted = report.replies_posted,
        "comment command bot finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    if let Err(error) = run_cli(cli).await {
        let message = format!("{error:#}");
        tracing::error!(error = %message, "comment command bot failed");
        println!("{}", render_actions_error_annotation(&message));
        std::process::exit(1);
    }
}
