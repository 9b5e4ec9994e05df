use std::path::Path;

use anyhow::{Context, Result};
use prbot_commands::comment_event::IssueCommentEventPayload;

/// Load the `issue_comment` webhook payload GitHub Actions writes to `GITHUB_EVENT_PATH`.
pub(crate) fn load_event_payload(path: &Path) -> Result<IssueCommentEventPayload> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    IssueCommentEventPayload::from_json_str(&raw)
        .with_context(|| format!("failed to parse event payload {}", path.display()))
}
