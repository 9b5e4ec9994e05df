use crate::comment_event::RepoRef;

/// HTML URL for one execution of the bot's own workflow, linked from apology replies.
pub fn bot_run_url(server_url: &str, repo: &RepoRef, run_id: &str) -> String {
    format!(
        "{}/{}/{}/actions/runs/{}",
        server_url.trim_end_matches('/'),
        repo.owner,
        repo.name,
        run_id.trim()
    )
}

pub fn render_parse_failure_reply(author: &str, comment_url: &str, bot_run_url: &str) -> String {
    format!(
        "@{author} I didn't understand [that]({comment_url})! 🤔\n\nTake a look at my [logs]({bot_run_url})."
    )
}

pub fn render_duplicate_command_reply(author: &str) -> String {
    format!("@{author} you can't use the same command more than once! 🙅")
}

pub fn render_no_running_ci_reply(author: &str) -> String {
    format!("@{author} no running CI found for this PR.")
}

pub fn render_ci_cancelled_reply(author: &str, run_html_url: &str) -> String {
    format!("@{author} cancelled [CI run]({run_html_url}). 🛑")
}

pub fn render_not_mergeable_reply(author: &str) -> String {
    format!("@{author} this PR is not currently mergeable, you'll need to rebase it first.")
}

pub fn render_merge_status_pending_reply(author: &str) -> String {
    format!("@{author} GitHub is still computing merge status. Please try again in a moment.")
}

pub fn render_stale_request_reply(author: &str) -> String {
    format!(
        "@{author} this PR has been updated since your request, you'll need to review the changes."
    )
}
