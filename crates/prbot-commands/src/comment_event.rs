use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Webhook action that carries a freshly posted comment.
pub const COMMENT_CREATED_ACTION: &str = "created";

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `GithubUser` used across bot components.
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubRepository {
    pub name: String,
    pub owner: GithubUser,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCommentPayload {
    pub user: GithubUser,
    pub author_association: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssuePayload {
    pub number: u64,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
/// Subset of the `issue_comment` webhook payload the bot reads.
pub struct IssueCommentEventPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub comment: Option<GithubCommentPayload>,
    #[serde(default)]
    pub issue: Option<GithubIssuePayload>,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable snapshot of one triggering PR comment.
pub struct CommentEvent {
    pub repo: RepoRef,
    pub issue_number: u64,
    pub author_login: String,
    pub author_association: String,
    pub body: String,
    pub comment_url: String,
    pub created_at: DateTime<Utc>,
    /// Opaque token threaded through to the dispatched workflow run name.
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `CommentEventSelection` values.
pub enum CommentEventSelection {
    Selected(CommentEvent),
    Skipped { reason: &'static str },
}

impl IssueCommentEventPayload {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Select the comment event this payload describes, or report why it is skipped.
    pub fn select_comment_event(self, correlation_id: &str) -> CommentEventSelection {
        let Some(comment) = self.comment else {
            return CommentEventSelection::Skipped {
                reason: "missing_comment",
            };
        };
        if let Some(action) = self.action.as_deref() {
            if action != COMMENT_CREATED_ACTION {
                return CommentEventSelection::Skipped {
                    reason: "unsupported_action",
                };
            }
        }
        let Some(issue) = self.issue else {
            return CommentEventSelection::Skipped {
                reason: "missing_issue",
            };
        };
        if issue.pull_request.is_none() {
            return CommentEventSelection::Skipped {
                reason: "not_pull_request",
            };
        }
        let Some(repository) = self.repository else {
            return CommentEventSelection::Skipped {
                reason: "missing_repository",
            };
        };

        CommentEventSelection::Selected(CommentEvent {
            repo: RepoRef::new(repository.owner.login, repository.name),
            issue_number: issue.number,
            author_login: comment.user.login,
            author_association: comment.author_association,
            body: comment.body.unwrap_or_default(),
            comment_url: comment.html_url,
            created_at: comment.created_at,
            correlation_id: correlation_id.to_string(),
        })
    }
}
