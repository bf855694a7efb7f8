//! Pull request comment utilities
//!
//! Comments are located by scanning the full comment listing. Edits and
//! deletes address comments repository-wide, so a lookup scans every issue
//! comment in the repository, not only the target pull request's.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::pr::{get_pull_request, require_pr_number};
use crate::repo::{Account, RepoRef};

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: Option<Account>,
}

impl Comment {
    /// `User` or `Bot`; empty when the author is unknown
    pub fn author_type(&self) -> &str {
        self.user.as_ref().map(|u| u.account_type.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentAction {
    Created,
    Updated,
    Deleted,
}

/// Result of a comment write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentOutcome {
    pub repository: String,
    pub pr_number: u64,
    pub comment_id: u64,
    pub action: CommentAction,
}

impl fmt::Display for CommentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            CommentAction::Created => write!(
                f,
                "Comment posted successfully to PR #{} in {}.",
                self.pr_number, self.repository
            ),
            CommentAction::Updated => write!(
                f,
                "Comment #{} updated successfully on PR #{} in {}.",
                self.comment_id, self.pr_number, self.repository
            ),
            CommentAction::Deleted => write!(
                f,
                "Comment #{} deleted successfully on PR #{} in {}.",
                self.comment_id, self.pr_number, self.repository
            ),
        }
    }
}

fn comment_path(repo: &RepoRef, comment_id: u64) -> String {
    format!("{}/issues/comments/{}", repo.api_path(), comment_id)
}

/// Ids of comments on a pull request by `author_type` whose body contains `substring`
///
/// `author_type` is compared verbatim; a value other than `User` or `Bot`
/// matches nothing.
pub async fn get_comment_ids(
    client: &GitHubClient,
    repo: &RepoRef,
    pr_number: u64,
    substring: &str,
    author_type: &str,
) -> Result<Vec<u64>> {
    get_pull_request(client, repo, pr_number).await?;
    let comments = list_comments(client, repo, pr_number).await?;
    Ok(matching_comment_ids(&comments, substring, author_type))
}

pub fn matching_comment_ids(comments: &[Comment], substring: &str, author_type: &str) -> Vec<u64> {
    comments
        .iter()
        .filter(|c| c.author_type() == author_type && c.body.contains(substring))
        .map(|c| c.id)
        .collect()
}

/// All comments on an issue or pull request thread
pub async fn list_comments(client: &GitHubClient, repo: &RepoRef, number: u64) -> Result<Vec<Comment>> {
    client
        .paginate(&format!("{}/issues/{}/comments", repo.api_path(), number), &[])
        .await
}

pub async fn create_comment(client: &GitHubClient, repo: &RepoRef, number: u64, body: &str) -> Result<Comment> {
    client
        .post_json(
            &format!("{}/issues/{}/comments", repo.api_path(), number),
            &json!({ "body": body }),
        )
        .await
}

/// Scan every issue comment in the repository for `comment_id`
async fn find_repository_comment(client: &GitHubClient, repo: &RepoRef, comment_id: u64) -> Result<Comment> {
    let comments: Vec<Comment> = client
        .paginate(&format!("{}/issues/comments", repo.api_path()), &[])
        .await?;
    debug!(repo = %repo, scanned = comments.len(), comment_id, "Scanned repository comments");
    comments
        .into_iter()
        .find(|c| c.id == comment_id)
        .ok_or(GitHubError::CommentNotFound(comment_id))
}

/// Post a new comment, or edit `comment_id` when given
///
/// An unknown `comment_id` is an error; it never falls back to creating a
/// new comment.
pub async fn post_or_update_comment(
    client: &GitHubClient,
    repo: &RepoRef,
    pr_number: u64,
    body: &str,
    comment_id: Option<u64>,
) -> Result<CommentOutcome> {
    require_pr_number(pr_number)?;
    if body.trim().is_empty() {
        return Err(GitHubError::Validation("comment body must not be empty".to_string()));
    }
    get_pull_request(client, repo, pr_number).await?;

    let (comment_id, action) = match comment_id {
        Some(id) => {
            let existing = find_repository_comment(client, repo, id).await?;
            let _: Comment = client
                .patch_json(&comment_path(repo, existing.id), &json!({ "body": body }))
                .await?;
            (existing.id, CommentAction::Updated)
        }
        None => {
            let created = create_comment(client, repo, pr_number, body).await?;
            (created.id, CommentAction::Created)
        }
    };

    let outcome = CommentOutcome {
        repository: repo.to_string(),
        pr_number,
        comment_id,
        action,
    };
    info!(repo = %repo, pr = pr_number, comment_id, action = ?action, "Comment written");
    Ok(outcome)
}

pub async fn delete_comment(
    client: &GitHubClient,
    repo: &RepoRef,
    pr_number: u64,
    comment_id: u64,
) -> Result<CommentOutcome> {
    require_pr_number(pr_number)?;
    if comment_id == 0 {
        return Err(GitHubError::Validation("comment id must be positive".to_string()));
    }
    get_pull_request(client, repo, pr_number).await?;

    let existing = find_repository_comment(client, repo, comment_id).await?;
    client.delete(&comment_path(repo, existing.id)).await?;
    info!(repo = %repo, pr = pr_number, comment_id, "Comment deleted");

    Ok(CommentOutcome {
        repository: repo.to_string(),
        pr_number,
        comment_id,
        action: CommentAction::Deleted,
    })
}
