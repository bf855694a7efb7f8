//! Pull Request Operations
//!
//! Types and utilities for reading and closing GitHub pull requests.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::{Label, RepoRef};

/// Pull request as returned by the pulls endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub base: Option<GitRef>,
}

/// Branch pointer on either side of a pull request
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref", default)]
    pub branch: String,
    pub sha: String,
}

fn pull_path(repo: &RepoRef, number: u64) -> String {
    format!("{}/pulls/{}", repo.api_path(), number)
}

pub(crate) fn require_pr_number(number: u64) -> Result<()> {
    if number == 0 {
        return Err(GitHubError::Validation(
            "pull request number must be positive".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_pull_request(client: &GitHubClient, repo: &RepoRef, number: u64) -> Result<PullRequest> {
    require_pr_number(number)?;
    client
        .get_json(&pull_path(repo, number))
        .await
        .map_err(|err| {
            if err.is_not_found() {
                GitHubError::NotFound(format!("pull request #{number} in {repo}"))
            } else {
                err
            }
        })
}

pub async fn list_open_pull_requests(client: &GitHubClient, repo: &RepoRef) -> Result<Vec<PullRequest>> {
    client
        .paginate(&format!("{}/pulls", repo.api_path()), &[("state", "open")])
        .await
}

pub async fn close_pull_request(client: &GitHubClient, repo: &RepoRef, number: u64) -> Result<()> {
    let _: Value = client
        .patch_json(&pull_path(repo, number), &json!({ "state": "closed" }))
        .await?;
    info!(repo = %repo, number, "Closed pull request");
    Ok(())
}

/// Commit SHA of the pull request's base branch
pub async fn pr_base_sha(client: &GitHubClient, repo: &RepoRef, number: u64) -> Result<String> {
    let pr = get_pull_request(client, repo, number).await?;
    pr.base
        .map(|base| base.sha)
        .ok_or_else(|| GitHubError::Decode(format!("pull request #{number} has no base")))
}
