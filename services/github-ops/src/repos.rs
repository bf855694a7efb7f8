//! Repository enumeration

use tracing::info;

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::{RepoRef, Repository};

/// List every repository in an organization
pub async fn list_org_repositories(client: &GitHubClient, org: &str) -> Result<Vec<Repository>> {
    if org.trim().is_empty() {
        return Err(GitHubError::Validation(
            "organization must not be empty".to_string(),
        ));
    }

    let repos: Vec<Repository> = client.paginate(&format!("/orgs/{org}/repos"), &[]).await?;
    info!(org = %org, count = repos.len(), "Listed organization repositories");
    Ok(repos)
}

/// Fetch a single repository
pub async fn get_repository(client: &GitHubClient, repo: &RepoRef) -> Result<Repository> {
    client
        .get_json(&repo.api_path())
        .await
        .map_err(|err| {
            if err.is_not_found() {
                GitHubError::NotFound(format!("repository {repo}"))
            } else {
                err
            }
        })
}
