//! Issue operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::{Label, RepoRef};

/// Issue as returned by the issues endpoints
///
/// The listing endpoint also returns pull requests; those carry a
/// `pull_request` object.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub pull_request: Option<Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Input for [`create_issue`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn assignees(mut self, assignees: Vec<String>) -> Self {
        self.assignees = assignees;
        self
    }
}

/// Create an issue; title and body must be non-empty
pub async fn create_issue(client: &GitHubClient, repo: &RepoRef, issue: &NewIssue) -> Result<Issue> {
    if issue.title.trim().is_empty() {
        return Err(GitHubError::Validation("issue title must not be empty".to_string()));
    }
    if issue.body.trim().is_empty() {
        return Err(GitHubError::Validation("issue body must not be empty".to_string()));
    }

    let created: Issue = client
        .post_json(&format!("{}/issues", repo.api_path()), issue)
        .await?;
    info!(repo = %repo, number = created.number, "Created issue");
    Ok(created)
}

/// Open issues, pull requests included
pub async fn list_open_issues(client: &GitHubClient, repo: &RepoRef) -> Result<Vec<Issue>> {
    client
        .paginate(&format!("{}/issues", repo.api_path()), &[("state", "open")])
        .await
}

/// Add labels to an issue or pull request
pub async fn add_labels(client: &GitHubClient, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
    let _: Vec<Label> = client
        .post_json(
            &format!("{}/issues/{}/labels", repo.api_path(), number),
            &json!({ "labels": labels }),
        )
        .await?;
    Ok(())
}

pub async fn close_issue(client: &GitHubClient, repo: &RepoRef, number: u64) -> Result<()> {
    let _: Value = client
        .patch_json(
            &format!("{}/issues/{}", repo.api_path(), number),
            &json!({ "state": "closed" }),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, RetryPolicy};
    use crate::repo::split_list;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        let config = ClientConfig::default()
            .with_api_url(server.uri())
            .with_retry(RetryPolicy::immediate(0));
        GitHubClient::new("t", &config).unwrap()
    }

    #[test]
    fn test_new_issue_omits_empty_lists() {
        let issue = NewIssue::new("Title", "Body");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value, json!({"title": "Title", "body": "Body"}));
    }

    #[tokio::test]
    async fn test_create_issue_with_labels_and_assignees() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues"))
            .and(body_json(json!({
                "title": "Nightly failed",
                "body": "See logs",
                "labels": ["bug", "ci"],
                "assignees": ["octocat"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 42,
                "title": "Nightly failed",
                "state": "open",
                "html_url": "https://github.com/acme/widgets/issues/42",
                "updated_at": "2024-05-01T00:00:00Z",
                "labels": [{"name": "bug"}, {"name": "ci"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let new_issue = NewIssue::new("Nightly failed", "See logs")
            .labels(split_list("bug, ci"))
            .assignees(split_list("octocat"));
        let issue = create_issue(&client(&server), &RepoRef::new("acme", "widgets"), &new_issue)
            .await
            .unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.html_url, "https://github.com/acme/widgets/issues/42");
    }

    #[tokio::test]
    async fn test_create_issue_rejects_empty_body() {
        let server = MockServer::start().await;
        let err = create_issue(
            &client(&server),
            &RepoRef::new("acme", "widgets"),
            &NewIssue::new("Title", "   "),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitHubError::Validation(_)));
    }

    #[test]
    fn test_issue_detects_pull_request() {
        let issue: Issue = serde_json::from_value(json!({
            "number": 3,
            "updated_at": "2024-01-01T00:00:00Z",
            "pull_request": {"url": "https://api.github.com/repos/acme/widgets/pulls/3"}
        }))
        .unwrap();
        assert!(issue.is_pull_request());
    }
}
