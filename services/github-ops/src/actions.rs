//! GitHub Actions permission resolution
//!
//! Forks need two switches turned on before workflows run: the repository
//! level Actions permission and the fork pull request workflow setting.
//! Optional settings endpoints that refuse access (403/404) degrade to
//! "disabled" instead of failing the repository, and so does a settings
//! body that cannot be decoded.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::RepoRef;
use crate::repos::get_repository;

pub const NOT_A_FORK: &str = "not a fork";
pub const FORK_WORKFLOWS_DISABLED: &str = "workflows disabled (fork)";
pub const FORK_WORKFLOWS_ENABLED: &str = "workflows enabled (fork)";
pub const FORK_PR_WORKFLOWS_DISABLED: &str = "fork pull request workflows disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionsStatus {
    Enabled,
    Disabled,
}

impl fmt::Display for ActionsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionsStatus::Enabled => write!(f, "enabled"),
            ActionsStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Resolved Actions configuration for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionsPermissions {
    pub is_fork: bool,
    pub fork_status: String,
    pub enabled: bool,
    /// `all`, `local_only`, `selected`, or `none` when unknown
    pub allowed_actions: String,
    pub status: ActionsStatus,
    /// `read` or `write`, only fetched when Actions are enabled
    pub default_workflow_permissions: Option<String>,
    pub can_approve_pull_request_reviews: Option<bool>,
}

impl ActionsPermissions {
    fn new(is_fork: bool, fork_status: &str, enabled: bool, allowed_actions: Option<String>) -> Self {
        Self {
            is_fork,
            fork_status: fork_status.to_string(),
            enabled,
            allowed_actions: allowed_actions.unwrap_or_else(|| "none".to_string()),
            status: if enabled {
                ActionsStatus::Enabled
            } else {
                ActionsStatus::Disabled
            },
            default_workflow_permissions: None,
            can_approve_pull_request_reviews: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PermissionsResponse {
    enabled: Option<bool>,
    allowed_actions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForkPullRequestResponse {
    enabled: Option<bool>,
    run_workflows_from_fork_pull_requests: Option<bool>,
}

impl ForkPullRequestResponse {
    fn is_enabled(&self) -> bool {
        self.run_workflows_from_fork_pull_requests
            .or(self.enabled)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowPermissionsResponse {
    default_workflow_permissions: Option<String>,
    can_approve_pull_request_reviews: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WorkflowsResponse {
    total_count: u64,
}

/// Fetch repository metadata, then resolve its Actions permissions
pub async fn resolve_actions_permissions(
    client: &GitHubClient,
    repo: &RepoRef,
) -> Result<ActionsPermissions> {
    let repository = get_repository(client, repo).await?;
    resolve_with_fork_status(client, repo, repository.fork).await
}

/// Resolve Actions permissions when fork status is already known
pub async fn resolve_with_fork_status(
    client: &GitHubClient,
    repo: &RepoRef,
    is_fork: bool,
) -> Result<ActionsPermissions> {
    let base_path = format!("{}/actions/permissions", repo.api_path());
    let base: Option<PermissionsResponse> = client.probe_json(&base_path).await?;

    let mut result = if is_fork {
        match base {
            None => {
                debug!(repo = %repo, "Actions permissions unavailable for fork");
                ActionsPermissions::new(true, FORK_WORKFLOWS_DISABLED, false, None)
            }
            Some(base) => {
                let base_enabled = base.enabled.unwrap_or(false);
                let fork_path = format!(
                    "{}/actions/permissions/fork-pr-workflows-private-repos",
                    repo.api_path()
                );
                let fork: Option<ForkPullRequestResponse> = optional_setting(client, &fork_path).await?;
                let fork_enabled = fork.is_some_and(|f| f.is_enabled());

                let enabled = base_enabled && fork_enabled;
                let fork_status = if enabled {
                    FORK_WORKFLOWS_ENABLED
                } else if base_enabled {
                    FORK_PR_WORKFLOWS_DISABLED
                } else {
                    FORK_WORKFLOWS_DISABLED
                };
                ActionsPermissions::new(true, fork_status, enabled, base.allowed_actions)
            }
        }
    } else {
        let (enabled, allowed) = match base {
            Some(base) => (base.enabled.unwrap_or(false), base.allowed_actions),
            None => (false, None),
        };
        ActionsPermissions::new(false, NOT_A_FORK, enabled, allowed)
    };

    if result.enabled {
        let workflow_path = format!("{}/actions/permissions/workflow", repo.api_path());
        if let Some(defaults) =
            optional_setting::<WorkflowPermissionsResponse>(client, &workflow_path).await?
        {
            result.default_workflow_permissions = defaults.default_workflow_permissions;
            result.can_approve_pull_request_reviews = defaults.can_approve_pull_request_reviews;
        }
    }

    info!(
        repo = %repo,
        fork = result.is_fork,
        enabled = result.enabled,
        allowed_actions = %result.allowed_actions,
        "Resolved Actions permissions"
    );
    Ok(result)
}

/// Probe a secondary settings endpoint; an undecodable body counts as absent
///
/// Transport failures and exhausted rate limits still propagate.
async fn optional_setting<T: DeserializeOwned>(client: &GitHubClient, path: &str) -> Result<Option<T>> {
    match client.probe_json(path).await {
        Err(GitHubError::Decode(reason)) => {
            warn!(path = %path, reason = %reason, "Ignoring malformed settings response");
            Ok(None)
        }
        other => other,
    }
}

/// Number of workflows GitHub has registered; 0 when the endpoint is absent
pub async fn workflow_count(client: &GitHubClient, repo: &RepoRef) -> Result<u64> {
    let path = format!("{}/actions/workflows", repo.api_path());
    let response: Option<WorkflowsResponse> = client.get_json_optional(&path, &[]).await?;
    Ok(response.map(|r| r.total_count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPO_PATH: &str = "/repos/acme/widgets";

    fn client(server: &MockServer) -> GitHubClient {
        let config = ClientConfig::default()
            .with_api_url(server.uri())
            .with_retry(RetryPolicy::immediate(0));
        GitHubClient::new("t", &config).unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    async fn mount_json(server: &MockServer, route: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_repo(server: &MockServer, fork: bool) {
        mount_json(server, REPO_PATH, 200, json!({"name": "widgets", "fork": fork})).await;
    }

    async fn mount_workflow_defaults(server: &MockServer) {
        mount_json(
            server,
            "/repos/acme/widgets/actions/permissions/workflow",
            200,
            json!({"default_workflow_permissions": "read", "can_approve_pull_request_reviews": false}),
        )
        .await;
    }

    #[tokio::test]
    async fn test_non_fork_enabled_merges_workflow_defaults() {
        let server = MockServer::start().await;
        mount_repo(&server, false).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true, "allowed_actions": "selected"}),
        )
        .await;
        mount_workflow_defaults(&server).await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.is_fork);
        assert!(result.enabled);
        assert_eq!(result.status, ActionsStatus::Enabled);
        assert_eq!(result.allowed_actions, "selected");
        assert_eq!(result.fork_status, NOT_A_FORK);
        assert_eq!(result.default_workflow_permissions.as_deref(), Some("read"));
        assert_eq!(result.can_approve_pull_request_reviews, Some(false));
    }

    #[tokio::test]
    async fn test_non_fork_missing_fields_default_to_disabled_none() {
        let server = MockServer::start().await;
        mount_repo(&server, false).await;
        mount_json(&server, "/repos/acme/widgets/actions/permissions", 200, json!({})).await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
        assert_eq!(result.allowed_actions, "none");
        assert_eq!(result.status, ActionsStatus::Disabled);
        assert!(result.default_workflow_permissions.is_none());
    }

    #[tokio::test]
    async fn test_non_fork_forbidden_permissions_degrade_to_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, false).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            403,
            json!({"message": "Must have admin rights to Repository."}),
        )
        .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
        assert_eq!(result.allowed_actions, "none");
    }

    #[tokio::test]
    async fn test_fork_unavailable_permissions_marks_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(&server, "/repos/acme/widgets/actions/permissions", 404, json!({})).await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(result.is_fork);
        assert!(!result.enabled);
        assert_eq!(result.status, ActionsStatus::Disabled);
        assert_eq!(result.fork_status, FORK_WORKFLOWS_DISABLED);
    }

    #[tokio::test]
    async fn test_fork_enabled_only_when_both_switches_on() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true, "allowed_actions": "all"}),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos",
            200,
            json!({"run_workflows_from_fork_pull_requests": true}),
        )
        .await;
        mount_workflow_defaults(&server).await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(result.enabled);
        assert_eq!(result.fork_status, FORK_WORKFLOWS_ENABLED);
        assert_eq!(result.allowed_actions, "all");
        assert_eq!(result.default_workflow_permissions.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn test_fork_with_fork_pr_setting_off_is_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true, "allowed_actions": "all"}),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos",
            200,
            json!({"enabled": false}),
        )
        .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
        assert_eq!(result.fork_status, FORK_PR_WORKFLOWS_DISABLED);
    }

    #[tokio::test]
    async fn test_fork_with_fork_pr_endpoint_missing_is_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true}),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos",
            404,
            json!({"message": "Not Found"}),
        )
        .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
    }

    #[tokio::test]
    async fn test_fork_with_base_disabled_is_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": false}),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos",
            200,
            json!({"enabled": true}),
        )
        .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
        assert_eq!(result.fork_status, FORK_WORKFLOWS_DISABLED);
    }

    #[tokio::test]
    async fn test_fork_setting_with_both_field_names() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true, "allowed_actions": "all"}),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos",
            200,
            json!({"enabled": false, "run_workflows_from_fork_pull_requests": true}),
        )
        .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(result.enabled);
        assert_eq!(result.fork_status, FORK_WORKFLOWS_ENABLED);
    }

    #[tokio::test]
    async fn test_malformed_workflow_defaults_are_ignored() {
        let server = MockServer::start().await;
        mount_repo(&server, false).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/permissions/workflow"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(result.enabled);
        assert_eq!(result.status, ActionsStatus::Enabled);
        assert!(result.default_workflow_permissions.is_none());
        assert!(result.can_approve_pull_request_reviews.is_none());
    }

    #[tokio::test]
    async fn test_malformed_fork_setting_counts_as_disabled() {
        let server = MockServer::start().await;
        mount_repo(&server, true).await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/permissions",
            200,
            json!({"enabled": true}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/permissions/fork-pr-workflows-private-repos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = resolve_actions_permissions(&client(&server), &repo()).await.unwrap();
        assert!(!result.enabled);
        assert_eq!(result.fork_status, FORK_PR_WORKFLOWS_DISABLED);
    }

    #[tokio::test]
    async fn test_missing_repository_is_hard_failure() {
        let server = MockServer::start().await;
        mount_json(&server, REPO_PATH, 404, json!({"message": "Not Found"})).await;

        let err = resolve_actions_permissions(&client(&server), &repo())
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_workflow_count() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/acme/widgets/actions/workflows",
            200,
            json!({"total_count": 3, "workflows": []}),
        )
        .await;
        assert_eq!(workflow_count(&client(&server), &repo()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_workflow_count_missing_is_zero() {
        let server = MockServer::start().await;
        mount_json(&server, "/repos/acme/widgets/actions/workflows", 404, json!({})).await;
        assert_eq!(workflow_count(&client(&server), &repo()).await.unwrap(), 0);
    }
}
