//! Organization-wide GitHub Actions audit
//!
//! Enumerates repositories, then for each one resolves Actions permissions,
//! counts registered workflows and locates workflow files. A repository
//! that fails is recorded with its error and the audit moves on.

use tracing::{error, info};

use crate::actions::{resolve_with_fork_status, workflow_count};
use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::{RepoRef, Repository};
use crate::repos::{get_repository, list_org_repositories};
use crate::report::{AuditRecord, AuditReport};
use crate::workflows::find_workflow_files;

pub struct ActionsAuditor {
    client: GitHubClient,
    org: String,
}

impl ActionsAuditor {
    pub fn new(client: GitHubClient, org: impl Into<String>) -> Self {
        Self {
            client,
            org: org.into(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Audit every repository in the organization
    pub async fn audit_organization(&self) -> Result<AuditReport> {
        info!(org = %self.org, "Starting audit");
        let repositories = list_org_repositories(&self.client, &self.org).await?;
        Ok(self.audit_all(&repositories).await)
    }

    /// Audit a single repository of the organization, given by bare name
    pub async fn audit_repository(&self, name: &str) -> Result<AuditReport> {
        if name.trim().is_empty() || name.contains('/') {
            return Err(GitHubError::Validation(format!(
                "repository must be a bare name within {}, got '{name}'",
                self.org
            )));
        }
        let repo_ref = RepoRef::new(self.org.as_str(), name);
        let repository = get_repository(&self.client, &repo_ref).await?;
        Ok(self.audit_all(std::slice::from_ref(&repository)).await)
    }

    async fn audit_all(&self, repositories: &[Repository]) -> AuditReport {
        let mut report = AuditReport::default();
        for repository in repositories {
            let record = match self.audit_one(repository).await {
                Ok(record) => record,
                Err(e) => {
                    error!(repo = %repository.name, error = %e, "Failed to audit repository");
                    AuditRecord::failed(repository, &e.to_string())
                }
            };
            report.push(record);
        }
        report
    }

    async fn audit_one(&self, repository: &Repository) -> Result<AuditRecord> {
        let repo_ref = RepoRef::new(self.org.as_str(), repository.name.as_str());

        let permissions = resolve_with_fork_status(&self.client, &repo_ref, repository.fork).await?;
        let count = workflow_count(&self.client, &repo_ref).await?;
        let files = find_workflow_files(&self.client, &repo_ref, &repository.default_branch).await?;

        info!(
            repo = %repo_ref,
            enabled = permissions.enabled,
            workflows = count,
            workflow_files = files.len(),
            "Audited repository"
        );
        Ok(AuditRecord::new(repository, &permissions, count, &files))
    }
}
