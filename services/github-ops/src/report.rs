//! Actions audit report
//!
//! One row per repository, serialized to CSV with a fixed column order.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::actions::ActionsPermissions;
use crate::error::Result;
use crate::repo::Repository;
use crate::workflows::WorkflowFile;

/// A single report row; field order is the CSV column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub repository: String,
    pub visibility: String,
    pub archived: bool,
    pub disabled: bool,
    pub fork: bool,
    pub created_at: String,
    pub updated_at: String,
    pub default_branch: String,
    pub url: String,
    pub actions_enabled: bool,
    pub allowed_actions: String,
    pub actions_status: String,
    pub fork_status: String,
    pub default_workflow_permissions: String,
    pub can_approve_pull_request_reviews: String,
    pub workflow_count: u64,
    /// Verified workflow file names, `;`-separated
    pub workflow_files: String,
}

impl AuditRecord {
    /// Row for a repository whose Actions settings were resolved
    pub fn new(
        repo: &Repository,
        permissions: &ActionsPermissions,
        workflow_count: u64,
        files: &[WorkflowFile],
    ) -> Self {
        let mut record = Self::base(repo);
        record.actions_enabled = permissions.enabled;
        record.allowed_actions = permissions.allowed_actions.clone();
        record.actions_status = permissions.status.to_string();
        record.fork_status = permissions.fork_status.clone();
        record.default_workflow_permissions = permissions
            .default_workflow_permissions
            .clone()
            .unwrap_or_default();
        record.can_approve_pull_request_reviews = permissions
            .can_approve_pull_request_reviews
            .map(|v| v.to_string())
            .unwrap_or_default();
        record.workflow_count = workflow_count;
        record.workflow_files = files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(";");
        record
    }

    /// Row for a repository whose audit failed
    pub fn failed(repo: &Repository, error: &str) -> Self {
        let mut record = Self::base(repo);
        record.actions_status = format!("error: {error}");
        record
    }

    fn base(repo: &Repository) -> Self {
        let timestamp = |t: Option<DateTime<chrono::Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
        Self {
            repository: repo.name.clone(),
            visibility: repo.visibility().to_string(),
            archived: repo.archived,
            disabled: repo.disabled,
            fork: repo.fork,
            created_at: timestamp(repo.created_at),
            updated_at: timestamp(repo.updated_at),
            default_branch: repo.default_branch.clone(),
            url: repo.html_url.clone(),
            actions_enabled: false,
            allowed_actions: "none".to_string(),
            actions_status: String::new(),
            fork_status: String::new(),
            default_workflow_permissions: String::new(),
            can_approve_pull_request_reviews: String::new(),
            workflow_count: 0,
            workflow_files: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub with_workflows: usize,
    pub actions_enabled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub records: Vec<AuditRecord>,
}

impl AuditReport {
    pub fn push(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    /// Rows for repositories that have at least one workflow
    pub fn with_workflows(&self) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter().filter(|r| r.workflow_count > 0)
    }

    pub fn summary(&self) -> AuditSummary {
        AuditSummary {
            total: self.records.len(),
            with_workflows: self.with_workflows().count(),
            actions_enabled: self.records.iter().filter(|r| r.actions_enabled).count(),
            failed: self
                .records
                .iter()
                .filter(|r| r.actions_status.starts_with("error:"))
                .count(),
        }
    }

    /// Write the report as CSV with a header row
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        if self.records.is_empty() {
            // serde only emits headers alongside the first record
            writer.write_record(CSV_COLUMNS)?;
        }
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = self.records.len(), "Wrote audit report");
        Ok(())
    }
}

pub const CSV_COLUMNS: [&str; 17] = [
    "repository",
    "visibility",
    "archived",
    "disabled",
    "fork",
    "created_at",
    "updated_at",
    "default_branch",
    "url",
    "actions_enabled",
    "allowed_actions",
    "actions_status",
    "fork_status",
    "default_workflow_permissions",
    "can_approve_pull_request_reviews",
    "workflow_count",
    "workflow_files",
];

/// `github_actions_audit_{org}[_{repo}]_{YYYYmmdd_HHMMSS}.csv`
pub fn report_file_name(org: &str, repo: Option<&str>, timestamp: DateTime<Local>) -> String {
    let stamp = timestamp.format("%Y%m%d_%H%M%S");
    match repo {
        Some(repo) => format!("github_actions_audit_{org}_{repo}_{stamp}.csv"),
        None => format!("github_actions_audit_{org}_{stamp}.csv"),
    }
}
