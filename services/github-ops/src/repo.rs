//! Repository references and shared API shapes

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GitHubError;

/// `owner/repo` pair identifying a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
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

    /// API path prefix, e.g. `/repos/acme/widgets`
    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = GitHubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                Ok(RepoRef::new(*owner, *name))
            }
            _ => Err(GitHubError::Validation(format!(
                "Invalid repository format: {s}. Expected: owner/repo"
            ))),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata as returned by the repos endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub fork: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub html_url: String,
    pub owner: Option<Account>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Repository {
    pub fn visibility(&self) -> &'static str {
        if self.private {
            "private"
        } else {
            "public"
        }
    }
}

/// User or bot account attached to comments, issues and repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
    /// `User`, `Bot` or `Organization`
    #[serde(rename = "type", default)]
    pub account_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Names of a label list, in API order
pub fn label_names(labels: &[Label]) -> Vec<String> {
    labels.iter().map(|l| l.name.clone()).collect()
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_repo_ref() {
        let repo: RepoRef = "acme/widgets".parse().unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");
        assert_eq!(repo.api_path(), "/repos/acme/widgets");
    }

    #[test]
    fn test_parse_repo_ref_rejects_malformed() {
        for bad in ["", "acme", "acme/", "/widgets", "a/b/c"] {
            let err = bad.parse::<RepoRef>().unwrap_err();
            assert!(matches!(err, GitHubError::Validation(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" bug, help wanted ,,triage"),
            vec!["bug", "help wanted", "triage"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_repository_deserialize_defaults() {
        let repo: Repository = serde_json::from_value(json!({
            "name": "widgets",
            "private": true,
            "fork": true,
            "created_at": "2023-01-02T03:04:05Z",
            "updated_at": null,
            "default_branch": "develop",
            "html_url": "https://github.com/acme/widgets"
        }))
        .unwrap();

        assert_eq!(repo.visibility(), "private");
        assert!(repo.fork);
        assert!(!repo.archived);
        assert_eq!(repo.default_branch, "develop");
        assert!(repo.updated_at.is_none());
    }
}
