//! Workflow file discovery
//!
//! Lists `.github/workflows` on the default branch and keeps YAML files
//! whose content looks like a workflow. The content check is a substring
//! heuristic, not a YAML parse.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::repo::RepoRef;

pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// A verified workflow file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowFile {
    pub name: String,
    pub path: String,
    pub html_url: Option<String>,
    pub content: String,
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type", default)]
    entry_type: String,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

pub fn is_workflow_file_name(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

pub fn looks_like_workflow(content: &str) -> bool {
    content.contains("on:") || content.contains("jobs:")
}

/// Decode a contents-API payload; GitHub wraps base64 at 60 columns
pub fn decode_content(encoded: &str, encoding: &str) -> Result<String> {
    if !encoding.is_empty() && encoding != "base64" {
        return Err(GitHubError::Decode(format!("unsupported encoding: {encoding}")));
    }
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GitHubError::Decode(e.to_string()))
}

/// Find verified workflow files on `branch`
///
/// A missing workflows directory yields an empty list. A file that cannot
/// be fetched or decoded is logged and skipped.
pub async fn find_workflow_files(
    client: &GitHubClient,
    repo: &RepoRef,
    branch: &str,
) -> Result<Vec<WorkflowFile>> {
    let dir_path = format!("{}/contents/{}", repo.api_path(), WORKFLOWS_DIR);
    let entries: Vec<ContentEntry> = match client
        .get_json_optional(&dir_path, &[("ref", branch)])
        .await?
    {
        Some(entries) => entries,
        None => {
            debug!(repo = %repo, branch = %branch, "No workflows directory");
            return Ok(Vec::new());
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        if entry.entry_type != "file" || !is_workflow_file_name(&entry.name) {
            continue;
        }

        match fetch_file(client, repo, branch, &entry.path).await {
            Ok(content) if looks_like_workflow(&content) => files.push(WorkflowFile {
                name: entry.name,
                path: entry.path,
                html_url: entry.html_url,
                content,
                verified: true,
            }),
            Ok(_) => debug!(repo = %repo, file = %entry.path, "Not a workflow, skipping"),
            Err(e) => warn!(repo = %repo, file = %entry.path, error = %e, "Failed to read workflow file"),
        }
    }

    Ok(files)
}

async fn fetch_file(client: &GitHubClient, repo: &RepoRef, branch: &str, path: &str) -> Result<String> {
    let file_path = format!("{}/contents/{}", repo.api_path(), path);
    let file: FileContent = client
        .get_json_optional(&file_path, &[("ref", branch)])
        .await?
        .ok_or_else(|| GitHubError::NotFound(path.to_string()))?;
    decode_content(&file.content, &file.encoding)
}
