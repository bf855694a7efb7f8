//! Error types for GitHub operations
//!
//! A single error enum covers every failure the library surfaces. Callers in
//! batch loops match on it to decide whether an item is skipped or the run
//! aborts.

use thiserror::Error;

/// Errors that can occur while talking to the GitHub API
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Network or HTTP client failure (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status on a mandatory call
    #[error("GitHub API error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Mandatory resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit still in force after all retries
    #[error("GitHub API rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Invalid input, detected before any network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No comment with the given id exists in the repository
    #[error("Comment #{0} not found")]
    CommentNotFound(u64),

    /// The GitHub App has no installation covering the repository
    #[error("GitHub App {app_id} is not installed on {repository}")]
    AppNotInstalled { app_id: String, repository: String },

    /// JWT signing or private key parsing failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response payload could not be interpreted
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed
    #[error("Report error: {0}")]
    Report(#[from] csv::Error),
}

impl GitHubError {
    /// Whether the error is a 404 from the API
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_) | GitHubError::Http { status: 404, .. })
    }
}

impl From<jsonwebtoken::errors::Error> for GitHubError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        GitHubError::Auth(err.to_string())
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, GitHubError>;
