//! GitHub Operations Library
//!
//! Rust utilities for routine repository maintenance and GitHub Actions
//! auditing on top of the GitHub REST API.
//!
//! ## Binaries
//!
//! - `github-cli`: PR comments, issue creation, stale issue/PR processing and
//!   GitHub App installation tokens
//! - `actions-audit` (separate crate): per-repository Actions report for an
//!   organization
//!
//! ## Example Pipeline
//!
//! ```bash
//! # Mint an installation token for the App on this repository
//! TOKEN=$(github-cli get-github-access-token \
//!   --app-id $GITHUB_APP_ID \
//!   --private-key-path /path/to/key.pem \
//!   --repo acme/widgets)
//!
//! # Close out stale pull requests with it
//! github-cli process-stale-prs \
//!   --github-token $TOKEN \
//!   --repo acme/widgets
//! ```

pub mod actions;
pub mod audit;
pub mod auth;
pub mod client;
pub mod comments;
pub mod config;
pub mod error;
pub mod issues;
pub mod pr;
pub mod rate_limit;
pub mod repo;
pub mod repos;
pub mod report;
pub mod stale;
pub mod workflows;

pub use audit::ActionsAuditor;
pub use client::GitHubClient;
pub use config::{ClientConfig, RetryPolicy};
pub use error::{GitHubError, Result};
pub use repo::RepoRef;
