//! GitHub Repository Maintenance CLI
//!
//! Posts and deletes PR comments, creates issues, closes stale issues and
//! pull requests, and mints GitHub App installation tokens.
//!
//! ## Usage
//! ```bash
//! # Post a comment, or update an existing one
//! github-cli post-pr-comment --repo acme/widgets --pr-number 12 \
//!   --comment-body "Plan attached" [--comment-id 123456]
//!
//! # Mark and close stale PRs
//! GITHUB_TOKEN=<TOKEN> github-cli process-stale-prs --repo acme/widgets
//!
//! # Installation token for a GitHub App
//! github-cli get-github-access-token --app-id 123456 \
//!   --private-key-path ./key.pem --repo acme/widgets
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use github_ops::auth::{mint_installation_token, AppCredentials, PrivateKeySource};
use github_ops::comments::{delete_comment, get_comment_ids, post_or_update_comment};
use github_ops::issues::{create_issue, NewIssue};
use github_ops::pr::pr_base_sha;
use github_ops::repo::split_list;
use github_ops::stale::{
    process_stale_issues, process_stale_prs, StalePolicy, StaleRunSummary, DEFAULT_EXEMPT_LABEL,
    DEFAULT_STALE_LABEL, DEFAULT_STALE_PR_MESSAGE,
};
use github_ops::{ClientConfig, GitHubClient, RepoRef};

/// CLI tool for GitHub operations
#[derive(Parser, Debug)]
#[command(name = "github-cli")]
#[command(about = "CLI tool for GitHub operations.")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Token and repository shared by every repository command
#[derive(Args, Debug)]
struct Target {
    /// GitHub token (installation token or PAT)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// GitHub repository in the format 'owner/repo'
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repo: String,
}

impl Target {
    fn connect(&self) -> Result<(GitHubClient, RepoRef)> {
        let repo: RepoRef = self.repo.parse()?;
        let client = GitHubClient::new(self.github_token.as_str(), &ClientConfig::from_env()?)?;
        Ok((client, repo))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an issue from a file, with optional labels and assignees
    CreateIssueFromFile {
        #[command(flatten)]
        target: Target,

        /// Path to the file containing issue content
        #[arg(long)]
        file_path: PathBuf,

        /// Title of the issue to create
        #[arg(long)]
        issue_title: String,

        /// Comma-separated list of labels for the issue
        #[arg(long)]
        issue_labels: Option<String>,

        /// Comma-separated list of GitHub usernames to assign
        #[arg(long)]
        assignees: Option<String>,
    },

    /// Create an issue from a string, with optional labels and assignees
    CreateIssueFromString {
        #[command(flatten)]
        target: Target,

        /// Content of the issue
        #[arg(long)]
        issue_body: String,

        /// Title of the issue to create
        #[arg(long)]
        issue_title: String,

        /// Comma-separated list of labels for the issue
        #[arg(long)]
        issue_labels: Option<String>,

        /// Comma-separated list of GitHub usernames to assign
        #[arg(long)]
        assignees: Option<String>,
    },

    /// Post or update a comment on a pull request
    PostPrComment {
        #[command(flatten)]
        target: Target,

        /// Pull request number
        #[arg(long)]
        pr_number: u64,

        /// The comment text
        #[arg(long)]
        comment_body: String,

        /// ID of the comment to update; a new comment is created when omitted
        #[arg(long)]
        comment_id: Option<u64>,
    },

    /// Delete a comment with the provided id on a pull request
    DeletePrComment {
        #[command(flatten)]
        target: Target,

        /// Pull request number
        #[arg(long)]
        pr_number: u64,

        /// ID of the comment to delete
        #[arg(long)]
        comment_id: u64,
    },

    /// Label and close stale issues
    ProcessStaleIssues {
        #[command(flatten)]
        target: Target,

        /// Label to mark stale issues
        #[arg(long, default_value = DEFAULT_STALE_LABEL)]
        stale_issue_label: String,

        /// Number of days before an issue is considered stale
        #[arg(long, default_value_t = 999)]
        days_before_stale: u32,

        /// Number of days before a stale issue is closed
        #[arg(long, default_value_t = 5)]
        days_before_close: u32,
    },

    /// Label, comment on and close stale pull requests
    ProcessStalePrs {
        #[command(flatten)]
        target: Target,

        /// Message to post on stale PRs
        #[arg(long, default_value = DEFAULT_STALE_PR_MESSAGE)]
        stale_pr_message: String,

        /// Label to mark stale PRs
        #[arg(long, default_value = DEFAULT_STALE_LABEL)]
        stale_issue_label: String,

        /// Comma-separated exempt labels
        #[arg(long, default_value = DEFAULT_EXEMPT_LABEL)]
        exempt_labels: String,

        /// Number of days before a PR is considered stale
        #[arg(long, default_value_t = 14)]
        days_before_stale: u32,

        /// Number of days before a stale PR is closed
        #[arg(long, default_value_t = 5)]
        days_before_close: u32,
    },

    /// Print ids of PR comments matching a substring and author type
    GetPrComments {
        #[command(flatten)]
        target: Target,

        /// Pull request number
        #[arg(long)]
        pr_number: u64,

        /// Substring to search in comments
        #[arg(long)]
        message_substring: String,

        /// User type to filter comments. Can be 'User' or 'Bot'
        #[arg(long)]
        user_type: String,
    },

    /// Get the base commit SHA of a pull request
    GetPrBaseSha {
        #[command(flatten)]
        target: Target,

        /// Pull request number
        #[arg(long)]
        pr_number: u64,
    },

    /// Generate a GitHub App installation access token for a repository
    GetGithubAccessToken {
        /// GitHub App ID
        #[arg(long, env = "GITHUB_APP_ID")]
        app_id: String,

        /// Private key contents (PEM, line breaks may be collapsed); takes
        /// precedence over --private-key-path
        #[arg(long, env = "GITHUB_APP_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        /// Path to the private key PEM file
        #[arg(long, env = "GITHUB_APP_PRIVATE_KEY_PATH")]
        private_key_path: Option<PathBuf>,

        /// GitHub repository in the format 'owner/repo'
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repo: String,

        /// Output file path (optional, prints to stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = TokenFormat::Token)]
        format: TokenFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TokenFormat {
    /// The bare token
    Token,
    /// Token, repository and expiry as JSON
    Json,
}

#[derive(Serialize)]
struct TokenOutput {
    token: String,
    repository: String,
    expires_at: String,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_issue_file(path: &PathBuf) -> Result<String> {
    if !path.is_file() {
        bail!(
            "The file '{}' does not exist or is not a valid file.",
            path.display()
        );
    }
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .trim()
        .to_string();
    if body.is_empty() {
        bail!("The file is empty. Provide a file with valid issue content.");
    }
    Ok(body)
}

async fn create_issue_command(
    target: &Target,
    title: String,
    body: String,
    labels: Option<String>,
    assignees: Option<String>,
) -> Result<()> {
    let (client, repo) = target.connect()?;
    let new_issue = NewIssue::new(title, body)
        .labels(labels.as_deref().map(split_list).unwrap_or_default())
        .assignees(assignees.as_deref().map(split_list).unwrap_or_default());

    let issue = create_issue(&client, &repo, &new_issue).await?;
    println!("Issue #{} created successfully: {}", issue.number, issue.html_url);
    Ok(())
}

fn report_stale_run(kind: &str, summary: &StaleRunSummary) {
    info!(
        processed = summary.processed,
        marked = summary.marked,
        closed = summary.closed,
        exempt = summary.exempt,
        failures = summary.failures.len(),
        "Stale {} run finished",
        kind
    );
    for failure in &summary.failures {
        warn!(number = failure.number, error = %failure.error, "Item not processed");
    }
}

/// Write the token readable by the owner only, from the moment the file exists
fn write_token_file(path: &Path, contents: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to write token to {}", path.display()))?;
    // mode() only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write token to {}", path.display()))?;
    Ok(())
}

fn write_token(output: Option<PathBuf>, contents: &str) -> Result<()> {
    let Some(output_path) = output else {
        println!("{}", contents);
        return Ok(());
    };

    write_token_file(&output_path, contents)?;
    eprintln!("Token saved to {}", output_path.display());
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::CreateIssueFromFile {
            target,
            file_path,
            issue_title,
            issue_labels,
            assignees,
        } => {
            let body = read_issue_file(&file_path)?;
            create_issue_command(&target, issue_title, body, issue_labels, assignees).await
        }

        Commands::CreateIssueFromString {
            target,
            issue_body,
            issue_title,
            issue_labels,
            assignees,
        } => create_issue_command(&target, issue_title, issue_body, issue_labels, assignees).await,

        Commands::PostPrComment {
            target,
            pr_number,
            comment_body,
            comment_id,
        } => {
            let (client, repo) = target.connect()?;
            let outcome = post_or_update_comment(&client, &repo, pr_number, &comment_body, comment_id)
                .await
                .with_context(|| match comment_id {
                    Some(id) => format!("Failed to update comment #{id}"),
                    None => format!("Failed to comment on PR #{pr_number}"),
                })?;
            println!("{}", outcome);
            Ok(())
        }

        Commands::DeletePrComment {
            target,
            pr_number,
            comment_id,
        } => {
            let (client, repo) = target.connect()?;
            let outcome = delete_comment(&client, &repo, pr_number, comment_id)
                .await
                .with_context(|| format!("Failed to delete comment #{comment_id}"))?;
            println!("{}", outcome);
            Ok(())
        }

        Commands::ProcessStaleIssues {
            target,
            stale_issue_label,
            days_before_stale,
            days_before_close,
        } => {
            let (client, repo) = target.connect()?;
            let policy = StalePolicy::new(stale_issue_label, days_before_stale, days_before_close);
            let summary = process_stale_issues(&client, &repo, &policy).await?;
            report_stale_run("issue", &summary);
            println!("Stale issue check completed successfully.");
            Ok(())
        }

        Commands::ProcessStalePrs {
            target,
            stale_pr_message,
            stale_issue_label,
            exempt_labels,
            days_before_stale,
            days_before_close,
        } => {
            let (client, repo) = target.connect()?;
            let policy = StalePolicy::new(stale_issue_label, days_before_stale, days_before_close)
                .exempt_labels(split_list(&exempt_labels))
                .stale_message(stale_pr_message);
            let summary = process_stale_prs(&client, &repo, &policy).await?;
            report_stale_run("PR", &summary);
            println!("Stale PR check completed successfully.");
            Ok(())
        }

        Commands::GetPrComments {
            target,
            pr_number,
            message_substring,
            user_type,
        } => {
            let (client, repo) = target.connect()?;
            let ids = get_comment_ids(&client, &repo, pr_number, &message_substring, &user_type).await?;
            let joined: Vec<String> = ids.iter().map(u64::to_string).collect();
            println!("{}", joined.join(","));
            Ok(())
        }

        Commands::GetPrBaseSha { target, pr_number } => {
            let (client, repo) = target.connect()?;
            println!("{}", pr_base_sha(&client, &repo, pr_number).await?);
            Ok(())
        }

        Commands::GetGithubAccessToken {
            app_id,
            private_key,
            private_key_path,
            repo,
            output,
            format,
        } => {
            let repo: RepoRef = repo.parse()?;
            let key_source = match (private_key, private_key_path) {
                (Some(key), _) => PrivateKeySource::Literal(key),
                (None, Some(path)) => PrivateKeySource::File(path),
                (None, None) => bail!("Either --private-key or --private-key-path must be specified"),
            };
            let credentials = AppCredentials::new(app_id, &key_source)?;

            info!(app_id = %credentials.app_id, repo = %repo, "Generating installation token");
            let token = mint_installation_token(&ClientConfig::from_env()?, &credentials, &repo).await?;

            let contents = match format {
                TokenFormat::Json => serde_json::to_string_pretty(&TokenOutput {
                    token: token.token,
                    repository: repo.to_string(),
                    expires_at: token.expires_at,
                })?,
                TokenFormat::Token => token.token,
            };
            write_token(output, &contents)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
