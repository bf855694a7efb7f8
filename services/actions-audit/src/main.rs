//! GitHub Actions Audit
//!
//! Reports, for every repository in an organization (or a single one), whether
//! Actions is enabled, how forks are treated, how many workflows are
//! registered and which workflow files exist. Results go to a timestamped CSV.
//!
//! ## Usage
//! ```bash
//! GITHUB_TOKEN=<TOKEN> actions-audit --org acme --output-dir ./reports
//! actions-audit --org acme --repo widgets
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use github_ops::report::{report_file_name, AuditReport};
use github_ops::{ActionsAuditor, ClientConfig, GitHubClient};

/// Audit GitHub Actions configuration across an organization
#[derive(Parser, Debug)]
#[command(name = "actions-audit")]
#[command(about = "Audit GitHub Actions configuration across an organization's repositories")]
#[command(version)]
struct Args {
    /// GitHub token with read access to the organization
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Organization to audit
    #[arg(long, env = "GITHUB_ORG")]
    org: String,

    /// Audit only this repository of the organization
    #[arg(long)]
    repo: Option<String>,

    /// Directory for the CSV report
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
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

fn print_summary(report: &AuditReport, output: &std::path::Path) {
    let summary = report.summary();
    println!("Audit report written to {}", output.display());
    println!("Repositories audited:      {}", summary.total);
    println!("Actions enabled:           {}", summary.actions_enabled);
    println!("Repositories w/ workflows: {}", summary.with_workflows);
    if summary.failed > 0 {
        println!("Repositories failed:       {}", summary.failed);
    }

    if summary.with_workflows > 0 {
        println!();
        println!("Repositories with workflows:");
        for record in report.with_workflows() {
            let state = if record.actions_enabled { "enabled" } else { "disabled" };
            println!("- {}: {} workflows ({})", record.repository, record.workflow_count, state);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let client = GitHubClient::new(args.github_token.as_str(), &ClientConfig::from_env()?)?;
    let auditor = ActionsAuditor::new(client, args.org.as_str());

    let report = match args.repo.as_deref() {
        Some(name) => auditor
            .audit_repository(name)
            .await
            .with_context(|| format!("Failed to audit {}/{}", auditor.org(), name))?,
        None => auditor
            .audit_organization()
            .await
            .with_context(|| format!("Failed to list repositories for {}", auditor.org()))?,
    };

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let output = args
        .output_dir
        .join(report_file_name(auditor.org(), args.repo.as_deref(), Local::now()));
    report
        .write_csv(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(org = %auditor.org(), rows = report.records.len(), "Audit complete");
    print_summary(&report, &output);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
