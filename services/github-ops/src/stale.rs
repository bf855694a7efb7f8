//! Stale issue and pull request handling
//!
//! The remote label set is the only state. Each run re-evaluates every open
//! item: fresh items are left alone, stale items get the stale label, and
//! items that already carry the label and have been idle for
//! `days_before_stale + days_before_close` days are closed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::client::GitHubClient;
use crate::comments::create_comment;
use crate::error::Result;
use crate::issues::{add_labels, close_issue, list_open_issues};
use crate::pr::{close_pull_request, list_open_pull_requests};
use crate::repo::{label_names, RepoRef};

pub const DEFAULT_STALE_LABEL: &str = "S-stale";
pub const DEFAULT_EXEMPT_LABEL: &str = "S-exempt-stale";
pub const DEFAULT_STALE_PR_MESSAGE: &str = "This PR is stale because it has been open 14 days with no activity. Remove stale label or comment or this will be closed in 5 days.";

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days between `updated_at` and `now`, floored
///
/// A timestamp in the future counts as a negative number of days.
pub fn elapsed_days(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - updated_at).num_seconds().div_euclid(SECONDS_PER_DAY)
}

pub fn is_stale_at(updated_at: DateTime<Utc>, threshold_days: i64, now: DateTime<Utc>) -> bool {
    elapsed_days(updated_at, now) >= threshold_days
}

/// Whether an item has been idle for at least `threshold_days` as of now
pub fn is_stale(updated_at: DateTime<Utc>, threshold_days: i64) -> bool {
    is_stale_at(updated_at, threshold_days, Utc::now())
}

/// Thresholds and labels for one stale run
#[derive(Debug, Clone)]
pub struct StalePolicy {
    pub stale_label: String,
    pub days_before_stale: u32,
    pub days_before_close: u32,
    /// Items carrying any of these are never touched
    pub exempt_labels: Vec<String>,
    /// Posted when an item is first marked stale
    pub stale_message: Option<String>,
}

impl StalePolicy {
    pub fn new(stale_label: impl Into<String>, days_before_stale: u32, days_before_close: u32) -> Self {
        Self {
            stale_label: stale_label.into(),
            days_before_stale,
            days_before_close,
            exempt_labels: Vec::new(),
            stale_message: None,
        }
    }

    pub fn exempt_labels(mut self, labels: Vec<String>) -> Self {
        self.exempt_labels = labels;
        self
    }

    pub fn stale_message(mut self, message: impl Into<String>) -> Self {
        self.stale_message = Some(message.into());
        self
    }

    fn close_threshold(&self) -> i64 {
        i64::from(self.days_before_stale) + i64::from(self.days_before_close)
    }
}

/// Decision for a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleAction {
    /// Carries an exempt label
    Exempt,
    NotStale,
    /// Stale, not yet labeled
    MarkStale,
    /// Labeled, close threshold not reached
    AwaitingClose,
    Close,
}

/// Decide what to do with an item given its labels and last update
pub fn evaluate(
    policy: &StalePolicy,
    updated_at: DateTime<Utc>,
    labels: &[String],
    now: DateTime<Utc>,
) -> StaleAction {
    if labels.iter().any(|l| policy.exempt_labels.contains(l)) {
        return StaleAction::Exempt;
    }
    if !is_stale_at(updated_at, i64::from(policy.days_before_stale), now) {
        return StaleAction::NotStale;
    }
    if !labels.contains(&policy.stale_label) {
        return StaleAction::MarkStale;
    }
    if is_stale_at(updated_at, policy.close_threshold(), now) {
        StaleAction::Close
    } else {
        StaleAction::AwaitingClose
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub number: u64,
    pub error: String,
}

/// Counters for one stale run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleRunSummary {
    pub processed: usize,
    pub not_stale: usize,
    pub marked: usize,
    pub awaiting_close: usize,
    pub closed: usize,
    pub exempt: usize,
    pub failures: Vec<ItemFailure>,
}

impl StaleRunSummary {
    fn record(&mut self, action: StaleAction) {
        match action {
            StaleAction::Exempt => self.exempt += 1,
            StaleAction::NotStale => self.not_stale += 1,
            StaleAction::MarkStale => self.marked += 1,
            StaleAction::AwaitingClose => self.awaiting_close += 1,
            StaleAction::Close => self.closed += 1,
        }
    }

    fn fail(&mut self, number: u64, error: impl ToString) {
        self.failures.push(ItemFailure {
            number,
            error: error.to_string(),
        });
    }
}

/// Label and close stale issues; pull requests in the listing are skipped
pub async fn process_stale_issues(
    client: &GitHubClient,
    repo: &RepoRef,
    policy: &StalePolicy,
) -> Result<StaleRunSummary> {
    let now = Utc::now();
    let issues: Vec<_> = list_open_issues(client, repo)
        .await?
        .into_iter()
        .filter(|issue| !issue.is_pull_request())
        .collect();
    info!(repo = %repo, count = issues.len(), "Processing issues");

    let mut summary = StaleRunSummary::default();
    for issue in issues {
        summary.processed += 1;
        let labels = label_names(&issue.labels);
        let action = evaluate(policy, issue.updated_at, &labels, now);

        let applied = match action {
            StaleAction::MarkStale => {
                info!(number = issue.number, "Issue is stale, adding stale label");
                add_labels(client, repo, issue.number, std::slice::from_ref(&policy.stale_label)).await
            }
            StaleAction::Close => {
                info!(number = issue.number, "Issue is stale and will be closed");
                close_issue(client, repo, issue.number).await
            }
            StaleAction::NotStale => {
                info!(number = issue.number, "Issue is not stale");
                Ok(())
            }
            StaleAction::AwaitingClose | StaleAction::Exempt => Ok(()),
        };

        match applied {
            Ok(()) => summary.record(action),
            Err(e) => {
                error!(number = issue.number, error = %e, "Error processing issue");
                summary.fail(issue.number, e);
            }
        }
    }

    Ok(summary)
}

/// Label, comment on and close stale pull requests
pub async fn process_stale_prs(
    client: &GitHubClient,
    repo: &RepoRef,
    policy: &StalePolicy,
) -> Result<StaleRunSummary> {
    let now = Utc::now();
    let pulls = list_open_pull_requests(client, repo).await?;
    info!(repo = %repo, count = pulls.len(), "Processing pull requests");

    let mut summary = StaleRunSummary::default();
    for pr in pulls {
        summary.processed += 1;
        let labels = label_names(&pr.labels);
        let action = evaluate(policy, pr.updated_at, &labels, now);

        let applied = match action {
            StaleAction::Exempt => {
                info!(number = pr.number, "Skipping PR due to exempt label");
                Ok(())
            }
            StaleAction::MarkStale => {
                info!(number = pr.number, "PR is stale, adding stale label and posting comment");
                mark_pr_stale(client, repo, pr.number, policy).await
            }
            StaleAction::Close => {
                info!(number = pr.number, "PR is stale and will be closed");
                close_pull_request(client, repo, pr.number).await
            }
            StaleAction::NotStale => {
                info!(number = pr.number, "PR is not stale");
                Ok(())
            }
            StaleAction::AwaitingClose => Ok(()),
        };

        match applied {
            Ok(()) => summary.record(action),
            Err(e) => {
                error!(number = pr.number, error = %e, "Error processing PR");
                summary.fail(pr.number, e);
            }
        }
    }

    Ok(summary)
}

async fn mark_pr_stale(client: &GitHubClient, repo: &RepoRef, number: u64, policy: &StalePolicy) -> Result<()> {
    add_labels(client, repo, number, std::slice::from_ref(&policy.stale_label)).await?;
    if let Some(message) = &policy.stale_message {
        create_comment(client, repo, number, message).await?;
    }
    Ok(())
}
