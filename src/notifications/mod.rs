//! Notifications module
//!
//! Provides:
//! - GitHub commit statuses
//! - GitHub pull request comments

mod github;

pub use github::*;

use std::env;
use tracing::warn;

use crate::config::GithubConfig;
use crate::report::StatusPayload;

/// Where to publish on GitHub
#[derive(Debug, Clone, Default)]
pub struct PublishTarget {
    pub sha: Option<String>,
    pub pr: Option<u64>,
}

impl PublishTarget {
    /// Fill gaps from `GITHUB_SHA` and `GITHUB_REF`
    pub fn resolve(sha: Option<String>, pr: Option<u64>) -> Self {
        Self {
            sha: sha.or_else(|| env::var("GITHUB_SHA").ok()),
            pr: pr.or_else(|| {
                env::var("GITHUB_REF")
                    .ok()
                    .and_then(|git_ref| pull_request_number(&git_ref))
            }),
        }
    }
}

/// Publish the status and the comment as configured
pub async fn publish_coverage(
    config: &GithubConfig,
    target: &PublishTarget,
    status: &StatusPayload,
    table: &str,
) -> anyhow::Result<()> {
    let mut errors = Vec::new();

    let status_sha = match (config.status, target.sha.as_deref()) {
        (true, Some(sha)) => Some(sha),
        (true, None) => {
            errors.push("Status: commit SHA not found".to_string());
            None
        }
        (false, _) => None,
    };

    let comment_pr = match (config.comment, target.pr) {
        (true, Some(pr)) => Some(pr),
        (true, None) => {
            warn!("no pull request number, skipping coverage comment");
            None
        }
        (false, _) => None,
    };

    // Token and repository are only required once there is something to send.
    if status_sha.is_some() || comment_pr.is_some() {
        let client = GithubClient::from_env(config)?;

        if let Some(sha) = status_sha {
            if let Err(e) = client.post_status(sha, status).await {
                errors.push(format!("Status: {}", e));
            }
        }

        if let Some(pr) = comment_pr {
            if let Err(e) = client
                .publish_comment(pr, &status.context, table, config.comment_mode)
                .await
            {
                errors.push(format!("Comment: {}", e));
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("GitHub publish errors: {}", errors.join(", "));
    }

    Ok(())
}
