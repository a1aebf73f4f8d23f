//! GitHub commit statuses and pull request comments

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use std::env;
use tracing::{debug, info};

use crate::config::{CommentMode, GithubConfig};
use crate::report::StatusPayload;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Minimal view of an issue comment
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    repo: String,
    token: String,
}

impl GithubClient {
    pub fn new(api_url: &str, repo: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        }
    }

    /// Build a client from config, falling back to the GitHub Actions environment
    pub fn from_env(config: &GithubConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .ok_or_else(|| anyhow::anyhow!("GitHub token not found"))?;

        let repo = env::var("GITHUB_REPOSITORY")
            .ok()
            .ok_or_else(|| anyhow::anyhow!("GITHUB_REPOSITORY not set"))?;

        let api_url = config
            .api_url
            .clone()
            .or_else(|| env::var("GITHUB_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self::new(&api_url, &repo, &token))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/repos/{}{}", self.api_url, self.repo, path))
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", "covreport")
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Post a commit status
    pub async fn post_status(&self, sha: &str, status: &StatusPayload) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, &format!("/statuses/{}", sha))
            .json(status)
            .send()
            .await?;

        ensure_success(response, "GitHub status check").await?;
        info!(sha, state = ?status.state, "posted commit status");
        Ok(())
    }

    pub async fn list_comments(&self, pr: u64) -> Result<Vec<IssueComment>> {
        let mut comments = Vec::new();
        let mut page = 1u32;

        loop {
            let page_param = page.to_string();
            let response = self
                .request(reqwest::Method::GET, &format!("/issues/{}/comments", pr))
                .query(&[("per_page", "100"), ("page", page_param.as_str())])
                .send()
                .await?;

            let response = ensure_success(response, "Listing PR comments").await?;
            let batch: Vec<IssueComment> = response.json().await?;
            let done = batch.len() < 100;
            comments.extend(batch);

            if done {
                break;
            }
            page += 1;
        }

        debug!(pr, count = comments.len(), "listed PR comments");
        Ok(comments)
    }

    pub async fn create_comment(&self, pr: u64, body: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, &format!("/issues/{}/comments", pr))
            .json(&json!({ "body": body }))
            .send()
            .await?;

        ensure_success(response, "Creating PR comment").await?;
        info!(pr, "created coverage comment");
        Ok(())
    }

    pub async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, &format!("/issues/comments/{}", comment_id))
            .json(&json!({ "body": body }))
            .send()
            .await?;

        ensure_success(response, "Updating PR comment").await?;
        info!(comment_id, "updated coverage comment");
        Ok(())
    }

    pub async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/issues/comments/{}", comment_id))
            .send()
            .await?;

        ensure_success(response, "Deleting PR comment").await?;
        debug!(comment_id, "deleted coverage comment");
        Ok(())
    }

    /// Post the coverage comment, handling earlier ones according to `mode`
    pub async fn publish_comment(
        &self,
        pr: u64,
        status_context: &str,
        table: &str,
        mode: CommentMode,
    ) -> Result<()> {
        let marker = comment_marker(status_context);
        let body = comment_body(table, &marker);

        let comments = match mode {
            CommentMode::Insert => Vec::new(),
            CommentMode::Update | CommentMode::Replace => self.list_comments(pr).await?,
        };
        let plan = plan_comment(&comments, &marker, mode);

        if let Some(comment_id) = plan.update {
            self.update_comment(comment_id, &body).await?;
        }
        if plan.create {
            self.create_comment(pr, &body).await?;
        }
        for comment_id in plan.delete {
            self.delete_comment(comment_id).await?;
        }

        Ok(())
    }
}

/// Comment operations, executed as update, create, then delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPlan {
    pub update: Option<u64>,
    pub create: bool,
    pub delete: Vec<u64>,
}

/// Decide what to do with the existing comments of a pull request
///
/// Deletions run after the new comment exists, so a failed create never
/// leaves the PR without a coverage comment.
pub fn plan_comment(comments: &[IssueComment], marker: &str, mode: CommentMode) -> CommentPlan {
    let existing = find_comments(comments, marker);

    match mode {
        CommentMode::Insert => CommentPlan {
            create: true,
            ..Default::default()
        },
        CommentMode::Update => match existing.last() {
            Some(latest) => CommentPlan {
                update: Some(latest.id),
                ..Default::default()
            },
            None => CommentPlan {
                create: true,
                ..Default::default()
            },
        },
        CommentMode::Replace => CommentPlan {
            update: None,
            create: true,
            delete: existing.iter().map(|c| c.id).collect(),
        },
    }
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("{} failed: {} - {}", what, status, text);
    }
    Ok(response)
}

/// Hidden marker identifying comments posted for a status context
pub fn comment_marker(status_context: &str) -> String {
    format!("<!-- covreport: {} -->", status_context)
}

pub fn comment_body(table: &str, marker: &str) -> String {
    format!("{}\n{}\n", table, marker)
}

/// Comments carrying `marker`, oldest first
pub fn find_comments<'a>(comments: &'a [IssueComment], marker: &str) -> Vec<&'a IssueComment> {
    comments
        .iter()
        .filter(|c| c.body.as_deref().is_some_and(|body| body.contains(marker)))
        .collect()
}

/// PR number from a `refs/pull/<n>/merge` ref
pub fn pull_request_number(git_ref: &str) -> Option<u64> {
    git_ref
        .strip_prefix("refs/pull/")?
        .split('/')
        .next()?
        .parse()
        .ok()
}
