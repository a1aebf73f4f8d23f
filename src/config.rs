use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::coverage::Thresholds;

pub const CONFIG_FILE: &str = "covreport.toml";
pub const DEFAULT_STATUS_CONTEXT: &str = "Coverage Report";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: ThresholdsConfig,
    pub status: StatusConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Below this line rate the level is red
    pub alert: f64,
    /// From this line rate on the level is green
    pub warning: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            alert: 50.0,
            warning: 90.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub context: String,
    pub target_url: Option<String>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            context: DEFAULT_STATUS_CONTEXT.to_string(),
            target_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Post a commit status
    pub status: bool,
    /// Post the markdown table as a pull request comment
    pub comment: bool,
    pub comment_mode: CommentMode,
    pub token: Option<String>,
    pub api_url: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            status: true,
            comment: true,
            comment_mode: CommentMode::default(),
            token: None,
            api_url: None,
        }
    }
}

/// How an existing coverage comment on the pull request is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
    /// Delete previous coverage comments, then post a new one
    #[default]
    Replace,
    /// Edit the latest coverage comment in place
    Update,
    /// Always post a new comment
    Insert,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Load an explicit config file, or `covreport.toml` when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            alert: self.thresholds.alert,
            warning: self.thresholds.warning,
        }
    }

    /// Configured target URL, else the GitHub Actions run page, else empty
    pub fn target_url(&self) -> String {
        if let Some(ref url) = self.status.target_url {
            return url.clone();
        }

        actions_run_url(
            env::var("GITHUB_SERVER_URL").ok().as_deref(),
            env::var("GITHUB_REPOSITORY").ok().as_deref(),
            env::var("GITHUB_RUN_ID").ok().as_deref(),
        )
        .unwrap_or_default()
    }
}

fn actions_run_url(server: Option<&str>, repo: Option<&str>, run_id: Option<&str>) -> Option<String> {
    match (server, repo, run_id) {
        (Some(server), Some(repo), Some(run_id)) => Some(format!(
            "{}/{}/actions/runs/{}",
            server.trim_end_matches('/'),
            repo,
            run_id
        )),
        _ => None,
    }
}
