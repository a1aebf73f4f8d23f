use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use covreport::config::{CommentMode, Config};
use covreport::notifications::{publish_coverage, PublishTarget};
use covreport::report::{
    generate_badge_url, generate_emoji, generate_status, generate_table, StatusPayload,
    StatusState,
};
use covreport::{analyze, ClassifiedMetric, Thresholds};

const LOG_ENV: &str = "COVREPORT_LOG";

#[derive(Parser)]
#[command(name = "covreport")]
#[command(about = "Clover coverage reports as CI status checks, badges and markdown")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covreport.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the coverage summary
    Check {
        #[command(flatten)]
        report: ReportArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit with an error when coverage is below the alert threshold
        #[arg(long)]
        strict: bool,
    },

    /// Print the shields.io badge URL
    Badge {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Post a commit status and a pull request comment to GitHub
    Publish {
        #[command(flatten)]
        report: ReportArgs,

        /// Commit SHA (default: $GITHUB_SHA)
        #[arg(long)]
        sha: Option<String>,

        /// Pull request number (default: parsed from $GITHUB_REF)
        #[arg(long)]
        pr: Option<u64>,

        /// How earlier coverage comments are handled (overrides config)
        #[arg(long, value_enum)]
        comment_mode: Option<CommentMode>,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Clover XML report
    file: PathBuf,

    /// Line rate below which coverage is red
    #[arg(long)]
    threshold_alert: Option<f64>,

    /// Line rate from which coverage is green
    #[arg(long)]
    threshold_warning: Option<f64>,

    /// URL linked from the commit status
    #[arg(long)]
    target_url: Option<String>,

    /// Commit status context
    #[arg(long)]
    status_context: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

/// Report arguments merged over the config file
struct Settings {
    thresholds: Thresholds,
    target_url: String,
    status_context: String,
}

impl Settings {
    fn merge(config: &Config, args: &ReportArgs) -> Self {
        let defaults = config.thresholds();
        Self {
            thresholds: Thresholds {
                alert: args.threshold_alert.unwrap_or(defaults.alert),
                warning: args.threshold_warning.unwrap_or(defaults.warning),
            },
            target_url: args.target_url.clone().unwrap_or_else(|| config.target_url()),
            status_context: args
                .status_context
                .clone()
                .unwrap_or_else(|| config.status.context.clone()),
        }
    }
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::discover(cli.config.as_deref()).context("Could not load configuration")?;

    match cli.command {
        Commands::Check {
            report,
            format,
            strict,
        } => cmd_check(&config, &report, format, strict).await,
        Commands::Badge { report } => cmd_badge(&config, &report).await,
        Commands::Publish {
            report,
            sha,
            pr,
            comment_mode,
        } => cmd_publish(&config, &report, sha, pr, comment_mode).await,
    }
}

async fn load(settings: &Settings, args: &ReportArgs) -> Result<ClassifiedMetric> {
    analyze(&args.file, &settings.thresholds)
        .await
        .with_context(|| format!("Could not process {}", args.file.display()))
}

async fn cmd_check(config: &Config, args: &ReportArgs, format: OutputFormat, strict: bool) -> Result<()> {
    let settings = Settings::merge(config, args);
    let metric = load(&settings, args).await?;
    let status = generate_status(&settings.target_url, &settings.status_context, &metric);

    match format {
        OutputFormat::Text => {
            println!("\n{} {}\n", "📊".cyan(), settings.status_context.bold());
            metric.print_summary(&settings.thresholds, generate_emoji(&metric));
            println!();
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "metric": metric,
                "status": &status,
                "badge": generate_badge_url(&metric),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Markdown => print!("{}", generate_table(&metric)),
    }

    if strict {
        ensure_passing(&status)?;
    }

    Ok(())
}

/// Fail when the commit status would be a failure
fn ensure_passing(status: &StatusPayload) -> Result<()> {
    if status.state == StatusState::Failure {
        anyhow::bail!("coverage below the alert threshold ({})", status.description);
    }
    Ok(())
}

async fn cmd_badge(config: &Config, args: &ReportArgs) -> Result<()> {
    let settings = Settings::merge(config, args);
    let metric = load(&settings, args).await?;
    println!("{}", generate_badge_url(&metric));
    Ok(())
}

async fn cmd_publish(
    config: &Config,
    args: &ReportArgs,
    sha: Option<String>,
    pr: Option<u64>,
    comment_mode: Option<CommentMode>,
) -> Result<()> {
    let settings = Settings::merge(config, args);
    let mut github = config.github.clone();
    if let Some(mode) = comment_mode {
        github.comment_mode = mode;
    }

    let metric = load(&settings, args).await?;
    let status = generate_status(&settings.target_url, &settings.status_context, &metric);
    let table = generate_table(&metric);
    let target = PublishTarget::resolve(sha, pr);

    publish_coverage(&github, &target, &status, &table).await?;

    println!(
        "{} {}{}",
        "✓".green(),
        status.description,
        generate_emoji(&metric)
    );

    Ok(())
}
