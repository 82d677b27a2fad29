use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bulkctl::cli::format::{outcome_summary, progress_bar};
use bulkctl::config::{AppConfig, DEFAULT_CONFIG_FILE};
use bulkctl::context::AppContext;
use bulkctl::core::{BulkResource, JobOutcome, ProgressState};
use bulkctl::logging::{self, LogConfig, LogSink};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "bulkctl")]
#[command(about = "Trigger and follow streamed bulk update jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: bulkctl.toml, or $BULKCTL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a bulk job and stream its progress
    Run {
        #[arg(value_enum)]
        resource: BulkResource,
    },
    /// Show aggregate bulk update status
    Status,
    /// Update a single unit, e.g. `update workspace 42`
    Update { unit: String, id: String },
    /// GET a resource with the configured bearer token
    Fetch { path: String },
    /// Interactive dashboard
    Tui {
        #[arg(value_enum, default_value_t = BulkResource::AltTexts)]
        resource: BulkResource,
    },
    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default configuration
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Serialize)]
struct ConfigArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, env = "BULKCTL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    max_stream_secs: Option<u64>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    #[arg(long, short, global = true)]
    verbose: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    #[arg(long, global = true)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Config(ConfigCommand::Init { path, force }) = &cli.command {
        AppConfig::default().write_to(path, *force)?;
        println!("Wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::new(cli.config.as_deref(), Some(&cli.overrides))?;
    let sink = match cli.command {
        Commands::Tui { .. } => LogSink::Discard,
        _ => LogSink::Stderr,
    };
    logging::init(LogConfig::from_app(&config, sink));

    let ctx = AppContext::new(config).context("Invalid API configuration")?;

    match cli.command {
        Commands::Run { resource } => run_job(ctx, resource).await.context("Bulk job failed"),
        Commands::Status => run_status(ctx).await.context("Failed to fetch status"),
        Commands::Update { unit, id } => run_update(ctx, &unit, &id)
            .await
            .context("Single update failed"),
        Commands::Fetch { path } => run_fetch(ctx, &path).await.context("Fetch failed"),
        Commands::Tui { resource } => bulkctl::cli::tui::run(ctx, resource)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Config(_) => Ok(ExitCode::SUCCESS),
    }
}

async fn run_job(ctx: AppContext, resource: BulkResource) -> Result<ExitCode> {
    if let Err(e) = ctx.runner.refresh_status().await {
        tracing::warn!(error = %e, "Cold-start status unavailable");
    }

    let (tx, mut rx) = mpsc::channel::<ProgressState>(64);
    let handle = ctx.runner.start_observed(resource, Some(tx)).await?;
    println!("Started {} (run {})", resource, handle.run_id());

    let printer = tokio::spawn(async move {
        while let Some(state) = rx.recv().await {
            print_progress(&state);
        }
    });

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted, cancelling");
            JobOutcome::Cancelled
        }
    };
    let _ = printer.await;

    println!("{}", outcome_summary(&outcome));
    if let JobOutcome::Failed { last: Some(last), .. } = &outcome {
        for error in &last.errors {
            println!("  ✗ {}", error);
        }
    }

    Ok(match outcome {
        JobOutcome::Completed { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn print_progress(state: &ProgressState) {
    let Some(frame) = &state.latest else {
        return;
    };
    println!(
        "{} {:>3.0}%  {}/{}  {}  {}",
        progress_bar(frame.percentage, 25),
        frame.percentage,
        frame.current,
        frame.total,
        frame.stage,
        frame.message
    );
}

async fn run_status(ctx: AppContext) -> Result<ExitCode> {
    let status = ctx.runner.refresh_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(ExitCode::SUCCESS)
}

async fn run_update(ctx: AppContext, unit: &str, id: &str) -> Result<ExitCode> {
    let result = ctx.client.update_single(unit, id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_fetch(ctx: AppContext, path: &str) -> Result<ExitCode> {
    let value = ctx.client.get_authenticated(path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(ExitCode::SUCCESS)
}
