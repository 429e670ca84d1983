//! ralphex - autonomous plan execution with Claude Code.

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing::info;

use ralphex::config::RunnerConfig;
use ralphex::phase::Mode;
use ralphex::progress::format_elapsed;
use ralphex::runner::{RunContext, RunStatus, Runner};
use ralphex::{git, plan, RalphexError};

#[derive(Parser)]
#[command(name = "ralphex")]
#[command(version)]
#[command(about = "Autonomous plan execution with Claude Code", long_about = None)]
struct Cli {
    /// Maximum task iterations
    #[arg(short, long, default_value_t = 50)]
    max_iterations: u32,

    /// Skip task execution, run full review pipeline
    #[arg(short, long)]
    review: bool,

    /// Skip tasks and first review, run only codex loop
    #[arg(short, long)]
    codex_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the final run report as JSON
    #[arg(long)]
    json: bool,

    /// Path to plan file (optional, selected from docs/plans if omitted)
    plan_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "ralphex=debug,info"
    } else {
        "ralphex=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("ralphex {}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> ralphex::Result<i32> {
    // check dependencies before anything else
    for tool in ["claude", "git"] {
        if which::which(tool).is_err() {
            return Err(RalphexError::MissingTool { tool: tool.into() });
        }
    }

    let project_dir = std::env::current_dir()?;
    let mode = Mode::from_flags(cli.review, cli.codex_only);

    let plan_file = plan::select_plan(cli.plan_file, !mode.requires_plan(), &project_dir)?;

    // create branch if on main/master; precondition, not a phase
    if let Some(ref plan) = plan_file {
        git::create_branch_if_needed(&project_dir, plan)?;
    }
    git::ensure_gitignore(&project_dir)?;
    let branch = git::current_branch(&project_dir)?;

    let mut config = RunnerConfig::load(&project_dir)?;
    config.set_task_iterations(cli.max_iterations);

    let ctx = RunContext::new(mode, plan_file, branch);
    let runner = Runner::new(config, ctx, project_dir);

    spawn_signal_listener(runner.cancel_token());

    let report = runner.run().await?;

    if cli.json {
        let json = serde_json::json!({
            "status": report.status,
            "elapsed": format_elapsed(report.elapsed),
            "elapsed_seconds": report.elapsed.as_secs(),
            "progress_log": report.progress_log,
        });
        println!("{json}");
    } else {
        let status = match report.status {
            RunStatus::Success => "success".green().bold(),
            RunStatus::Incomplete => "incomplete".yellow().bold(),
            RunStatus::Cancelled => "cancelled".red().bold(),
        };
        println!(
            "\n{status} in {} (log: {})",
            format_elapsed(report.elapsed),
            report.progress_log.display()
        );
    }

    Ok(match report.status {
        RunStatus::Success => 0,
        RunStatus::Incomplete => 3,
        RunStatus::Cancelled => 130,
    })
}

/// Wire SIGINT/SIGTERM to the run's cancellation token.
fn spawn_signal_listener(cancel: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (Ok(mut sigterm), Ok(mut sigint)) =
                (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
            else {
                return;
            };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, cancelling run"),
                _ = sigint.recv() => info!("received SIGINT, cancelling run"),
            }
        }

        #[cfg(windows)]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("received Ctrl+C, cancelling run");
        }

        cancel.cancel();
    });
}
