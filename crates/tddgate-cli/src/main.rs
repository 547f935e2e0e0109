mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, hook::HookEvent};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tddgate",
    about = "TDD guard: blocks implementation writes until a failing test exists",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .tddgate/ or .git/)
    #[arg(long, global = true, env = "TDDGATE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and register the host hooks
    Init {
        /// Skip registering hooks in .claude/settings.json
        #[arg(long)]
        no_hooks: bool,
    },

    /// Host hook entry points (read the hook event JSON from stdin)
    Hook {
        #[command(subcommand)]
        event: HookEvent,
    },

    /// Record a test run from a runner's report
    Report {
        /// Report format: jest-json or libtest (default: runner.format from config)
        #[arg(long)]
        format: Option<String>,
        /// Read the report from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
        /// Istanbul coverage-summary.json to attach
        #[arg(long)]
        coverage_summary: Option<PathBuf>,
    },

    /// Run the test suite with a timeout and record the result
    Run {
        /// Seconds before the run is killed and recorded as an error
        #[arg(long)]
        timeout: Option<u32>,
        /// Report format of the command's stdout (default: runner.format from config)
        #[arg(long)]
        format: Option<String>,
        /// Istanbul coverage-summary.json to attach after the run
        #[arg(long)]
        coverage_summary: Option<PathBuf>,
        /// Test command (default: runner.command from config)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show the latest recorded test run
    Status,

    /// Evaluate the write policy for a path without a host
    Check {
        /// File that would be written
        path: String,
    },

    /// Enable the guard
    On,

    /// Disable the guard (writes pass through)
    Off,

    /// Inspect and validate .tddgate/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // stdout carries the hook protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let explicit_root = cli.root.as_deref();
    // The hook resolves its root from the event's cwd, so resolution is lazy.
    let project_root = || root::resolve_root(explicit_root, None);

    let result = match cli.command {
        Commands::Init { no_hooks } => cmd::init::run(&project_root(), !no_hooks).map(|()| 0),
        Commands::Hook { event } => cmd::hook::run(explicit_root, event).map(|()| 0),
        Commands::Report {
            format,
            input,
            coverage_summary,
        } => cmd::report::report(
            &project_root(),
            format.as_deref(),
            input.as_deref(),
            coverage_summary.as_deref(),
            cli.json,
        )
        .map(|()| 0),
        Commands::Run {
            timeout,
            format,
            coverage_summary,
            command,
        } => cmd::report::run(
            &project_root(),
            &command,
            format.as_deref(),
            timeout,
            coverage_summary.as_deref(),
            cli.json,
        ),
        Commands::Status => cmd::status::run(&project_root(), cli.json).map(|()| 0),
        Commands::Check { path } => cmd::check::run(&project_root(), &path, cli.json),
        Commands::On => cmd::toggle::run(&project_root(), true).map(|()| 0),
        Commands::Off => cmd::toggle::run(&project_root(), false).map(|()| 0),
        Commands::Config { subcommand } => {
            cmd::config::run(&project_root(), subcommand, cli.json).map(|()| 0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
