#![forbid(unsafe_code)]

mod cmd;
mod input;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use scrollback_core::config::resolve_config;
use std::env;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sb: render, diff and verify grouped chat timelines",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Day boundaries in minutes east of UTC (overrides `[grouping]`).
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Timeline",
        about = "Render a state file",
        long_about = "Group and fully render the messages in a state file.",
        after_help = "EXAMPLES:\n    # Outline of the rendered tree\n    sb render state.json\n\n    # Include node HTML\n    sb render state.json --html\n\n    # Emit machine-readable output\n    sb render state.json --json"
    )]
    Render(cmd::render::RenderArgs),

    #[command(
        next_help_heading = "Timeline",
        about = "Print the edit sequence between two state files",
        long_about = "Compute the insert/delete/replace ops that turn a tree rendered from OLD into one rendered from NEW.",
        after_help = "EXAMPLES:\n    # Human-readable op list\n    sb diff old.json new.json\n\n    # Ops as tagged JSON\n    sb diff old.json new.json --json"
    )]
    Diff(cmd::diff::DiffArgs),

    #[command(
        next_help_heading = "Timeline",
        about = "Verify that a diff reproduces a full render",
        long_about = "Apply the diff between OLD and NEW to a render of OLD and compare it with a full render of NEW.",
        after_help = "EXAMPLES:\n    # Exit status 1 on mismatch\n    sb check old.json new.json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Verification",
        about = "Run a deterministic simulation campaign",
        long_about = "Run seeded random histories through the reconciler and check every step.",
        after_help = "EXAMPLES:\n    # Campaign with the configured number of seeds\n    sb sim\n\n    # More seeds, longer runs\n    sb sim --seeds 500 --steps 100\n\n    # Replay one seed\n    sb sim --seed 17"
    )]
    Sim(cmd::sim::SimArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    sb completions bash\n\n    # Generate zsh completions\n    sb completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SCROLLBACK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "scrollback=debug,info"
        } else {
            "scrollback=info,warn"
        })
    });

    let format = env::var("SCROLLBACK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so stdout stays parseable.
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err((output, err)) => {
            debug!(error = ?err, "command failed");
            if render_error(output, &CliError::from_error(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), (OutputMode, anyhow::Error)> {
    let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };

    let project_root = env::current_dir().map_err(|e| (fallback, e.into()))?;
    let config = resolve_config(&project_root, cli.json).map_err(|e| {
        (
            fallback,
            e.context(scrollback_core::error::ErrorCode::ConfigParseError),
        )
    })?;
    let output = OutputMode::from_resolved(&config.resolved_output);

    let mut grouping = config.project.grouping.clone();
    if let Some(minutes) = cli.utc_offset {
        grouping.utc_offset_minutes = minutes;
    }
    let grouper = grouping.grouper();
    debug!(offset = %grouper.offset(), ?output, "configuration resolved");

    let result = match &cli.command {
        Commands::Render(args) => cmd::render::run_render(args, &grouper, output),
        Commands::Diff(args) => cmd::diff::run_diff(args, &grouper, output),
        Commands::Check(args) => cmd::check::run_check(args, &grouper, output),
        Commands::Sim(args) => cmd::sim::run_sim(
            args,
            &config.project.sim,
            grouping.utc_offset_minutes,
            output,
        ),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    result.map_err(|e| (output, e))
}
