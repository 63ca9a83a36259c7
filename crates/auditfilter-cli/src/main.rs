#![forbid(unsafe_code)]

mod cmd;
mod output;

use auditfilter_core::config::{self, CliOverrides};
use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "afctl: manage audit log filters and user assignments",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./auditfilter.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Filter store database, overriding config and AUDITFILTER_STORE.
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config: self.config.clone(),
            store: self.store.clone(),
            json: self.json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Definitions",
        about = "Check a filter definition",
        long_about = "Check that a definition is JSON with a top-level filter object and \
                      that every condition uses exactly one of and, or, not, field.",
        after_help = "EXAMPLES:\n    afctl validate conn.json\n    cat conn.json | afctl validate -"
    )]
    Validate(cmd::definition::DefinitionArgs),

    #[command(
        next_help_heading = "Definitions",
        about = "Print the canonical form of a definition",
        after_help = "EXAMPLES:\n    afctl canonicalize conn.json"
    )]
    Canonicalize(cmd::definition::DefinitionArgs),

    #[command(next_help_heading = "Store", about = "Manage audit log filters")]
    Filter {
        #[command(subcommand)]
        command: cmd::filter::FilterCommand,
    },

    #[command(next_help_heading = "Store", about = "Manage user assignments")]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("AUDITFILTER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "auditfilter=debug,afctl=debug,info"
        } else {
            "auditfilter=info,afctl=info,warn"
        })
    });

    let format = env::var("AUDITFILTER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

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

fn dispatch(command: &Commands, ctx: &cmd::Context) -> anyhow::Result<()> {
    match command {
        Commands::Validate(args) => cmd::definition::run_validate(args, ctx),
        Commands::Canonicalize(args) => cmd::definition::run_canonicalize(args, ctx),
        Commands::Filter { command } => cmd::filter::run(command, ctx),
        Commands::User { command } => cmd::user::run(command, ctx),
    }
}

fn fail(mode: OutputMode, err: &anyhow::Error) -> ExitCode {
    tracing::debug!(error = ?err, "command failed");
    if render_error(mode, &CliError::from(err)).is_err() {
        eprintln!("error: {err:#}");
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let early_mode = if cli.json { OutputMode::Json } else { OutputMode::Text };

    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => return fail(early_mode, &err.into()),
    };
    let ctx = match config::resolve_config(&cwd, &cli.overrides()) {
        Ok(effective) => {
            if let Some(source) = &effective.source {
                tracing::debug!(path = %source.display(), "loaded config");
            }
            cmd::Context::from(effective)
        }
        Err(err) => return fail(early_mode, &err),
    };

    match dispatch(&cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(ctx.output, &err),
    }
}
