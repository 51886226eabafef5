//! ulbind - drive the binding layer from the command line
//!
//! Replays scripted page events against the headless engine and explains
//! diagnostic codes.

mod commands;
mod scenario;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

/// Binding layer for an embedded HTML renderer
#[derive(Parser, Debug)]
#[command(name = "ulbind")]
#[command(author, version, about = "Replay page events through the ulbind binding layer")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// Unstyled text, one line per diagnostic
    Plain,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario file against the headless engine
    Replay(commands::replay::ReplayArgs),

    /// Explain a diagnostic code
    Explain(commands::explain::ExplainArgs),
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // Determine if colors should be used
    let use_color = !cli.no_color && !cli.quiet && atty::is(atty::Stream::Stdout);

    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Replay(args) => commands::replay::run(args, cli.format, use_color, cli.quiet),
        Commands::Explain(args) => commands::explain::run(args, cli.format, use_color),
    }
}
