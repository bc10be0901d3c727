use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use etfwatch::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for etfwatch::AppCommand {
    fn from(cmd: Commands) -> etfwatch::AppCommand {
        match cmd {
            Commands::Run { dry_run } => etfwatch::AppCommand::Run { dry_run },
            Commands::BusinessDay => etfwatch::AppCommand::BusinessDay,
            Commands::Holdings { code, date } => etfwatch::AppCommand::Holdings { code, date },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Detect constituent changes, notify and write the dashboard
    Run {
        /// Print the alert instead of sending it and write no files
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the last business day with market data
    BusinessDay,
    /// Print the current constituents of one ETF
    Holdings {
        /// ETF ticker, e.g. 069500
        code: String,
        /// Look up holdings on or before this date (YYYYMMDD)
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(cli.config_path.as_deref()),
        Some(cmd) => etfwatch::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup(config_path: Option<&str>) -> Result<()> {
    let path = match config_path {
        Some(path) => etfwatch::cli::setup::setup_at_path(path)?,
        None => etfwatch::cli::setup::setup()?,
    };
    println!("Edit {} to choose the ETFs to track", path.display());
    Ok(())
}
