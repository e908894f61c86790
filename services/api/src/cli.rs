use crate::demo::{run_demo, run_roster_check, DemoArgs, RosterCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use pace::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Pace Application Workflow",
    about = "Run and demonstrate the Pace application workflow service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work with staff roster exports
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
    /// Walk through application creation, assignment, and status logging
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Validate a roster CSV and list managers per university
    Check(RosterCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Staff roster CSV to load at startup (overrides PACE_ROSTER_PATH)
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Seed demo universities, courses, students, and statuses
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster {
            command: RosterCommand::Check(args),
        } => run_roster_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
