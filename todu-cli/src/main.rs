//! todu: background task sync daemon.
//!
//! # Usage
//!
//! ```text
//! todu daemon start                 # foreground loop (what the service runs)
//! todu daemon stop
//! todu daemon status [--json]
//! todu daemon install | uninstall | restart
//! todu daemon logs [--lines N]
//! ```

mod commands;
mod engine;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::daemon::DaemonCommand;

#[derive(Parser, Debug)]
#[command(
    name = "todu",
    version,
    about = "Keep tasks in sync with external trackers in the background",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run and manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
