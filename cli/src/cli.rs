use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cmdbridge")]
#[command(version)]
#[command(about = "Serve a command registry over a local socket")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to settings file (TOML)
    #[arg(
        short,
        long,
        global = true,
        env = "CMDBRIDGE_SETTINGS",
        default_value = "cmdbridge.toml"
    )]
    pub settings: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen on the socket and serve registry requests
    Serve(ServeArgs),

    /// Show or change persisted settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Socket path for this run (overrides the settings file)
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Commands file (TOML) defining the registry
    #[arg(short, long)]
    pub commands: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Persist a new socket path
    SetSocket {
        /// Path of the Unix socket to bind to
        path: PathBuf,
    },
}
