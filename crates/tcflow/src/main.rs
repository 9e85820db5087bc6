mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tcflow")]
#[command(about = "Drive Tencent Cloud resources to a converged state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the partial update that turns one JSON document into another
    Patch {
        /// Document currently applied (as read back from the backend)
        #[arg(long)]
        old: PathBuf,
        /// Desired document
        #[arg(long)]
        new: PathBuf,
        /// Additional setting whose string values are compared as integers
        #[arg(long = "coerce", value_name = "KEY")]
        coerce: Vec<String>,
        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Show the effective provider configuration
    Config {
        /// Only print where the configuration was loaded from
        #[arg(long)]
        path: bool,
    },
    /// Inspect the local state file
    #[command(subcommand)]
    State(StateCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List managed resources
    List {
        /// Project directory holding .tcflow/
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show one resource by its `type:name` key
    Show {
        key: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Patch {
            old,
            new,
            coerce,
            compact,
        } => commands::patch::handle(&old, &new, &coerce, compact),
        Commands::Config { path } => commands::config::handle(path),
        Commands::State(StateCommands::List { dir }) => commands::state::handle_list(&dir).await,
        Commands::State(StateCommands::Show { key, dir }) => {
            commands::state::handle_show(&dir, &key).await
        }
        Commands::Version => {
            println!("tcflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
