mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "textmill",
    version,
    about = "Incremental AI document-processing pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a config file
    Run {
        /// Path to the pipeline config file
        config: PathBuf,
    },
    /// Write a template config file without running anything
    Init {
        /// Where to write the template (e.g. pipeline.yaml)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { config } => commands::run::execute(&config).await,
        Commands::Init { path } => commands::init::execute(&path),
    }
}
