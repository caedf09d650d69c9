use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "SQL gatekeeper for Postgres")]
struct Cli {
    /// Configuration file (defaults to $SQLGATE_CONFIG, then ./sqlgate.yaml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve,

    /// Show how a statement would be classified, without authorizing or running it.
    Explain {
        /// The SQL statement
        sql: String,
    },

    /// Load and validate the configuration file.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.cmd {
        Command::Serve => commands::serve::run(config).await?,
        Command::Explain { sql } => commands::explain::run(&sql, config)?,
        Command::CheckConfig => commands::check::run(config)?,
    }

    Ok(())
}
