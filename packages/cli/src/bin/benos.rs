use anyhow::Context;
use benos_cli::{init_tracing, run_server, Config};
use benos_projects::DbState;
use clap::{Parser, Subcommand};
use colored::*;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

mod cli;

use cli::agents::{handle_agents_command, AgentsCommands};

#[derive(Parser)]
#[command(name = "benos")]
#[command(about = "Ben OS - areas, projects, boards, and agents in one place")]
#[command(version)]
struct Cli {
    /// SQLite database path (overrides BENOS_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind (overrides BENOS_HOST)
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind (overrides BENOS_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create or upgrade the database schema
    Migrate,
    /// Manage agent API keys
    #[command(subcommand)]
    Agents(AgentsCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                anyhow::ensure!(port != 0, "port must be between 1 and 65535");
                config.port = port;
            }
            run_server(config).await
        }
        Commands::Migrate => {
            // Opening the database applies pending migrations
            DbState::init_with_path(Some(config.db_path.clone())).await?;
            println!(
                "{} Database is up to date at {}",
                "✓".green().bold(),
                config.db_path.display()
            );
            Ok(())
        }
        Commands::Agents(command) => {
            let db = DbState::init_with_path(Some(config.db_path.clone())).await?;
            let handled = handle_agents_command(command, &db).await;
            db.flush_activity().await;
            handled
        }
    }
}
