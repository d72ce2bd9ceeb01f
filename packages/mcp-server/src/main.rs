use anyhow::{Context, Result};
use benos_projects::DbState;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod context;
mod mcp;
mod tools;

#[cfg(test)]
mod tests;

use context::ToolContext;

#[derive(Parser)]
#[command(name = "benos-mcp")]
#[command(about = "Ben OS MCP Server - expose areas, projects, boards, and tasks to agents")]
#[command(version)]
struct Cli {
    /// SQLite database path (overrides BENOS_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, help = "Display available tools and exit")]
    tools: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries JSON-RPC, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("benos=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.tools {
        println!("Available tools:");
        for tool in tools::tools_list().tools {
            println!("- {}: {}", tool.name, tool.description.unwrap_or_default());
        }
        return Ok(());
    }

    let db_path = cli
        .db
        .or_else(|| std::env::var_os("BENOS_DB_PATH").map(PathBuf::from))
        .filter(|p| !p.as_os_str().is_empty());
    let db = DbState::init_with_path(db_path)
        .await
        .context("failed to open the Ben OS database")?;

    let context = match std::env::var("BENOS_AGENT_KEY") {
        Ok(key) if !key.trim().is_empty() => ToolContext::with_agent_key(db, key.trim()).await?,
        _ => {
            info!("No BENOS_AGENT_KEY set, acting as the local user");
            ToolContext::new(db)
        }
    };

    let served = serve_stdio(&context).await;
    context.db().flush_activity().await;
    served
}

async fn serve_stdio(context: &ToolContext) -> Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    info!("MCP server ready on stdio");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        debug!("Received: {}", line);
        if let Some(response) = mcp::handle_line(context, &line).await {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
