// ABOUTME: CLI commands for managing agent API keys
// ABOUTME: Create, list, revoke, and rotate agents directly against the database

use anyhow::Result;
use benos_core::Actor;
use benos_projects::DbState;
use benos_security::{Agent, AgentCreateInput, AgentWithKey};
use clap::Subcommand;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

#[derive(Subcommand)]
pub enum AgentsCommands {
    /// Create an agent and print its API key once
    Create {
        /// Agent name
        #[arg(short, long)]
        name: String,
        /// Capability such as `tasks:write`, `projects:*`, or `*` (repeatable)
        #[arg(short, long = "capability", required = true)]
        capabilities: Vec<String>,
        /// What the agent is for
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all agents
    List,
    /// Deactivate an agent so its key stops working
    Revoke {
        /// Agent ID
        id: String,
    },
    /// Issue a new key, invalidating the old one
    Rotate {
        /// Agent ID
        id: String,
    },
}

pub async fn handle_agents_command(command: AgentsCommands, db: &DbState) -> Result<()> {
    let actor = Actor::local_user();
    match command {
        AgentsCommands::Create {
            name,
            capabilities,
            description,
        } => {
            let created = db
                .agent_storage
                .create(
                    AgentCreateInput {
                        name,
                        description,
                        capabilities,
                    },
                    &actor,
                )
                .await?;
            print_issued_key("Agent created", &created);
        }
        AgentsCommands::List => list_agents(db).await?,
        AgentsCommands::Revoke { id } => {
            let agent = db.agent_storage.revoke(&id, &actor).await?;
            println!(
                "{} Revoked agent {} ({})",
                "✓".green().bold(),
                agent.name.bold(),
                agent.id.dimmed()
            );
        }
        AgentsCommands::Rotate { id } => {
            let rotated = db.agent_storage.rotate_key(&id, &actor).await?;
            print_issued_key("Key rotated", &rotated);
        }
    }
    Ok(())
}

async fn list_agents(db: &DbState) -> Result<()> {
    let agents = db.agent_storage.list().await?;

    if agents.is_empty() {
        println!("{}", "No agents found".yellow());
        println!(
            "{}",
            "Use 'benos agents create --name <name> --capability <cap>' to add one".dimmed()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        "ID",
        "Name",
        "Key prefix",
        "Capabilities",
        "Status",
        "Last used",
    ]);

    for agent in &agents {
        table.add_row(agent_row(agent));
    }

    println!("{table}");
    Ok(())
}

fn agent_row(agent: &Agent) -> Vec<String> {
    let capabilities = agent
        .capabilities
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let status = if agent.is_active { "active" } else { "revoked" };
    let last_used = agent
        .last_used_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());

    vec![
        agent.id.clone(),
        agent.name.clone(),
        agent.key_prefix.clone(),
        capabilities,
        status.to_string(),
        last_used,
    ]
}

fn print_issued_key(headline: &str, issued: &AgentWithKey) {
    println!(
        "{} {}: {} ({})",
        "✓".green().bold(),
        headline,
        issued.agent.name.bold(),
        issued.agent.id.dimmed()
    );
    println!();
    println!("  {}", issued.api_key.cyan().bold());
    println!();
    println!(
        "{}",
        "This key is shown only once. Store it somewhere safe.".yellow()
    );
}
