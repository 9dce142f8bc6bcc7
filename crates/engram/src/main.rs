//! Engram CLI: serve the tool protocol, run migrations, administer
//! projects.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engram_db::{DbConfig, EngramDb};
use engram_logging::{init_logging, LogConfig};
use engram_mcp::{McpServer, McpServerConfig, ServerState};
use engram_protocol::{AccessLevel, RolloutPhase};
use engram_search::{EmbeddingConfig, EmbeddingGateway, HybridSearch};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "engram", version, about = "Cognitive-memory tool server")]
struct Cli {
    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the knobs file (defaults to ./engram.yaml, then ~/.engram/engram.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tool protocol on stdio
    Serve {
        /// Initial project context
        #[arg(long, env = "ENGRAM_PROJECT")]
        project: Option<String>,
    },
    /// Apply pending schema migrations
    Migrate,
    /// Print counts of all memory classes
    Stats {
        /// Project context for the counts
        #[arg(long, env = "ENGRAM_PROJECT")]
        project: Option<String>,
    },
    /// Project administration
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Register a project (idempotent)
    Register {
        project_id: String,
        #[arg(long)]
        name: String,
        /// Access tier: super, shared, or isolated
        #[arg(long, default_value = "isolated")]
        level: String,
    },
    /// Grant one project read access to another
    Grant { reader: String, target: String },
    /// Set a project's access-control rollout phase
    Phase {
        project_id: String,
        /// pending, shadow, or enforcing
        phase: String,
        /// Leave the phase recorded but disabled
        #[arg(long)]
        disable: bool,
    },
    /// List registered projects
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "engram",
        verbose: cli.verbose,
    })?;

    let knobs = config::Knobs::load(cli.config.as_ref())?;
    let db_config = config::db_config(&knobs)?;

    match cli.command {
        Command::Serve { project } => serve(db_config, project).await,
        Command::Migrate => migrate(db_config).await,
        Command::Stats { project } => stats(db_config, project).await,
        Command::Project { command } => project_admin(db_config, command).await,
    }
}

async fn serve(db_config: DbConfig, project: Option<String>) -> Result<()> {
    let db = EngramDb::connect(db_config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Migration failed")?;

    let gateway = EmbeddingGateway::from_config(EmbeddingConfig::from_env());
    let search = HybridSearch::new(gateway);

    let server_config = McpServerConfig {
        initial_project: project.or_else(|| McpServerConfig::default().initial_project),
        ..McpServerConfig::default()
    };
    let initial = server_config.initial_project.clone();
    let server = McpServer::new(server_config, ServerState::new(db, search, initial));
    server.run().await
}

async fn migrate(db_config: DbConfig) -> Result<()> {
    let db = EngramDb::connect(db_config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Migration failed")?;
    info!("migrations applied");
    Ok(())
}

async fn stats(db_config: DbConfig, project: Option<String>) -> Result<()> {
    let db = EngramDb::connect(db_config)
        .await
        .context("Failed to connect to database")?;
    let session = db.session(project.as_deref()).await?;
    let counts = session.count_by_type().await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

async fn project_admin(db_config: DbConfig, command: ProjectCommand) -> Result<()> {
    let db = EngramDb::connect(db_config)
        .await
        .context("Failed to connect to database")?;

    match command {
        ProjectCommand::Register {
            project_id,
            name,
            level,
        } => {
            let level = AccessLevel::parse(&level)
                .with_context(|| format!("Unknown access level: {}", level))?;
            let row = db.register_project(&project_id, &name, level).await?;
            println!("registered {} ({})", row.project_id, row.access_level);
        }
        ProjectCommand::Grant { reader, target } => {
            db.grant_project_read(&reader, &target).await?;
            println!("granted {} read access to {}", reader, target);
        }
        ProjectCommand::Phase {
            project_id,
            phase,
            disable,
        } => {
            let phase = RolloutPhase::parse(&phase)
                .with_context(|| format!("Unknown rollout phase: {}", phase))?;
            db.set_rollout_phase(&project_id, phase, !disable).await?;
            println!("{} -> {}{}", project_id, phase, if disable { " (disabled)" } else { "" });
        }
        ProjectCommand::List => {
            for project in db.list_projects().await? {
                println!("{}\t{}\t{}", project.project_id, project.access_level, project.name);
            }
        }
    }
    Ok(())
}
