//! Database introspection commands

use super::load_config;
use anyhow::Result;
use clap::{Args, Subcommand};
use ezadmin::introspect::{self, mask_database_url, sorted_tables};
use ezadmin::Orchestrator;
use std::path::Path;

#[derive(Debug, Args)]
pub struct DbCommand {
    #[command(subcommand)]
    pub action: DbAction,
}

#[derive(Debug, Subcommand)]
pub enum DbAction {
    /// Print the generated model file of one database to stdout
    Inspect {
        /// Database alias (defaults to `default` or the only one configured)
        #[arg(long)]
        database: Option<String>,
    },

    /// List the tables that would become models
    ListTables {
        /// Database alias (defaults to `default` or the only one configured)
        #[arg(long)]
        database: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Test database connection
    TestConnection {
        /// Database alias (defaults to `default` or the only one configured)
        #[arg(long)]
        database: Option<String>,
    },
}

impl DbCommand {
    pub async fn execute(self, project_path: &Path, config_file: Option<&Path>) -> Result<()> {
        match self.action {
            DbAction::Inspect { database } => {
                inspect(project_path, config_file, database.as_deref()).await
            }
            DbAction::ListTables { database, format } => {
                list_tables(project_path, config_file, database.as_deref(), &format).await
            }
            DbAction::TestConnection { database } => {
                test_connection(project_path, config_file, database.as_deref()).await
            }
        }
    }
}

async fn inspect(project_path: &Path, config_file: Option<&Path>, database: Option<&str>) -> Result<()> {
    let config = load_config(project_path, config_file)?;
    let (alias, database) = config.database(database)?;
    let (alias, url) = (alias.to_string(), database.url.clone());

    let orchestrator = Orchestrator::new(project_path, config)?;
    let rendered = orchestrator.render_alias(&alias, &url).await?;
    print!("{}", rendered);

    Ok(())
}

/// Test database connection
async fn test_connection(project_path: &Path, config_file: Option<&Path>, database: Option<&str>) -> Result<()> {
    println!("🔌 Testing database connection...");

    let config = load_config(project_path, config_file)?;
    let (alias, database) = config.database(database)?;

    println!("📍 Connecting to {}: {}", alias, mask_database_url(&database.url));

    let introspector = introspect::connect(&database.url).await?;
    let db_name = introspector.database_name().await?;

    println!("✅ Connection successful!");
    println!("📊 Database: {} ({})", db_name, introspector.backend().as_str());

    let tables = introspector.list_tables().await?;
    println!("📋 Tables found: {}", tables.len());

    Ok(())
}

/// List all tables in the database
async fn list_tables(
    project_path: &Path,
    config_file: Option<&Path>,
    database: Option<&str>,
    format: &str,
) -> Result<()> {
    let config = load_config(project_path, config_file)?;
    let (_, database) = config.database(database)?;

    let introspector = introspect::connect(&database.url).await?;
    let tables = sorted_tables(introspector.as_ref(), config.output.include_views).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }
        _ => {
            if tables.is_empty() {
                println!("No tables found in the database.");
            } else {
                println!("📋 Tables in database:\n");
                println!("{:<40} {:<10}", "Table Name", "Type");
                println!("{:-<50}", "");

                for table in tables {
                    let kind = if table.is_view { "VIEW" } else { "TABLE" };
                    println!("{:<40} {:<10}", table.name, kind);
                }
            }
        }
    }

    Ok(())
}
