use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ezadmin")]
#[command(about = "Generate Django models and admin registrations from an existing database")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to current directory)
    #[arg(short = 'P', long, global = true)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to <project>/ezadmin.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate models and admin files, migrate, and ensure the superuser exists
    Build(commands::build::BuildCommand),

    /// Database operations (connection test, table listing, inspection)
    Db(commands::db::DbCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let project_path = match cli.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config_file = cli.config.as_deref();

    match cli.command {
        Commands::Build(build_cmd) => build_cmd.execute(&project_path, config_file).await,
        Commands::Db(db_cmd) => db_cmd.execute(&project_path, config_file).await,
    }
}
