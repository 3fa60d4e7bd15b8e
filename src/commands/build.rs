//! `ezadmin build`: the full generation pipeline

use super::load_config;
use anyhow::{Context, Result};
use clap::Args;
use ezadmin::collaborators::BootstrapOutcome;
use ezadmin::{BuildOptions, BuildReport, Orchestrator};
use std::path::Path;

#[derive(Debug, Args)]
pub struct BuildCommand {
    /// Print the files that would be written without touching the project
    #[arg(long)]
    dry_run: bool,

    /// Do not run makemigrations/migrate
    #[arg(long)]
    skip_migrate: bool,

    /// Do not create the superuser account
    #[arg(long)]
    skip_superuser: bool,

    /// Back up existing output directories to .ezadmin/backups first
    #[arg(long)]
    backup: bool,
}

impl BuildCommand {
    pub async fn execute(self, project_path: &Path, config_file: Option<&Path>) -> Result<()> {
        let config = load_config(project_path, config_file)?;
        let orchestrator = Orchestrator::new(project_path, config)?;

        let options = BuildOptions {
            dry_run: self.dry_run,
            skip_migrate: self.skip_migrate,
            skip_superuser: self.skip_superuser,
            backup: self.backup,
        };

        println!("🔍 Inspecting {} database(s)...", orchestrator.config().databases.len());
        let report = orchestrator
            .run(options)
            .await
            .context("Admin panel build failed")?;

        if self.dry_run {
            print_dry_run(project_path, &report);
        } else {
            print_summary(project_path, &report);
        }

        Ok(())
    }
}

fn display_path(project_path: &Path, path: &Path) -> String {
    path.strip_prefix(project_path)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn print_aliases(report: &BuildReport) {
    for alias in &report.aliases {
        println!(
            "   {} ({}): {} model(s)",
            alias.alias,
            alias.backend.as_str(),
            alias.models.len()
        );
        for table in &alias.skipped_tables {
            println!("   ⚠️  Table '{}' could not be inspected; see the comment in the model file", table);
        }
    }
    for (alias, reason) in &report.unsupported {
        println!("   ⚠️  {} skipped: {}", alias, reason);
    }
}

fn print_dry_run(project_path: &Path, report: &BuildReport) {
    print_aliases(report);
    println!();
    for file in &report.files {
        println!("# ---- {} ----", display_path(project_path, &file.path));
        println!("{}", file.content);
    }
    println!("📝 Dry run: {} file(s) not written", report.files.len());
}

fn print_summary(project_path: &Path, report: &BuildReport) {
    print_aliases(report);
    println!();

    for record in &report.backups {
        println!(
            "📦 Backed up {} to .ezadmin/backups/{}/{}/",
            record.kind, record.kind, record.timestamp
        );
    }

    for file in &report.files {
        println!("✅ Wrote {}", display_path(project_path, &file.path));
    }
    println!("📊 {} model(s) generated", report.model_count());

    if report.migrated {
        println!("✅ Migrations applied");
    }

    if let Some((credentials, outcome)) = &report.superuser {
        match outcome {
            BootstrapOutcome::Created => {
                println!("✅ Superuser '{}' created", credentials.username);
                if credentials.generated {
                    println!("🔑 Password: {}", credentials.password);
                    println!("⚠️  This password is shown only once. Change it after signing in.");
                }
            }
            BootstrapOutcome::AlreadyExists => {
                println!("ℹ️  Superuser '{}' already exists, left unchanged", credentials.username);
            }
        }
    }

    println!("\n📝 Next steps:");
    println!("   - Add DATABASE_ROUTERS = ['{}'] to your settings", report.router_path);
    println!("   - Run: python manage.py runserver");
    println!("   - Open http://127.0.0.1:8000/admin/");
}
