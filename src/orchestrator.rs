//! Build pipeline across every configured database alias
//!
//! Introspection and generation run alias by alias in sorted order. Every
//! alias shares one app, so model names claimed by earlier aliases are
//! reserved for the later ones. Files are written once every alias has been
//! generated, then the migration and account bootstrap collaborators run.

use crate::codegen::admin::{
    render_admin_aggregator, render_admin_file, render_models_aggregator, render_router,
};
use crate::codegen::models::{build_model_file, InspectedTable, ModelFile};
use crate::codegen::{GeneratedFile, TemplateRenderer};
use crate::collaborators::{
    AccountBootstrap, BootstrapOutcome, ManagePy, ManagePyAccountBootstrap, ManagePyMigrator,
    MigrationApplier, SuperuserCredentials,
};
use crate::config::EzAdminConfig;
use crate::error::{Error, Result};
use crate::introspect::{self, inspect_table, sorted_tables, BackendKind, DatabaseIntrospector};
use crate::registry::ModelRegistry;
use crate::utils::backup::{BackupManager, BackupRecord};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Opens an introspector for a database URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn DatabaseIntrospector>>;
}

/// Connects through the sqlx-backed introspectors
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn DatabaseIntrospector>> {
        introspect::connect(url).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Render every file without writing or running collaborators
    pub dry_run: bool,
    pub skip_migrate: bool,
    pub skip_superuser: bool,
    /// Copy existing output directories aside before overwriting
    pub backup: bool,
}

#[derive(Debug, Clone)]
pub struct AliasReport {
    pub alias: String,
    pub backend: BackendKind,
    pub models: Vec<String>,
    pub skipped_tables: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub aliases: Vec<AliasReport>,
    /// Aliases left out because their backend cannot be introspected
    pub unsupported: Vec<(String, String)>,
    pub files: Vec<GeneratedFile>,
    pub backups: Vec<BackupRecord>,
    pub migrated: bool,
    pub superuser: Option<(SuperuserCredentials, BootstrapOutcome)>,
    pub router_path: String,
}

impl BuildReport {
    pub fn model_count(&self) -> usize {
        self.aliases.iter().map(|alias| alias.models.len()).sum()
    }
}

pub struct Orchestrator {
    project_dir: PathBuf,
    config: EzAdminConfig,
    renderer: TemplateRenderer,
    connector: Box<dyn Connector>,
    migrator: Box<dyn MigrationApplier>,
    bootstrap: Box<dyn AccountBootstrap>,
}

impl Orchestrator {
    /// Orchestrator wired to live databases and the project's `manage.py`
    pub fn new(project_dir: &Path, config: EzAdminConfig) -> Result<Self> {
        let manage_py = ManagePy::from_config(project_dir, &config);
        let migrator = ManagePyMigrator::new(manage_py.clone(), config.output.app_label.clone());
        let bootstrap = ManagePyAccountBootstrap::new(manage_py);

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            renderer: TemplateRenderer::new()?,
            connector: Box::new(SqlxConnector),
            migrator: Box::new(migrator),
            bootstrap: Box::new(bootstrap),
        })
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn with_migrator(mut self, migrator: impl MigrationApplier + 'static) -> Self {
        self.migrator = Box::new(migrator);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: impl AccountBootstrap + 'static) -> Self {
        self.bootstrap = Box::new(bootstrap);
        self
    }

    pub fn config(&self) -> &EzAdminConfig {
        &self.config
    }

    pub fn models_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.output.models_dir)
    }

    pub fn admin_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.output.admin_dir)
    }

    /// Inspect every table of one database in name order.
    ///
    /// A table whose columns cannot be read becomes [`InspectedTable::Failed`].
    pub async fn inspect_database(&self, introspector: &dyn DatabaseIntrospector) -> Result<Vec<InspectedTable>> {
        let tables = sorted_tables(introspector, self.config.output.include_views).await?;

        let mut inspected = Vec::with_capacity(tables.len());
        for table in &tables {
            match inspect_table(introspector, table).await {
                Ok(descriptor) => inspected.push(InspectedTable::Ready(descriptor)),
                Err(Error::TableInspection { table, message }) => {
                    log::warn!("Skipping table '{}': {}", table, message);
                    inspected.push(InspectedTable::Failed { table, reason: message });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(inspected)
    }

    /// Introspect one alias and build its model file.
    ///
    /// `reserved` holds model names already claimed by other aliases.
    pub async fn generate_alias(
        &self,
        alias: &str,
        url: &str,
        reserved: &BTreeSet<String>,
    ) -> Result<(BackendKind, ModelFile)> {
        let introspector = self.connector.connect(url).await?;
        let backend = introspector.backend();
        log::info!("Inspecting '{}' ({})", alias, backend.as_str());

        let tables = self.inspect_database(introspector.as_ref()).await?;
        let file = build_model_file(
            backend,
            alias,
            &self.config.output.app_label,
            &tables,
            reserved,
        );
        Ok((backend, file))
    }

    /// Render one alias's model file, as `inspectdb` would print it.
    pub async fn render_alias(&self, alias: &str, url: &str) -> Result<String> {
        let (_, file) = self.generate_alias(alias, url, &BTreeSet::new()).await?;
        file.render(&self.renderer)
    }

    /// Run the whole pipeline.
    pub async fn run(&self, options: BuildOptions) -> Result<BuildReport> {
        let models_dir = self.models_dir();
        let admin_dir = self.admin_dir();
        let models_module = self.config.models_module();

        let mut report = BuildReport::default();
        let mut registry = ModelRegistry::new();
        let mut model_files = Vec::new();

        for (alias, database) in &self.config.databases {
            let (backend, file) = match self
                .generate_alias(alias, &database.url, &registry.model_names())
                .await
            {
                Ok(generated) => generated,
                Err(e) if e.is_unsupported() => {
                    log::warn!("Skipping database '{}': {}", alias, e);
                    report.unsupported.push((alias.clone(), e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let content = file.render(&self.renderer)?;
            model_files.push(GeneratedFile::new(models_dir.join(format!("{}.py", alias)), content));

            let models = file.model_names();
            registry.register(alias, models.clone());
            report.aliases.push(AliasReport {
                alias: alias.clone(),
                backend,
                models,
                skipped_tables: file.skipped_tables(),
            });
        }

        if registry.is_empty() {
            return Err(Error::Config(
                "None of the configured databases could be introspected".to_string(),
            ));
        }

        report.files = model_files;
        for alias in registry.aliases() {
            let content = render_admin_file(&self.renderer, &registry, &alias, &models_module)?;
            report
                .files
                .push(GeneratedFile::new(admin_dir.join(format!("{}.py", alias)), content));
        }
        report.files.push(GeneratedFile::new(
            models_dir.join("__init__.py"),
            render_models_aggregator(&self.renderer, &registry)?,
        ));
        report.files.push(GeneratedFile::new(
            admin_dir.join("__init__.py"),
            render_admin_aggregator(&self.renderer, &registry)?,
        ));
        report.files.push(GeneratedFile::new(
            models_dir.join("routers.py"),
            render_router(&self.renderer, &registry, &models_module)?,
        ));
        report.router_path = crate::codegen::admin::router_path(&models_module);

        if options.dry_run {
            return Ok(report);
        }

        if options.backup {
            let backups = BackupManager::new(&self.project_dir)?;
            for (dir, kind) in [(&models_dir, "models"), (&admin_dir, "admin")] {
                if let Some(record) = backups.backup_directory(dir, kind)? {
                    report.backups.push(record);
                }
            }
        }

        for file in &report.files {
            file.write()?;
            log::debug!("Wrote {}", file.path.display());
        }

        if !options.skip_migrate {
            log::info!("Applying migrations");
            self.migrator.apply().await?;
            report.migrated = true;
        }

        if !options.skip_superuser {
            let credentials = SuperuserCredentials::resolve(&self.config);
            let outcome = self.bootstrap.ensure_account(&credentials).await?;
            report.superuser = Some((credentials, outcome));
        }

        Ok(report)
    }
}
