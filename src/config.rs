//! `ezadmin.toml` configuration with environment overrides

use crate::codegen::naming::is_python_keyword;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "ezadmin.toml";

/// Alias used for `DATABASE_URL`
pub const DEFAULT_ALIAS: &str = "default";

/// Module names the build writes next to the per-alias modules
const RESERVED_MODULES: &[&str] = &["__init__", "routers"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EzAdminConfig {
    #[serde(default)]
    pub output: OutputConfig,

    /// Database aliases, iterated in alias order
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    #[serde(default)]
    pub django: DjangoConfig,

    #[serde(default)]
    pub superuser: SuperuserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_admin_dir")]
    pub admin_dir: PathBuf,

    #[serde(default = "default_app_label")]
    pub app_label: String,

    #[serde(default)]
    pub include_views: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            admin_dir: default_admin_dir(),
            app_label: default_app_label(),
            include_views: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DjangoConfig {
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_manage_py")]
    pub manage_py: PathBuf,
}

impl Default for DjangoConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            manage_py: default_manage_py(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperuserConfig {
    #[serde(default = "default_superuser_username")]
    pub username: String,

    #[serde(default = "default_superuser_email")]
    pub email: String,
}

impl Default for SuperuserConfig {
    fn default() -> Self {
        Self {
            username: default_superuser_username(),
            email: default_superuser_email(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("core/models")
}

fn default_admin_dir() -> PathBuf {
    PathBuf::from("core/admin")
}

fn default_app_label() -> String {
    "core".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_manage_py() -> PathBuf {
    PathBuf::from("manage.py")
}

fn default_superuser_username() -> String {
    "admin".to_string()
}

fn default_superuser_email() -> String {
    "admin@example.com".to_string()
}

impl EzAdminConfig {
    /// Load configuration for a project.
    ///
    /// Uses `explicit` when given, otherwise `<project>/ezadmin.toml` if it
    /// exists, otherwise defaults. Environment overrides are applied last.
    pub fn load(project_path: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config_file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = project_path.join(CONFIG_FILE_NAME);
                candidate.exists().then_some(candidate)
            }
        };

        let mut config = match config_file {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}. Make sure the file exists and is readable.",
                path_ref.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}. Check TOML syntax.",
                path_ref.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("{}. Check TOML syntax.", e)))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.databases
                    .insert(DEFAULT_ALIAS.to_string(), DatabaseConfig { url });
            }
        }

        if let Ok(dir) = env::var("EZADMIN_MODELS_DIR") {
            self.output.models_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("EZADMIN_ADMIN_DIR") {
            self.output.admin_dir = PathBuf::from(dir);
        }
        if let Ok(label) = env::var("EZADMIN_APP_LABEL") {
            self.output.app_label = label;
        }
        if let Ok(include) = env::var("EZADMIN_INCLUDE_VIEWS") {
            self.output.include_views = include
                .parse()
                .map_err(|_| Error::Config("Invalid EZADMIN_INCLUDE_VIEWS value".to_string()))?;
        }

        if let Ok(python) = env::var("EZADMIN_PYTHON") {
            self.django.python = python;
        }
        if let Ok(manage_py) = env::var("EZADMIN_MANAGE_PY") {
            self.django.manage_py = PathBuf::from(manage_py);
        }

        if let Ok(username) = env::var("EZADMIN_SUPERUSER_USERNAME") {
            self.superuser.username = username;
        }
        if let Ok(email) = env::var("EZADMIN_SUPERUSER_EMAIL") {
            self.superuser.email = email;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.databases.is_empty() {
            return Err(Error::Config(
                "No database configured. Set DATABASE_URL or add [databases.<alias>] to ezadmin.toml"
                    .to_string(),
            ));
        }

        for (alias, database) in &self.databases {
            if !is_python_module_name(alias) {
                return Err(Error::Config(format!(
                    "Database alias '{}' is not a valid Python module name",
                    alias
                )));
            }
            if RESERVED_MODULES.contains(&alias.as_str()) {
                return Err(Error::Config(format!(
                    "Database alias '{}' clashes with a generated module; pick another alias",
                    alias
                )));
            }
            if database.url.trim().is_empty() {
                return Err(Error::Config(format!("Database '{}' has an empty url", alias)));
            }
        }

        if !is_python_module_name(&self.output.app_label) {
            return Err(Error::Config(format!(
                "app_label '{}' is not a valid Python identifier",
                self.output.app_label
            )));
        }

        if self.superuser.username.trim().is_empty() {
            return Err(Error::Config("Superuser username must not be empty".to_string()));
        }

        Ok(())
    }

    /// Look up one alias, or the only/`default` alias when none is given.
    pub fn database(&self, alias: Option<&str>) -> Result<(&str, &DatabaseConfig)> {
        let alias = match alias {
            Some(alias) => alias,
            None if self.databases.contains_key(DEFAULT_ALIAS) => DEFAULT_ALIAS,
            None if self.databases.len() == 1 => self
                .databases
                .keys()
                .next()
                .map(String::as_str)
                .unwrap_or(DEFAULT_ALIAS),
            None => {
                return Err(Error::Config(format!(
                    "Several databases configured ({}); pick one with --database",
                    self.databases.keys().cloned().collect::<Vec<_>>().join(", ")
                )))
            }
        };

        self.databases
            .get_key_value(alias)
            .map(|(name, database)| (name.as_str(), database))
            .ok_or_else(|| Error::Config(format!("Unknown database alias '{}'", alias)))
    }

    /// Dotted Python path of the models package, e.g. `core.models`.
    pub fn models_module(&self) -> String {
        python_module_path(&self.output.models_dir)
    }
}

/// Convert a relative directory into a dotted Python package path.
pub fn python_module_path(dir: &Path) -> String {
    dir.components()
        .filter_map(|component| match component {
            std::path::Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_python_module_name(name: &str) -> bool {
    if is_python_keyword(name) {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
