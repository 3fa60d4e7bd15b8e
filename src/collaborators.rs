//! External collaborators reached through the project's `manage.py`
//!
//! Migration and account bootstrap both belong to the host framework; the
//! generator only invokes them and reports failures.

use crate::config::EzAdminConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

pub const GENERATED_PASSWORD_LENGTH: usize = 20;

const USERNAME_ENV: &str = "EZADMIN_BOOTSTRAP_USERNAME";
const EMAIL_ENV: &str = "EZADMIN_BOOTSTRAP_EMAIL";
const PASSWORD_ENV: &str = "EZADMIN_BOOTSTRAP_PASSWORD";

/// Prints `created` or `exists` as its last line
const BOOTSTRAP_SCRIPT: &str = r#"
import os
from django.contrib.auth import get_user_model

User = get_user_model()
username = os.environ['EZADMIN_BOOTSTRAP_USERNAME']
if User.objects.filter(**{User.USERNAME_FIELD: username}).exists():
    print('exists')
else:
    User.objects.create_superuser(
        username,
        os.environ['EZADMIN_BOOTSTRAP_EMAIL'],
        os.environ['EZADMIN_BOOTSTRAP_PASSWORD'],
    )
    print('created')
"#;

/// Synchronizes generated model declarations into the live database
#[async_trait]
pub trait MigrationApplier: Send + Sync {
    async fn apply(&self) -> Result<()>;
}

/// Ensures the administrative account exists
#[async_trait]
pub trait AccountBootstrap: Send + Sync {
    async fn ensure_account(&self, credentials: &SuperuserCredentials) -> Result<BootstrapOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SuperuserCredentials {
    pub username: String,
    pub email: String,
    pub password: String,
    /// The password was generated for this run and must be shown once
    pub generated: bool,
}

impl std::fmt::Debug for SuperuserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperuserCredentials")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("generated", &self.generated)
            .finish()
    }
}

impl SuperuserCredentials {
    /// Credentials from configuration; the password comes from
    /// `EZADMIN_SUPERUSER_PASSWORD` or is generated.
    pub fn resolve(config: &EzAdminConfig) -> Self {
        Self::with_password(config, env::var("EZADMIN_SUPERUSER_PASSWORD").ok())
    }

    pub fn with_password(config: &EzAdminConfig, password: Option<String>) -> Self {
        let (password, generated) = match password.filter(|p| !p.is_empty()) {
            Some(password) => (password, false),
            None => (generate_password(), true),
        };
        Self {
            username: config.superuser.username.clone(),
            email: config.superuser.email.clone(),
            password,
            generated,
        }
    }
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// `python manage.py ...` in the project directory
#[derive(Debug, Clone)]
pub struct ManagePy {
    python: String,
    manage_py: PathBuf,
    project_dir: PathBuf,
}

impl ManagePy {
    pub fn new(python: impl Into<String>, manage_py: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            manage_py: manage_py.into(),
            project_dir: project_dir.into(),
        }
    }

    pub fn from_config(project_dir: &Path, config: &EzAdminConfig) -> Self {
        Self::new(&config.django.python, &config.django.manage_py, project_dir)
    }

    pub fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.python.clone(), self.manage_py.display().to_string()];
        parts.extend(args.iter().map(|arg| arg.to_string()));
        parts.join(" ")
    }

    pub async fn run(&self, args: &[&str], envs: &[(&str, &str)]) -> std::io::Result<Output> {
        log::debug!("Running: {}", self.describe(args));

        let mut cmd = Command::new(&self.python);
        cmd.current_dir(&self.project_dir).arg(&self.manage_py).args(args);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        cmd.output().await
    }
}

/// Last non-empty line of a process stream
fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    if detail.is_empty() {
        last_line(&output.stdout)
    } else {
        detail.to_string()
    }
}

/// `makemigrations <app_label>` followed by `migrate`
pub struct ManagePyMigrator {
    manage_py: ManagePy,
    app_label: String,
}

impl ManagePyMigrator {
    pub fn new(manage_py: ManagePy, app_label: impl Into<String>) -> Self {
        Self {
            manage_py,
            app_label: app_label.into(),
        }
    }

    async fn step(&self, args: &[&str]) -> Result<()> {
        let command = self.manage_py.describe(args);
        let output = self
            .manage_py
            .run(args, &[])
            .await
            .map_err(|e| Error::Migration(format!("could not run `{}`: {}", command, e)))?;

        if !output.status.success() {
            return Err(Error::Migration(format!(
                "`{}` exited with {}: {}",
                command,
                output.status,
                failure_detail(&output)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationApplier for ManagePyMigrator {
    async fn apply(&self) -> Result<()> {
        self.step(&["makemigrations", self.app_label.as_str()]).await?;
        self.step(&["migrate"]).await
    }
}

/// Creates the superuser through `manage.py shell`, only when absent.
///
/// Credentials travel in the child's environment, never on its command line.
pub struct ManagePyAccountBootstrap {
    manage_py: ManagePy,
}

impl ManagePyAccountBootstrap {
    pub fn new(manage_py: ManagePy) -> Self {
        Self { manage_py }
    }
}

#[async_trait]
impl AccountBootstrap for ManagePyAccountBootstrap {
    async fn ensure_account(&self, credentials: &SuperuserCredentials) -> Result<BootstrapOutcome> {
        let envs = [
            (USERNAME_ENV, credentials.username.as_str()),
            (EMAIL_ENV, credentials.email.as_str()),
            (PASSWORD_ENV, credentials.password.as_str()),
        ];
        let output = self
            .manage_py
            .run(&["shell", "-c", BOOTSTRAP_SCRIPT], &envs)
            .await
            .map_err(|e| Error::AccountBootstrap(format!("could not run manage.py shell: {}", e)))?;

        if !output.status.success() {
            return Err(Error::AccountBootstrap(failure_detail(&output)));
        }

        parse_bootstrap_output(&output.stdout)
    }
}

fn parse_bootstrap_output(stdout: &[u8]) -> Result<BootstrapOutcome> {
    match last_line(stdout).as_str() {
        "created" => Ok(BootstrapOutcome::Created),
        "exists" => Ok(BootstrapOutcome::AlreadyExists),
        other => Err(Error::AccountBootstrap(format!(
            "unexpected output from manage.py shell: '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn test_credentials_prefer_supplied_password() {
        let config = EzAdminConfig::default();
        let supplied = SuperuserCredentials::with_password(&config, Some("s3cret".to_string()));
        assert_eq!(supplied.password, "s3cret");
        assert!(!supplied.generated);
        assert_eq!(supplied.username, "admin");

        let generated = SuperuserCredentials::with_password(&config, Some(String::new()));
        assert!(generated.generated);
        assert_eq!(generated.password.len(), GENERATED_PASSWORD_LENGTH);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let config = EzAdminConfig::default();
        let credentials = SuperuserCredentials::with_password(&config, Some("s3cret".to_string()));
        assert!(!format!("{:?}", credentials).contains("s3cret"));
    }

    #[test]
    fn test_parse_bootstrap_output() {
        assert_eq!(
            parse_bootstrap_output(b"6 objects imported automatically\ncreated\n").unwrap(),
            BootstrapOutcome::Created
        );
        assert_eq!(parse_bootstrap_output(b"exists\n\n").unwrap(), BootstrapOutcome::AlreadyExists);
        assert!(matches!(
            parse_bootstrap_output(b"Traceback"),
            Err(Error::AccountBootstrap(_))
        ));
    }

    #[test]
    fn test_describe_command() {
        let manage_py = ManagePy::new("python3", "manage.py", "/srv/site");
        assert_eq!(manage_py.describe(&["migrate"]), "python3 manage.py migrate");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_migration_error() {
        let dir = tempfile::tempdir().unwrap();
        let manage_py = ManagePy::new("ezadmin-no-such-python", "manage.py", dir.path());
        let migrator = ManagePyMigrator::new(manage_py, "core");

        match migrator.apply().await {
            Err(Error::Migration(message)) => assert!(message.contains("makemigrations core")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
