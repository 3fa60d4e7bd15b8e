use std::path::PathBuf;
use thiserror::Error;

/// Generator errors
///
/// Per-table and per-facet failures are absorbed by the introspection layer;
/// everything that reaches the orchestrator as an `Err` ends the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Unable to inspect table '{table}': {message}")]
    TableInspection { table: String, message: String },

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Superuser bootstrap failed: {0}. Create the account manually with `python manage.py createsuperuser`.")]
    AccountBootstrap(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A metadata facet the backend cannot provide.
    pub fn unsupported(backend: &str, facet: &str) -> Self {
        Error::UnsupportedBackend(format!("{} does not support {} introspection", backend, facet))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedBackend(_))
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(err: handlebars::RenderError) -> Self {
        Error::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for Error {
    fn from(err: handlebars::TemplateError) -> Self {
        Error::Template(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
