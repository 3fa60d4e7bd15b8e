//! ezadmin: generate Django models and admin registrations from a live
//! database schema.
//!
//! The pipeline inspects every configured database alias, synthesizes one
//! model declaration per table, renders the model, admin, aggregator and
//! router modules, then hands over to `manage.py` for migrations and the
//! superuser account.

pub mod codegen;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod introspect;
pub mod orchestrator;
pub mod registry;
pub mod utils;

pub use config::EzAdminConfig;
pub use error::{Error, Result};
pub use orchestrator::{BuildOptions, BuildReport, Orchestrator};
pub use registry::ModelRegistry;
