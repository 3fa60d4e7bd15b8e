pub mod build;
pub mod db;

use anyhow::Result;
use ezadmin::EzAdminConfig;
use std::path::Path;

/// Load the project configuration, honouring `--config`.
pub fn load_config(project_path: &Path, config_file: Option<&Path>) -> Result<EzAdminConfig> {
    Ok(EzAdminConfig::load(project_path, config_file)?)
}
