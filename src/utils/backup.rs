use crate::error::{Error, Result};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const STATE_DIR: &str = ".ezadmin";

/// A completed backup of one output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub kind: String,
    pub timestamp: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub size: u64,
}

pub struct BackupManager {
    state_dir: PathBuf,
}

impl BackupManager {
    /// Backups live under `<project>/.ezadmin/backups`
    pub fn new(project_root: &Path) -> Result<Self> {
        let state_dir = project_root.join(STATE_DIR);

        if !state_dir.exists() {
            fs::create_dir_all(&state_dir)?;
            Self::create_readme(&state_dir)?;
        }

        Ok(Self { state_dir })
    }

    /// Copy a generated directory aside before it is overwritten.
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn backup_directory(&self, source: &Path, kind: &str) -> Result<Option<BackupRecord>> {
        if !source.is_dir() || fs::read_dir(source)?.next().is_none() {
            log::debug!("No existing {} output to back up", kind);
            return Ok(None);
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
        let backup_base = self.state_dir.join("backups").join(kind);
        let backup_path = backup_base.join(&timestamp);

        fs::create_dir_all(&backup_path)?;

        let file_count = copy_dir_recursive(source, &backup_path)?;
        let size = calculate_dir_size(&backup_path)?;

        let latest_link = backup_base.join("latest");
        if latest_link.exists() || latest_link.is_symlink() {
            fs::remove_file(&latest_link).ok();
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            symlink(&backup_path, &latest_link).ok();
        }

        log::info!(
            "Backed up {} ({} files, {}) to {}",
            source.display(),
            file_count,
            format_size(size),
            backup_path.display()
        );

        Ok(Some(BackupRecord {
            kind: kind.to_string(),
            timestamp,
            path: backup_path,
            file_count,
            size,
        }))
    }

    fn create_readme(state_dir: &Path) -> Result<()> {
        let content = r#"# ezadmin backups

`ezadmin build --backup` copies the generated models and admin directories
here before rewriting them, one timestamped directory per run.

Backups are never restored automatically. To restore by hand:

```bash
ls -la .ezadmin/backups/models/[timestamp]/
cp -r .ezadmin/backups/models/[timestamp]/* core/models/
cp -r .ezadmin/backups/admin/[timestamp]/* core/admin/
```

The `latest` symlink points at the most recent backup of each kind.
Delete old backups manually when no longer needed.
"#;
        fs::write(state_dir.join("README.md"), content)?;
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<usize> {
    let mut file_count = 0;

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        let relative = path
            .strip_prefix(src)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, target)?;
            file_count += 1;
        }
    }

    Ok(file_count)
}

fn calculate_dir_size(path: &Path) -> Result<u64> {
    let mut total_size = 0;

    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(io::Error::from)?;
            total_size += metadata.len();
        }
    }

    Ok(total_size)
}

pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
