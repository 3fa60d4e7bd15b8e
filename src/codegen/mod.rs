//! Source generation: naming, type mapping, field synthesis and the
//! handlebars templates that turn model specs into Python modules.

pub mod admin;
pub mod fields;
pub mod models;
pub mod naming;
pub mod type_mapping;

use crate::error::{Error, Result};
use handlebars::Handlebars;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

const TEMPLATE_NAMES: &[&str] = &[
    models::MODELS_TEMPLATE,
    admin::ADMIN_TEMPLATE,
    admin::MODELS_INIT_TEMPLATE,
    admin::ADMIN_INIT_TEMPLATE,
    admin::ROUTERS_TEMPLATE,
];

/// Embedded templates, registered once per run
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Generated Python, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        for name in TEMPLATE_NAMES {
            let template = Templates::get(name)
                .ok_or_else(|| Error::Template(format!("Template {} not found", name)))?;
            let content = std::str::from_utf8(template.data.as_ref())
                .map_err(|e| Error::Template(format!("Template {} is not UTF-8: {}", name, e)))?;
            handlebars.register_template_string(name, content)?;
        }

        Ok(Self { handlebars })
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        Ok(self.handlebars.render(template, data)?)
    }
}

/// A file the build would write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Write the file, creating parent directories. Existing content is replaced.
    pub fn write(&self) -> Result<()> {
        write_file(&self.path, &self.content)
    }
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let to_error = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(to_error)?;
        }
    }
    fs::write(path, content).map_err(to_error)
}
