//! Admin registration files, aggregators and the database router

use super::TemplateRenderer;
use crate::error::Result;
use crate::registry::ModelRegistry;
use serde::Serialize;

pub const ADMIN_TEMPLATE: &str = "admin.py.hbs";
pub const MODELS_INIT_TEMPLATE: &str = "models_init.py.hbs";
pub const ADMIN_INIT_TEMPLATE: &str = "admin_init.py.hbs";
pub const ROUTERS_TEMPLATE: &str = "routers.py.hbs";

#[derive(Serialize)]
struct AdminContext<'a> {
    alias: &'a str,
    models_module: &'a str,
    models: &'a [String],
}

#[derive(Serialize)]
struct AggregatorContext {
    aliases: Vec<String>,
}

#[derive(Serialize)]
struct RouterContext {
    router_path: String,
    aliases: Vec<String>,
}

/// Render the admin registration module of one alias.
///
/// Model names come from the registry, never from the running framework.
pub fn render_admin_file(
    renderer: &TemplateRenderer,
    registry: &ModelRegistry,
    alias: &str,
    models_module: &str,
) -> Result<String> {
    let context = AdminContext {
        alias,
        models_module,
        models: registry.models(alias),
    };
    renderer.render(ADMIN_TEMPLATE, &context)
}

/// `<models_dir>/__init__.py`, importing every registered alias.
pub fn render_models_aggregator(renderer: &TemplateRenderer, registry: &ModelRegistry) -> Result<String> {
    let context = AggregatorContext {
        aliases: registry.aliases(),
    };
    renderer.render(MODELS_INIT_TEMPLATE, &context)
}

/// `<admin_dir>/__init__.py`, importing every registered alias's admin module.
pub fn render_admin_aggregator(renderer: &TemplateRenderer, registry: &ModelRegistry) -> Result<String> {
    let context = AggregatorContext {
        aliases: registry.aliases(),
    };
    renderer.render(ADMIN_INIT_TEMPLATE, &context)
}

pub fn render_router(
    renderer: &TemplateRenderer,
    registry: &ModelRegistry,
    models_module: &str,
) -> Result<String> {
    let context = RouterContext {
        router_path: router_path(models_module),
        aliases: registry.aliases(),
    };
    renderer.render(ROUTERS_TEMPLATE, &context)
}

/// Dotted path for the `DATABASE_ROUTERS` setting
pub fn router_path(models_module: &str) -> String {
    format!("{}.routers.GeneratedModelRouter", models_module)
}
