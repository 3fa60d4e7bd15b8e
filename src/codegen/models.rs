//! Model file assembly for one database alias

use super::fields::{synthesize_fields, FieldSpec, SynthesisContext};
use super::naming::table_to_model_name;
use super::type_mapping::python_string;
use super::TemplateRenderer;
use crate::error::Result;
use crate::introspect::{BackendKind, TableDescriptor};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const MODELS_TEMPLATE: &str = "models.py.hbs";

/// Outcome of inspecting one table
#[derive(Debug, Clone)]
pub enum InspectedTable {
    Ready(TableDescriptor),
    Failed { table: String, reason: String },
}

/// One generated model declaration
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub table: String,
    pub name: String,
    /// Name the table would have had, when that one was already taken
    pub renamed_from: Option<String>,
    pub alias: String,
    pub app_label: String,
    pub is_view: bool,
    pub fields: Vec<FieldSpec>,
    /// Attribute names of each multi-column unique constraint
    pub unique_together: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum ModelEntry {
    Model(ModelSpec),
    /// Table whose columns could not be read; rendered as a comment
    Skipped { table: String, reason: String },
}

impl ModelEntry {
    pub fn model(&self) -> Option<&ModelSpec> {
        match self {
            ModelEntry::Model(spec) => Some(spec),
            ModelEntry::Skipped { .. } => None,
        }
    }
}

/// All model declarations of one alias, in table order
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub alias: String,
    pub entries: Vec<ModelEntry>,
}

impl ModelFile {
    pub fn models(&self) -> impl Iterator<Item = &ModelSpec> {
        self.entries.iter().filter_map(ModelEntry::model)
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models().map(|model| model.name.clone()).collect()
    }

    pub fn skipped_tables(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ModelEntry::Skipped { table, .. } => Some(table.clone()),
                ModelEntry::Model(_) => None,
            })
            .collect()
    }

    pub fn render(&self, renderer: &TemplateRenderer) -> Result<String> {
        let context = ModelFileContext {
            alias: self.alias.clone(),
            models: self.entries.iter().map(ModelContext::from_entry).collect(),
        };
        renderer.render(MODELS_TEMPLATE, &context)
    }
}

/// Build model specs for every inspected table of one alias.
///
/// `tables` must already be in the order the models are declared; a relation
/// to a model declared earlier is a direct reference, anything else is a
/// forward reference by name. `reserved` holds the model names other aliases
/// already claimed in the same app.
pub fn build_model_file(
    backend: BackendKind,
    alias: &str,
    app_label: &str,
    tables: &[InspectedTable],
    reserved: &BTreeSet<String>,
) -> ModelFile {
    let primary_keys: BTreeMap<String, String> = tables
        .iter()
        .filter_map(|table| match table {
            InspectedTable::Ready(table) => table
                .primary_key()
                .map(|pk| (table.name.clone(), pk.to_string())),
            InspectedTable::Failed { .. } => None,
        })
        .collect();

    let model_names = assign_model_names(alias, tables, reserved);

    let mut known_models = BTreeSet::new();
    let mut entries = Vec::with_capacity(tables.len());

    for table in tables {
        let table = match table {
            InspectedTable::Ready(table) => table,
            InspectedTable::Failed { table, reason } => {
                entries.push(ModelEntry::Skipped {
                    table: table.clone(),
                    reason: reason.clone(),
                });
                continue;
            }
        };

        let base_name = table_to_model_name(&table.name);
        let model_name = model_names
            .get(&table.name)
            .cloned()
            .unwrap_or_else(|| base_name.clone());
        let synthesized = {
            let ctx = SynthesisContext {
                backend,
                table,
                model_name: &model_name,
                known_models: &known_models,
                model_names: &model_names,
                primary_keys: &primary_keys,
            };
            synthesize_fields(&ctx)
        };

        let unique_together = table
            .unique_together
            .iter()
            .map(|columns| {
                columns
                    .iter()
                    .map(|column| {
                        synthesized
                            .attribute_names
                            .get(column)
                            .cloned()
                            .unwrap_or_else(|| column.clone())
                    })
                    .collect()
            })
            .collect();

        log::debug!(
            "Synthesized {} with {} field(s) from table '{}'",
            model_name,
            synthesized.fields.len(),
            table.name
        );

        if model_name != base_name {
            log::warn!(
                "Table '{}' of '{}' generates {} instead of {}, which is already taken",
                table.name,
                alias,
                model_name,
                base_name
            );
        }

        known_models.insert(model_name.clone());
        entries.push(ModelEntry::Model(ModelSpec {
            table: table.name.clone(),
            renamed_from: (model_name != base_name).then_some(base_name),
            name: model_name,
            alias: alias.to_string(),
            app_label: app_label.to_string(),
            is_view: table.is_view,
            fields: synthesized.fields,
            unique_together,
        }));
    }

    ModelFile {
        alias: alias.to_string(),
        entries,
    }
}

/// Give every readable table a model name unique within the file and
/// outside `reserved`.
///
/// A name claimed by another alias is prefixed with the alias; one still
/// taken gets a numeric suffix.
fn assign_model_names(
    alias: &str,
    tables: &[InspectedTable],
    reserved: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    let mut used = BTreeSet::new();
    let taken = |name: &String, used: &BTreeSet<String>| reserved.contains(name) || used.contains(name);

    for table in tables {
        let InspectedTable::Ready(table) = table else {
            continue;
        };

        let mut name = table_to_model_name(&table.name);
        if reserved.contains(&name) {
            name = format!("{}{}", table_to_model_name(alias), name);
        }
        if taken(&name, &used) {
            let mut index = 2;
            while taken(&format!("{}{}", name, index), &used) {
                index += 1;
            }
            name = format!("{}{}", name, index);
        }

        used.insert(name.clone());
        names.insert(table.name.clone(), name);
    }

    names
}

/// `(('a', 'b'), ('c', 'd'))` with the trailing comma a single group needs
fn unique_together_literal(groups: &[Vec<String>]) -> Option<String> {
    if groups.is_empty() {
        return None;
    }
    let rendered: Vec<String> = groups
        .iter()
        .map(|group| {
            let names: Vec<String> = group.iter().map(|name| python_string(name)).collect();
            python_tuple(&names)
        })
        .collect();
    Some(python_tuple(&rendered))
}

fn python_tuple(items: &[String]) -> String {
    if items.len() == 1 {
        format!("({},)", items[0])
    } else {
        format!("({})", items.join(", "))
    }
}

#[derive(Serialize)]
struct ModelFileContext {
    alias: String,
    models: Vec<ModelContext>,
}

#[derive(Serialize)]
struct ModelContext {
    skipped: bool,
    table: String,
    reason: String,
    name: String,
    renamed_from: Option<String>,
    fields: Vec<String>,
    alias: String,
    db_table: String,
    app_label: String,
    is_view: bool,
    unique_together: Option<String>,
}

impl ModelContext {
    fn from_entry(entry: &ModelEntry) -> Self {
        match entry {
            ModelEntry::Skipped { table, reason } => ModelContext {
                skipped: true,
                table: table.clone(),
                reason: reason.replace('\n', " "),
                name: String::new(),
                renamed_from: None,
                fields: Vec::new(),
                alias: String::new(),
                db_table: python_string(table),
                app_label: String::new(),
                is_view: false,
                unique_together: None,
            },
            ModelEntry::Model(spec) => ModelContext {
                skipped: false,
                table: spec.table.clone(),
                reason: String::new(),
                name: spec.name.clone(),
                renamed_from: spec.renamed_from.clone(),
                fields: spec.fields.iter().map(FieldSpec::render).collect(),
                alias: python_string(&spec.alias),
                db_table: python_string(&spec.table),
                app_label: python_string(&spec.app_label),
                is_view: spec.is_view,
                unique_together: unique_together_literal(&spec.unique_together),
            },
        }
    }
}
