//! Per-column field synthesis

use super::naming::normalize_column_name;
use super::type_mapping::{map_column, FieldKind, ParamValue};
use crate::introspect::{BackendKind, ColumnDescriptor, TableDescriptor};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Cardinality of a relation field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToOne,
    OneToOne,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::ManyToOne => "ForeignKey",
            RelationKind::OneToOne => "OneToOneField",
        }
    }
}

/// How a relation names its target model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTargetRef {
    /// The model references itself
    SelfRef,
    /// Target already declared earlier in the same file
    Declared(String),
    /// Target declared later; referenced by name
    Forward(String),
}

impl RelationTargetRef {
    fn to_python(&self) -> String {
        match self {
            RelationTargetRef::SelfRef => "'self'".to_string(),
            RelationTargetRef::Declared(name) => name.clone(),
            RelationTargetRef::Forward(name) => format!("'{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(FieldKind),
    Relation {
        kind: RelationKind,
        target: RelationTargetRef,
    },
}

/// One synthesized model field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub params: IndexMap<String, ParamValue>,
    pub notes: Vec<String>,
}

impl FieldSpec {
    pub fn type_name(&self) -> &'static str {
        match &self.field_type {
            FieldType::Scalar(kind) => kind.as_str(),
            FieldType::Relation { kind, .. } => kind.as_str(),
        }
    }

    pub fn relation_kind(&self) -> Option<RelationKind> {
        match &self.field_type {
            FieldType::Relation { kind, .. } => Some(*kind),
            FieldType::Scalar(_) => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.params.get(name), Some(ParamValue::Bool(true)))
    }

    /// Render the field as one line of the model body, without indentation.
    pub fn render(&self) -> String {
        let mut args = Vec::new();
        if let FieldType::Relation { target, .. } = &self.field_type {
            args.push(target.to_python());
            args.push("models.DO_NOTHING".to_string());
        }
        for (key, value) in &self.params {
            args.push(format!("{}={}", key, value.to_python()));
        }

        let mut line = format!("{} = models.{}({})", self.name, self.type_name(), args.join(", "));
        if !self.notes.is_empty() {
            line.push_str("  # ");
            line.push_str(&self.notes.join(" "));
        }
        line
    }
}

/// Read-only inputs shared by every column of one model
pub struct SynthesisContext<'a> {
    pub backend: BackendKind,
    pub table: &'a TableDescriptor,
    pub model_name: &'a str,
    /// Models already emitted earlier in the same file
    pub known_models: &'a BTreeSet<String>,
    /// Model name of every table declared in the same file
    pub model_names: &'a BTreeMap<String, String>,
    /// First primary key column of every table seen in this run
    pub primary_keys: &'a BTreeMap<String, String>,
}

/// Output of synthesizing a whole table
#[derive(Debug, Clone, Default)]
pub struct SynthesizedFields {
    pub fields: Vec<FieldSpec>,
    /// Column name to generated attribute name, including suppressed columns
    pub attribute_names: BTreeMap<String, String>,
}

/// Synthesize every field of a table in column order.
pub fn synthesize_fields(ctx: &SynthesisContext<'_>) -> SynthesizedFields {
    let mut used_names = HashSet::new();
    let mut used_relations = HashSet::new();
    let mut output = SynthesizedFields::default();

    for column in &ctx.table.columns {
        let (name, field) = synthesize_field(ctx, column, &used_names, &mut used_relations);
        used_names.insert(name.clone());
        output.attribute_names.insert(column.name.clone(), name);
        if let Some(field) = field {
            output.fields.push(field);
        }
    }

    output
}

/// Synthesize one column.
///
/// Returns the attribute name that was claimed and the field, or `None`
/// for an implicit auto id that needs no declaration.
pub fn synthesize_field(
    ctx: &SynthesisContext<'_>,
    column: &ColumnDescriptor,
    used_names: &HashSet<String>,
    used_relations: &mut HashSet<String>,
) -> (String, Option<FieldSpec>) {
    let table = ctx.table;

    // Relations to tables without a model in this file stay scalar
    let relation = column.relation.as_ref().and_then(|target| {
        if target.table == table.name {
            Some((target, RelationTargetRef::SelfRef))
        } else {
            ctx.model_names.get(&target.table).map(|model| {
                let target_ref = if ctx.known_models.contains(model) {
                    RelationTargetRef::Declared(model.clone())
                } else {
                    RelationTargetRef::Forward(model.clone())
                };
                (target, target_ref)
            })
        }
    });

    let normalized = normalize_column_name(&column.name, relation.is_some(), used_names);

    let mut notes = normalized.notes;
    let mut params: IndexMap<String, ParamValue> = IndexMap::new();
    if let Some(db_column) = normalized.db_column {
        params.insert("db_column".to_string(), ParamValue::Str(db_column));
    }

    // Auto fields must be primary keys; stands in when the key lookup came back empty
    let is_primary_key = match table.primary_key() {
        Some(pk) => pk == column.name,
        None => column.is_auto_increment,
    };

    if is_primary_key {
        params.insert("primary_key".to_string(), ParamValue::Bool(true));
        if table.has_composite_primary_key() {
            notes.push(format!(
                "The composite primary key ({}) found, that is not supported. The first column is selected.",
                table.primary_key_columns.join(", ")
            ));
        }
    } else if table.is_unique(&column.name) {
        params.insert("unique".to_string(), ParamValue::Bool(true));
    }

    let field_type = match relation {
        Some((target, target_ref)) => {
            // A unique or primary key relation is one-to-one; uniqueness is implied
            let is_unique = params.shift_remove("unique").is_some();
            let kind = if is_unique || params.contains_key("primary_key") {
                RelationKind::OneToOne
            } else {
                RelationKind::ManyToOne
            };

            if let Some(target_pk) = ctx.primary_keys.get(&target.table) {
                if target_pk != &target.column {
                    params.insert("to_field".to_string(), ParamValue::Str(target.column.clone()));
                }
            }

            let relation_key = match &target_ref {
                RelationTargetRef::SelfRef => "self".to_string(),
                RelationTargetRef::Declared(name) | RelationTargetRef::Forward(name) => name.clone(),
            };
            if !used_relations.insert(relation_key) {
                params.insert(
                    "related_name".to_string(),
                    ParamValue::Str(format!(
                        "{}_{}_set",
                        ctx.model_name.to_lowercase(),
                        normalized.name
                    )),
                );
            }

            FieldType::Relation {
                kind,
                target: target_ref,
            }
        }
        None => {
            if let Some(target) = &column.relation {
                notes.push(format!(
                    "References {}.{}, which has no generated model.",
                    target.table, target.column
                ));
            }
            let mapped = map_column(ctx.backend, column);
            notes.extend(mapped.notes);
            for (key, value) in mapped.params {
                params.insert(key, value);
            }
            FieldType::Scalar(mapped.kind)
        }
    };

    if column.is_nullable {
        params.insert("blank".to_string(), ParamValue::Bool(true));
        params.insert("null".to_string(), ParamValue::Bool(true));
    }

    // An integer `id` that is only the primary key is the implicit auto field
    let implicit_id = normalized.name == "id"
        && notes.is_empty()
        && params.len() == 1
        && params.get("primary_key") == Some(&ParamValue::Bool(true))
        && matches!(field_type, FieldType::Scalar(kind) if kind.is_integer());

    if implicit_id {
        return (normalized.name, None);
    }

    let field = FieldSpec {
        name: normalized.name.clone(),
        column: column.name.clone(),
        field_type,
        params,
        notes,
    };
    (normalized.name, Some(field))
}
