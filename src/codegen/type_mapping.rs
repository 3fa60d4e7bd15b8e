//! Column type to model field mapping.
//!
//! The lookup table is keyed by `(backend, raw type)`; per-column facts
//! (length, precision, auto increment, signedness) refine the result.

use crate::introspect::{BackendKind, ColumnDescriptor};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Declarative field constructors the generator can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    AutoField,
    BigAutoField,
    SmallAutoField,
    BooleanField,
    CharField,
    TextField,
    IntegerField,
    BigIntegerField,
    SmallIntegerField,
    PositiveIntegerField,
    PositiveBigIntegerField,
    PositiveSmallIntegerField,
    DecimalField,
    FloatField,
    DateField,
    DateTimeField,
    TimeField,
    DurationField,
    UuidField,
    JsonField,
    BinaryField,
    GenericIpAddressField,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::AutoField => "AutoField",
            FieldKind::BigAutoField => "BigAutoField",
            FieldKind::SmallAutoField => "SmallAutoField",
            FieldKind::BooleanField => "BooleanField",
            FieldKind::CharField => "CharField",
            FieldKind::TextField => "TextField",
            FieldKind::IntegerField => "IntegerField",
            FieldKind::BigIntegerField => "BigIntegerField",
            FieldKind::SmallIntegerField => "SmallIntegerField",
            FieldKind::PositiveIntegerField => "PositiveIntegerField",
            FieldKind::PositiveBigIntegerField => "PositiveBigIntegerField",
            FieldKind::PositiveSmallIntegerField => "PositiveSmallIntegerField",
            FieldKind::DecimalField => "DecimalField",
            FieldKind::FloatField => "FloatField",
            FieldKind::DateField => "DateField",
            FieldKind::DateTimeField => "DateTimeField",
            FieldKind::TimeField => "TimeField",
            FieldKind::DurationField => "DurationField",
            FieldKind::UuidField => "UUIDField",
            FieldKind::JsonField => "JSONField",
            FieldKind::BinaryField => "BinaryField",
            FieldKind::GenericIpAddressField => "GenericIPAddressField",
        }
    }

    /// Integer-backed kinds, which an implicit auto id can stand in for
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::AutoField
                | FieldKind::BigAutoField
                | FieldKind::SmallAutoField
                | FieldKind::IntegerField
                | FieldKind::BigIntegerField
                | FieldKind::SmallIntegerField
                | FieldKind::PositiveIntegerField
                | FieldKind::PositiveBigIntegerField
                | FieldKind::PositiveSmallIntegerField
        )
    }

    fn to_auto(self) -> Self {
        match self {
            FieldKind::IntegerField | FieldKind::PositiveIntegerField => FieldKind::AutoField,
            FieldKind::BigIntegerField | FieldKind::PositiveBigIntegerField => FieldKind::BigAutoField,
            FieldKind::SmallIntegerField | FieldKind::PositiveSmallIntegerField => {
                FieldKind::SmallAutoField
            }
            other => other,
        }
    }

    fn to_positive(self) -> Self {
        match self {
            FieldKind::IntegerField => FieldKind::PositiveIntegerField,
            FieldKind::BigIntegerField => FieldKind::PositiveBigIntegerField,
            FieldKind::SmallIntegerField => FieldKind::PositiveSmallIntegerField,
            other => other,
        }
    }
}

/// Keyword argument value as it appears in generated source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ParamValue {
    /// Python literal for this value
    pub fn to_python(&self) -> String {
        match self {
            ParamValue::Bool(true) => "True".to_string(),
            ParamValue::Bool(false) => "False".to_string(),
            ParamValue::Int(value) => value.to_string(),
            ParamValue::Str(value) => python_string(value),
        }
    }
}

/// Single-quoted Python string literal
pub fn python_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Result of mapping one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub kind: FieldKind,
    pub params: Vec<(String, ParamValue)>,
    pub notes: Vec<String>,
}

pub const GUESSED_TYPE_NOTE: &str = "This field type is a guess.";

static TYPE_MAP: Lazy<HashMap<BackendKind, HashMap<&'static str, FieldKind>>> = Lazy::new(|| {
    use BackendKind::*;
    use FieldKind::*;

    let postgres: &[(&str, FieldKind)] = &[
        ("bool", BooleanField),
        ("bytea", BinaryField),
        ("int8", BigIntegerField),
        ("int2", SmallIntegerField),
        ("int4", IntegerField),
        ("text", TextField),
        ("float4", FloatField),
        ("float8", FloatField),
        ("inet", GenericIpAddressField),
        ("date", DateField),
        ("time", TimeField),
        ("timetz", TimeField),
        ("timestamp", DateTimeField),
        ("timestamptz", DateTimeField),
        ("interval", DurationField),
        ("numeric", DecimalField),
        ("uuid", UuidField),
        ("json", JsonField),
        ("jsonb", JsonField),
        ("varchar", CharField),
        ("bpchar", CharField),
    ];

    let mysql: &[(&str, FieldKind)] = &[
        ("bigint", BigIntegerField),
        ("binary", BinaryField),
        ("varbinary", BinaryField),
        ("blob", BinaryField),
        ("tinyblob", BinaryField),
        ("mediumblob", BinaryField),
        ("longblob", BinaryField),
        ("char", CharField),
        ("varchar", CharField),
        ("date", DateField),
        ("datetime", DateTimeField),
        ("timestamp", DateTimeField),
        ("decimal", DecimalField),
        ("double", FloatField),
        ("float", FloatField),
        ("int", IntegerField),
        ("integer", IntegerField),
        ("mediumint", IntegerField),
        ("tinyint", SmallIntegerField),
        ("smallint", SmallIntegerField),
        ("year", SmallIntegerField),
        ("json", JsonField),
        ("text", TextField),
        ("tinytext", TextField),
        ("mediumtext", TextField),
        ("longtext", TextField),
        ("enum", CharField),
        ("time", TimeField),
    ];

    let sqlite: &[(&str, FieldKind)] = &[
        ("bool", BooleanField),
        ("boolean", BooleanField),
        ("smallint", SmallIntegerField),
        ("smallint unsigned", PositiveSmallIntegerField),
        ("smallinteger", SmallIntegerField),
        ("int", IntegerField),
        ("integer", IntegerField),
        ("bigint", BigIntegerField),
        ("integer unsigned", PositiveIntegerField),
        ("bigint unsigned", PositiveBigIntegerField),
        ("decimal", DecimalField),
        ("numeric", DecimalField),
        ("real", FloatField),
        ("float", FloatField),
        ("double", FloatField),
        ("text", TextField),
        ("char", CharField),
        ("varchar", CharField),
        ("blob", BinaryField),
        ("date", DateField),
        ("datetime", DateTimeField),
        ("time", TimeField),
        ("json", JsonField),
    ];

    [(PostgreSQL, postgres), (MySQL, mysql), (SQLite, sqlite)]
        .into_iter()
        .map(|(backend, entries)| (backend, entries.iter().copied().collect()))
        .collect()
});

/// Plain table lookup, without per-column refinements.
pub fn lookup(backend: BackendKind, raw_type: &str) -> Option<FieldKind> {
    let raw = raw_type.trim().to_lowercase();
    TYPE_MAP
        .get(&backend)
        .and_then(|types| types.get(raw.as_str()))
        .copied()
}

/// Map a column to the closest field kind plus its type parameters.
pub fn map_column(backend: BackendKind, column: &ColumnDescriptor) -> MappedType {
    let mut notes = Vec::new();
    let raw = column.data_type.trim().to_lowercase();

    let mut kind = match lookup(backend, &raw) {
        Some(kind) => kind,
        None => {
            notes.push(GUESSED_TYPE_NOTE.to_string());
            if raw.contains("blob") || raw.contains("binary") || raw.contains("bytea") {
                FieldKind::BinaryField
            } else {
                FieldKind::TextField
            }
        }
    };

    if backend == BackendKind::MySQL {
        let full = column.column_type.as_deref().unwrap_or("").to_lowercase();
        if full == "tinyint(1)" {
            kind = FieldKind::BooleanField;
        } else if full.contains("unsigned") {
            kind = kind.to_positive();
        }
    }

    if column.is_auto_increment {
        kind = kind.to_auto();
    }

    let mut params = Vec::new();
    match kind {
        FieldKind::CharField => match column.max_length {
            Some(length) if length > 0 => {
                params.push(("max_length".to_string(), ParamValue::Int(length)));
            }
            _ => {
                kind = FieldKind::TextField;
                if !notes.iter().any(|note| note == GUESSED_TYPE_NOTE) {
                    notes.push(GUESSED_TYPE_NOTE.to_string());
                }
            }
        },
        FieldKind::DecimalField => match (column.numeric_precision, column.numeric_scale) {
            (Some(precision), Some(scale)) if precision > 0 => {
                params.push(("max_digits".to_string(), ParamValue::Int(precision)));
                params.push(("decimal_places".to_string(), ParamValue::Int(scale)));
            }
            _ => {
                params.push(("max_digits".to_string(), ParamValue::Int(10)));
                params.push(("decimal_places".to_string(), ParamValue::Int(5)));
                notes.push("max_digits and decimal_places have been guessed.".to_string());
            }
        },
        _ => {}
    }

    MappedType { kind, params, notes }
}
