//! Common structures for database introspection

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Database engine behind a connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl BackendKind {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(BackendKind::PostgreSQL)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(BackendKind::MySQL)
        } else if url.starts_with("sqlite:") {
            Ok(BackendKind::SQLite)
        } else {
            Err(Error::UnsupportedBackend(format!(
                "{}. Supported: MySQL, PostgreSQL, SQLite",
                mask_database_url(url)
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::PostgreSQL => "postgres",
            BackendKind::MySQL => "mysql",
            BackendKind::SQLite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub is_view: bool,
}

impl TableInfo {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: false,
        }
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: true,
        }
    }
}

/// Referenced side of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTarget {
    pub table: String,
    pub column: String,
}

impl RelationTarget {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Raw type as reported by the catalog (`int4`, `varchar`, `decimal(10,2)`, ...)
    pub data_type: String,
    /// Full column type where the backend has one (MySQL `COLUMN_TYPE`)
    pub column_type: Option<String>,
    pub is_nullable: bool,
    pub max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub is_auto_increment: bool,
    pub relation: Option<RelationTarget>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            column_type: None,
            is_nullable: false,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_auto_increment: false,
            relation: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn with_max_length(mut self, length: i64) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i64, scale: i64) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    pub fn with_column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.relation = Some(RelationTarget::new(table, column));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// Everything learned about one table in a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub is_view: bool,
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key columns in key order; only the first one is modelled
    pub primary_key_columns: Vec<String>,
    /// Columns carrying a single-column unique constraint
    pub unique_columns: BTreeSet<String>,
    /// Multi-column unique constraints, sorted
    pub unique_together: Vec<Vec<String>>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: false,
            columns: Vec::new(),
            primary_key_columns: Vec::new(),
            unique_columns: BTreeSet::new(),
            unique_together: Vec::new(),
        }
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key_columns.first().map(String::as_str)
    }

    pub fn is_unique(&self, column: &str) -> bool {
        self.unique_columns.contains(column)
    }

    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key_columns.len() > 1
    }

    /// Split unique constraints into single-column flags and `unique_together` groups.
    pub fn apply_unique_constraints(&mut self, constraints: Vec<UniqueConstraint>) {
        let mut groups = BTreeSet::new();
        for constraint in constraints {
            match constraint.columns.len() {
                0 => {}
                1 => {
                    self.unique_columns.extend(constraint.columns);
                }
                _ => {
                    groups.insert(constraint.columns);
                }
            }
        }
        self.unique_together = groups.into_iter().collect();
    }
}

/// Hide credentials in a database URL before it is printed or logged
pub fn mask_database_url(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
