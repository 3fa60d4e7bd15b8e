//! Database introspection
//!
//! Each backend answers a handful of independent catalog questions. A failing
//! facet other than the column listing degrades to "nothing known" so one
//! unsupported query never costs the whole table.

mod common;
mod mysql;
mod postgres;
mod sqlite;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use common::*;
pub use mysql::MySqlIntrospector;
pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;

/// Database introspector trait for database-specific implementations
#[async_trait]
pub trait DatabaseIntrospector: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Get database name
    async fn database_name(&self) -> Result<String>;

    /// List all tables and views, in any order
    async fn list_tables(&self) -> Result<Vec<TableInfo>>;

    /// Columns of one table in ordinal order
    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Primary key columns in key order
    async fn primary_key_columns(&self, _table_name: &str) -> Result<Vec<String>> {
        Err(Error::unsupported(self.backend().as_str(), "primary key"))
    }

    async fn unique_constraints(&self, _table_name: &str) -> Result<Vec<UniqueConstraint>> {
        Err(Error::unsupported(self.backend().as_str(), "unique constraint"))
    }

    /// Single-column foreign keys: local column -> referenced table and column
    async fn relations(&self, _table_name: &str) -> Result<BTreeMap<String, RelationTarget>> {
        Err(Error::unsupported(self.backend().as_str(), "relation"))
    }
}

/// Create a database introspector based on the database URL
pub async fn connect(database_url: &str) -> Result<Box<dyn DatabaseIntrospector>> {
    match BackendKind::from_url(database_url)? {
        BackendKind::MySQL => Ok(Box::new(MySqlIntrospector::new(database_url).await?)),
        BackendKind::PostgreSQL => Ok(Box::new(PostgresIntrospector::new(database_url).await?)),
        BackendKind::SQLite => Ok(Box::new(SqliteIntrospector::new(database_url).await?)),
    }
}

/// Table listing sorted by name so generated output is stable across runs.
pub async fn sorted_tables(
    introspector: &dyn DatabaseIntrospector,
    include_views: bool,
) -> Result<Vec<TableInfo>> {
    let mut tables: Vec<TableInfo> = introspector
        .list_tables()
        .await?
        .into_iter()
        .filter(|table| include_views || !table.is_view)
        .collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    tables.dedup_by(|a, b| a.name == b.name);
    Ok(tables)
}

/// Gather every facet of one table.
///
/// Fails with [`Error::TableInspection`] only when the columns themselves
/// cannot be read.
pub async fn inspect_table(
    introspector: &dyn DatabaseIntrospector,
    table: &TableInfo,
) -> Result<TableDescriptor> {
    let name = table.name.as_str();

    let mut columns = introspector
        .describe_columns(name)
        .await
        .map_err(|e| Error::TableInspection {
            table: name.to_string(),
            message: e.to_string(),
        })?;

    if columns.is_empty() {
        return Err(Error::TableInspection {
            table: name.to_string(),
            message: "no columns reported".to_string(),
        });
    }

    let primary_key_columns = facet_or_default(name, "primary key", introspector.primary_key_columns(name).await);
    let unique_constraints = facet_or_default(name, "unique constraints", introspector.unique_constraints(name).await);
    let relations = facet_or_default(name, "relations", introspector.relations(name).await);

    for column in &mut columns {
        if let Some(target) = relations.get(&column.name) {
            column.relation = Some(target.clone());
        }
    }

    let mut descriptor = TableDescriptor::new(name);
    descriptor.is_view = table.is_view;
    descriptor.columns = columns;
    descriptor.primary_key_columns = primary_key_columns;
    descriptor.apply_unique_constraints(unique_constraints);

    log::debug!(
        "Inspected {}: {} columns, {} relations",
        name,
        descriptor.columns.len(),
        relations.len()
    );

    Ok(descriptor)
}

fn facet_or_default<T: Default>(table: &str, facet: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Skipping {} of table '{}': {}", facet, table, e);
            T::default()
        }
    }
}
