#![allow(dead_code)]

use async_trait::async_trait;
use ezadmin::collaborators::{AccountBootstrap, BootstrapOutcome, MigrationApplier, SuperuserCredentials};
use ezadmin::config::{DatabaseConfig, EzAdminConfig};
use ezadmin::introspect::{
    BackendKind, ColumnDescriptor, DatabaseIntrospector, RelationTarget, TableInfo, UniqueConstraint,
};
use ezadmin::orchestrator::Connector;
use ezadmin::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub is_view: bool,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub unique: Vec<UniqueConstraint>,
    /// Reading the columns fails
    pub broken: bool,
}

impl MemoryTable {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = vec![column.to_string()];
        self
    }

    pub fn unique(mut self, name: &str, columns: &[&str]) -> Self {
        self.unique.push(UniqueConstraint {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

/// Introspector over in-memory tables; relations are taken from each
/// column's `relation`.
#[derive(Debug, Clone)]
pub struct MemoryIntrospector {
    pub backend: BackendKind,
    pub tables: BTreeMap<String, MemoryTable>,
    pub supports_relations: bool,
    pub supports_constraints: bool,
}

impl MemoryIntrospector {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            tables: BTreeMap::new(),
            supports_relations: true,
            supports_constraints: true,
        }
    }

    pub fn table(mut self, name: &str, table: MemoryTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn without_relations(mut self) -> Self {
        self.supports_relations = false;
        self
    }

    pub fn without_constraints(mut self) -> Self {
        self.supports_constraints = false;
        self
    }

    fn get(&self, table_name: &str) -> Result<&MemoryTable> {
        self.tables.get(table_name).ok_or_else(|| Error::TableInspection {
            table: table_name.to_string(),
            message: "no such table".to_string(),
        })
    }
}

#[async_trait]
impl DatabaseIntrospector for MemoryIntrospector {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn database_name(&self) -> Result<String> {
        Ok("memory".to_string())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        // Reverse order, so callers must sort
        Ok(self
            .tables
            .iter()
            .rev()
            .map(|(name, table)| TableInfo {
                name: name.clone(),
                is_view: table.is_view,
            })
            .collect())
    }

    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
        let table = self.get(table_name)?;
        if table.broken {
            return Err(Error::Config("permission denied for relation".to_string()));
        }
        Ok(table
            .columns
            .iter()
            .cloned()
            .map(|mut column| {
                column.relation = None;
                column
            })
            .collect())
    }

    async fn primary_key_columns(&self, table_name: &str) -> Result<Vec<String>> {
        if !self.supports_constraints {
            return Err(Error::unsupported(self.backend.as_str(), "primary key"));
        }
        Ok(self.get(table_name)?.primary_key.clone())
    }

    async fn unique_constraints(&self, table_name: &str) -> Result<Vec<UniqueConstraint>> {
        if !self.supports_constraints {
            return Err(Error::unsupported(self.backend.as_str(), "unique constraint"));
        }
        Ok(self.get(table_name)?.unique.clone())
    }

    async fn relations(&self, table_name: &str) -> Result<BTreeMap<String, RelationTarget>> {
        if !self.supports_relations {
            return Err(Error::unsupported(self.backend.as_str(), "relation"));
        }
        Ok(self
            .get(table_name)?
            .columns
            .iter()
            .filter_map(|column| {
                column
                    .relation
                    .clone()
                    .map(|target| (column.name.clone(), target))
            })
            .collect())
    }
}

/// Hands out in-memory introspectors by URL; unknown URLs are unsupported.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    databases: HashMap<String, MemoryIntrospector>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, url: &str, introspector: MemoryIntrospector) -> Self {
        self.databases.insert(url.to_string(), introspector);
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn DatabaseIntrospector>> {
        match self.databases.get(url) {
            Some(introspector) => Ok(Box::new(introspector.clone())),
            None => Err(Error::UnsupportedBackend(format!("no backend for {}", url))),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingMigrator {
    pub calls: Arc<Mutex<usize>>,
    pub fail: bool,
}

#[async_trait]
impl MigrationApplier for RecordingMigrator {
    async fn apply(&self) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(Error::Migration("`python manage.py migrate` exited with 1".to_string()));
        }
        Ok(())
    }
}

/// Idempotent account store
#[derive(Clone, Default)]
pub struct RecordingBootstrap {
    pub accounts: Arc<Mutex<HashSet<String>>>,
}

#[async_trait]
impl AccountBootstrap for RecordingBootstrap {
    async fn ensure_account(&self, credentials: &SuperuserCredentials) -> Result<BootstrapOutcome> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.insert(credentials.username.clone()) {
            Ok(BootstrapOutcome::Created)
        } else {
            Ok(BootstrapOutcome::AlreadyExists)
        }
    }
}

pub fn config_with(databases: &[(&str, &str)]) -> EzAdminConfig {
    let mut config = EzAdminConfig::default();
    for (alias, url) in databases {
        config.databases.insert(
            alias.to_string(),
            DatabaseConfig {
                url: url.to_string(),
            },
        );
    }
    config
}

/// `customer` and `customer_order` from the classic shop schema
pub fn shop(backend: BackendKind) -> MemoryIntrospector {
    MemoryIntrospector::new(backend)
        .table(
            "customer_order",
            MemoryTable::new(vec![
                ColumnDescriptor::new("id", "int4").auto_increment(),
                ColumnDescriptor::new("customer_id", "int4").references("customer", "id"),
                ColumnDescriptor::new("total", "numeric").with_precision(10, 2).nullable(),
            ])
            .primary_key("id"),
        )
        .table(
            "customer",
            MemoryTable::new(vec![
                ColumnDescriptor::new("id", "int4").auto_increment(),
                ColumnDescriptor::new("name", "varchar").with_max_length(100),
            ])
            .primary_key("id"),
        )
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}
