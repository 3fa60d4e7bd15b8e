//! SQLite database introspection implementation

use super::{common::*, DatabaseIntrospector};
use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeMap;

/// `varchar(30)`, `decimal(10, 2)`
static SIZED_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^(]*?)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)\s*$").expect("valid regex")
});

pub struct SqliteIntrospector {
    pool: Pool<Sqlite>,
}

impl SqliteIntrospector {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

/// Identifier quoting for PRAGMA arguments, which cannot be bound.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Split a declared SQLite type into its base name and size arguments.
fn split_declared_type(declared: &str) -> (String, Option<i64>, Option<i64>) {
    match SIZED_TYPE.captures(declared) {
        Some(caps) => {
            let base = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            let first = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let second = caps.get(3).and_then(|m| m.as_str().parse().ok());
            (base, first, second)
        }
        None => (declared.trim().to_lowercase(), None, None),
    }
}

#[async_trait]
impl DatabaseIntrospector for SqliteIntrospector {
    fn backend(&self) -> BackendKind {
        BackendKind::SQLite
    }

    async fn database_name(&self) -> Result<String> {
        Ok("sqlite".to_string())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT name, type
            FROM sqlite_master
            WHERE type IN ('table', 'view')
                AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let kind: String = row.try_get("type")?;
            tables.push(TableInfo {
                name,
                is_view: kind == "view",
            });
        }

        Ok(tables)
    }

    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table_name)))
            .fetch_all(&self.pool)
            .await?;

        let pk_count = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").unwrap_or(0) > 0)
            .count();

        let mut columns = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;

            let (data_type, first, second) = split_declared_type(&declared);

            // A lone INTEGER PRIMARY KEY aliases the rowid
            let is_auto_increment = pk == 1 && pk_count == 1 && data_type == "integer";

            let (max_length, numeric_precision, numeric_scale) = match data_type.as_str() {
                "decimal" | "numeric" => (None, first, second),
                _ => (first, None, None),
            };

            columns.push(ColumnDescriptor {
                name,
                data_type,
                column_type: Some(declared),
                // PRAGMA reports notnull = 0 for undeclared primary keys
                is_nullable: not_null == 0 && pk == 0,
                max_length,
                numeric_precision,
                numeric_scale,
                is_auto_increment,
                relation: None,
            });
        }

        Ok(columns)
    }

    async fn primary_key_columns(&self, table_name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table_name)))
            .fetch_all(&self.pool)
            .await?;

        let mut keyed = Vec::new();
        for row in rows {
            let pk: i64 = row.try_get("pk")?;
            if pk > 0 {
                let name: String = row.try_get("name")?;
                keyed.push((pk, name));
            }
        }
        keyed.sort();

        Ok(keyed.into_iter().map(|(_, name)| name).collect())
    }

    async fn unique_constraints(&self, table_name: &str) -> Result<Vec<UniqueConstraint>> {
        let index_rows = sqlx::query(&format!("PRAGMA index_list({})", quote_identifier(table_name)))
            .fetch_all(&self.pool)
            .await?;

        let mut constraints = Vec::new();
        for row in index_rows {
            let name: String = row.try_get("name")?;
            let unique: i64 = row.try_get("unique")?;
            let origin: String = row.try_get("origin")?;
            let partial: i64 = row.try_get("partial")?;
            if unique == 0 || origin == "pk" || partial != 0 {
                continue;
            }

            let info_rows = sqlx::query(&format!("PRAGMA index_info({})", quote_identifier(&name)))
                .fetch_all(&self.pool)
                .await?;

            let mut ordered = Vec::new();
            for info in info_rows {
                let seqno: i64 = info.try_get("seqno")?;
                // NULL for expression indexes
                let column: Option<String> = info.try_get("name")?;
                match column {
                    Some(column) => ordered.push((seqno, column)),
                    None => {
                        ordered.clear();
                        break;
                    }
                }
            }
            if ordered.is_empty() {
                continue;
            }
            ordered.sort();

            constraints.push(UniqueConstraint {
                name,
                columns: ordered.into_iter().map(|(_, column)| column).collect(),
            });
        }

        constraints.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(constraints)
    }

    async fn relations(&self, table_name: &str) -> Result<BTreeMap<String, RelationTarget>> {
        let rows = sqlx::query(&format!(
            "PRAGMA foreign_key_list({})",
            quote_identifier(table_name)
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: BTreeMap<i64, Vec<(String, String, Option<String>)>> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let target_table: String = row.try_get("table")?;
            let from: String = row.try_get("from")?;
            let to: Option<String> = row.try_get("to")?;
            by_id.entry(id).or_default().push((from, target_table, to));
        }

        let mut relations = BTreeMap::new();
        for (_, mut columns) in by_id {
            if columns.len() != 1 {
                continue;
            }
            let Some((from, target_table, to)) = columns.pop() else {
                continue;
            };

            // REFERENCES parent without a column list points at the parent's primary key
            let target_column = match to {
                Some(column) => column,
                None => match self.primary_key_columns(&target_table).await?.into_iter().next() {
                    Some(column) => column,
                    None => continue,
                },
            };

            relations.insert(from, RelationTarget::new(target_table, target_column));
        }

        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_declared_type() {
        assert_eq!(split_declared_type("varchar(30)"), ("varchar".to_string(), Some(30), None));
        assert_eq!(
            split_declared_type("DECIMAL(10, 2)"),
            ("decimal".to_string(), Some(10), Some(2))
        );
        assert_eq!(split_declared_type("INTEGER"), ("integer".to_string(), None, None));
        assert_eq!(
            split_declared_type("integer unsigned"),
            ("integer unsigned".to_string(), None, None)
        );
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
