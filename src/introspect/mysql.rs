//! MySQL database introspection implementation

use super::{common::*, DatabaseIntrospector};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::{MySql, Pool, Row};
use std::collections::BTreeMap;

pub struct MySqlIntrospector {
    pool: Pool<MySql>,
    db_name: String,
}

impl MySqlIntrospector {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db_name_row = sqlx::query("SELECT CAST(DATABASE() AS CHAR) as db_name")
            .fetch_one(&pool)
            .await?;
        let db_name: Option<String> = db_name_row.try_get("db_name")?;

        Ok(Self {
            pool,
            db_name: db_name.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl DatabaseIntrospector for MySqlIntrospector {
    fn backend(&self) -> BackendKind {
        BackendKind::MySQL
    }

    async fn database_name(&self) -> Result<String> {
        Ok(self.db_name.clone())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(TABLE_NAME AS CHAR) as table_name,
                CAST(TABLE_TYPE AS CHAR) as table_type
            FROM information_schema.tables
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME
            "#,
        )
        .bind(&self.db_name)
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::new();
        for row in rows {
            let name: String = row.try_get("table_name")?;
            let table_type: String = row.try_get("table_type")?;
            tables.push(TableInfo {
                name,
                is_view: table_type.to_uppercase().contains("VIEW"),
            });
        }

        Ok(tables)
    }

    async fn describe_columns(&self, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
        // information_schema lengths are unsigned; cast so they decode as i64
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(c.COLUMN_NAME AS CHAR) as column_name,
                CAST(c.DATA_TYPE AS CHAR) as data_type,
                CAST(c.COLUMN_TYPE AS CHAR) as column_type,
                CAST(c.IS_NULLABLE AS CHAR) as is_nullable,
                CAST(c.CHARACTER_MAXIMUM_LENGTH AS SIGNED) as character_maximum_length,
                CAST(c.NUMERIC_PRECISION AS SIGNED) as numeric_precision,
                CAST(c.NUMERIC_SCALE AS SIGNED) as numeric_scale,
                CAST(c.EXTRA AS CHAR) as extra
            FROM information_schema.columns c
            WHERE c.TABLE_NAME = ? AND c.TABLE_SCHEMA = ?
            ORDER BY c.ORDINAL_POSITION
            "#,
        )
        .bind(table_name)
        .bind(&self.db_name)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::new();
        for row in rows {
            let data_type: String = row.try_get("data_type")?;
            let extra: Option<String> = row.try_get("extra")?;
            let is_auto_increment = extra
                .as_deref()
                .map_or(false, |s| s.contains("auto_increment"));

            let (numeric_precision, numeric_scale) = if data_type == "decimal" {
                (
                    row.try_get("numeric_precision")?,
                    row.try_get("numeric_scale")?,
                )
            } else {
                (None, None)
            };

            columns.push(ColumnDescriptor {
                name: row.try_get("column_name")?,
                data_type,
                column_type: row.try_get("column_type")?,
                is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                max_length: row.try_get("character_maximum_length")?,
                numeric_precision,
                numeric_scale,
                is_auto_increment,
                relation: None,
            });
        }

        Ok(columns)
    }

    async fn primary_key_columns(&self, table_name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(COLUMN_NAME AS CHAR) as column_name
            FROM information_schema.key_column_usage
            WHERE TABLE_NAME = ?
                AND TABLE_SCHEMA = ?
                AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
            "#,
        )
        .bind(table_name)
        .bind(&self.db_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("column_name").map_err(Into::into))
            .collect()
    }

    async fn unique_constraints(&self, table_name: &str) -> Result<Vec<UniqueConstraint>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(tc.CONSTRAINT_NAME AS CHAR) as constraint_name,
                CAST(kcu.COLUMN_NAME AS CHAR) as column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA
                AND tc.TABLE_NAME = kcu.TABLE_NAME
            WHERE tc.TABLE_NAME = ?
                AND tc.TABLE_SCHEMA = ?
                AND tc.CONSTRAINT_TYPE = 'UNIQUE'
            ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#,
        )
        .bind(table_name)
        .bind(&self.db_name)
        .fetch_all(&self.pool)
        .await?;

        // Rows arrive grouped by constraint name
        let mut constraints: Vec<UniqueConstraint> = Vec::new();
        for row in rows {
            let name: String = row.try_get("constraint_name")?;
            let column: String = row.try_get("column_name")?;
            match constraints.last_mut() {
                Some(last) if last.name == name => last.columns.push(column),
                _ => constraints.push(UniqueConstraint {
                    name,
                    columns: vec![column],
                }),
            }
        }

        Ok(constraints)
    }

    async fn relations(&self, table_name: &str) -> Result<BTreeMap<String, RelationTarget>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(kcu.CONSTRAINT_NAME AS CHAR) as constraint_name,
                CAST(kcu.COLUMN_NAME AS CHAR) as column_name,
                CAST(kcu.REFERENCED_TABLE_NAME AS CHAR) as referenced_table_name,
                CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR) as referenced_column_name
            FROM information_schema.key_column_usage kcu
            WHERE kcu.TABLE_NAME = ?
                AND kcu.TABLE_SCHEMA = ?
                AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#,
        )
        .bind(table_name)
        .bind(&self.db_name)
        .fetch_all(&self.pool)
        .await?;

        let mut by_constraint: BTreeMap<String, Vec<(String, RelationTarget)>> = BTreeMap::new();
        for row in rows {
            let constraint: String = row.try_get("constraint_name")?;
            let column_name: String = row.try_get("column_name")?;
            let referenced_table: String = row.try_get("referenced_table_name")?;
            let referenced_column: String = row.try_get("referenced_column_name")?;
            by_constraint
                .entry(constraint)
                .or_default()
                .push((column_name, RelationTarget::new(referenced_table, referenced_column)));
        }

        // Composite foreign keys cannot be expressed as a single field
        let relations = by_constraint
            .into_values()
            .filter(|columns| columns.len() == 1)
            .flatten()
            .collect();

        Ok(relations)
    }
}
