//! PostgreSQL database introspection implementation

use super::{common::*, DatabaseIntrospector};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::collections::BTreeMap;

/// Unique indexes, whether declared as constraints or with `CREATE UNIQUE INDEX`.
///
/// Partial and expression indexes are left out, as are `INCLUDE` columns.
const UNIQUE_INDEXES_QUERY: &str = r#"
    SELECT
        ic.relname::text AS index_name,
        array_agg(a.attname::text ORDER BY k.ord) AS columns
    FROM pg_index i
    JOIN pg_class c ON c.oid = i.indrelid
    JOIN pg_class ic ON ic.oid = i.indexrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
    JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
    WHERE i.indisunique
        AND NOT i.indisprimary
        AND i.indpred IS NULL
        AND i.indexprs IS NULL
        AND k.ord <= i.indnkeyatts
        AND c.relname = $1
        AND n.nspname = 'public'
    GROUP BY ic.relname
    ORDER BY ic.relname
"#;

pub struct PostgresIntrospector {
    pool: Pool<Postgres>,
    db_name: String,
}

impl PostgresIntrospector {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db_name_row = sqlx::query("SELECT current_database()::text AS db_name")
            .fetch_one(&pool)
            .await?;
        let db_name: String = db_name_row.try_get("db_name")?;

        Ok(Self { pool, db_name })
    }
}

#[async_trait]
impl DatabaseIntrospector for PostgresIntrospector {
    fn backend(&self) -> BackendKind {
        BackendKind::PostgreSQL
    }

    async fn database_name(&self) -> Result<String> {
        Ok(self.db_name.clone())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT
                table_name::text AS table_name,
                table_type::text AS table_type
            FROM information_schema.tables
            WHERE table_schema = 'public'
            ORDER BY table_name
            "#,
        )
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
        // udt_name gives the short type names (int4, varchar, timestamptz)
        let rows = sqlx::query(
            r#"
            SELECT
                c.column_name::text AS column_name,
                c.udt_name::text AS data_type,
                c.is_nullable::text AS is_nullable,
                c.column_default::text AS column_default,
                c.is_identity::text AS is_identity,
                c.character_maximum_length::int8 AS character_maximum_length,
                c.numeric_precision::int8 AS numeric_precision,
                c.numeric_scale::int8 AS numeric_scale
            FROM information_schema.columns c
            WHERE c.table_name = $1 AND c.table_schema = 'public'
            ORDER BY c.ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::new();
        for row in rows {
            let data_type: String = row.try_get("data_type")?;
            let default: Option<String> = row.try_get("column_default")?;
            let is_identity: Option<String> = row.try_get("is_identity")?;
            let is_auto_increment = default
                .as_deref()
                .map_or(false, |d| d.starts_with("nextval("))
                || is_identity.as_deref() == Some("YES");

            // numeric_precision is also reported for plain integer types
            let (numeric_precision, numeric_scale) = if data_type == "numeric" {
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
                column_type: None,
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
            SELECT a.attname::text AS column_name
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey)
            WHERE i.indisprimary
                AND c.relname = $1
                AND n.nspname = 'public'
            ORDER BY array_position(i.indkey::int2[], a.attnum)
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("column_name").map_err(Into::into))
            .collect()
    }

    async fn unique_constraints(&self, table_name: &str) -> Result<Vec<UniqueConstraint>> {
        let rows = sqlx::query(UNIQUE_INDEXES_QUERY)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        let mut constraints = Vec::new();
        for row in rows {
            constraints.push(UniqueConstraint {
                name: row.try_get("index_name")?,
                columns: row.try_get("columns")?,
            });
        }

        Ok(constraints)
    }

    async fn relations(&self, table_name: &str) -> Result<BTreeMap<String, RelationTarget>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a1.attname::text AS column_name,
                c2.relname::text AS foreign_table_name,
                a2.attname::text AS foreign_column_name
            FROM pg_constraint con
            JOIN pg_class c1 ON c1.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c1.relnamespace
            JOIN pg_class c2 ON c2.oid = con.confrelid
            JOIN pg_attribute a1 ON a1.attrelid = con.conrelid AND a1.attnum = con.conkey[1]
            JOIN pg_attribute a2 ON a2.attrelid = con.confrelid AND a2.attnum = con.confkey[1]
            WHERE con.contype = 'f'
                AND c1.relname = $1
                AND n.nspname = 'public'
                AND array_length(con.conkey, 1) = 1
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        let mut relations = BTreeMap::new();
        for row in rows {
            let column_name: String = row.try_get("column_name")?;
            let foreign_table: String = row.try_get("foreign_table_name")?;
            let foreign_column: String = row.try_get("foreign_column_name")?;
            relations.insert(column_name, RelationTarget::new(foreign_table, foreign_column));
        }

        Ok(relations)
    }
}
