//! PostgreSQL storage handle
//!
//! Renders [`TableAccess`] calls as parameterized statements over an sqlx
//! transaction. Column values are bound by their synthesized column type; the
//! generated DDL stores booleans as `INTEGER` 0/1 and dates, JSON and enums as
//! `TEXT`, so only integers and numerics need non-text binds. Numerics travel as
//! [`Decimal`] in both directions.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};

use super::{Predicate, Row, TableAccess, Transaction, Transactional};
use crate::error::{DocumentStoreError, Result};
use crate::schema::SchemaRegistry;
use crate::sql::condition::build_predicate_clause;
use crate::sql::ddl::DdlGenerator;
use crate::sql::sanitize::quote_identifier;
use crate::types::{ColumnDefinition, ColumnType, TableDefinition};

/// Connection pool bound to one schema registry
#[derive(Debug, Clone)]
pub struct PgDatabase {
    /// Database connection pool
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl PgDatabase {
    /// Connect to the database at `database_url`
    pub async fn connect(database_url: &str, registry: Arc<SchemaRegistry>) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            DocumentStoreError::Connection(format!("Database connection failed: {}", e))
        })?;
        Ok(Self { pool, registry })
    }

    /// Create a handle from an existing pool
    ///
    /// Use this when you already have a connection pool and want to
    /// share it with the document store.
    pub fn from_pool(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Create every table and index of the registry in one transaction
    pub async fn push_schema(&self) -> Result<()> {
        let statements = DdlGenerator::new(&self.registry).create_statements();
        self.execute_all(&statements).await?;
        tracing::info!(statements = statements.len(), "Pushed schema");
        Ok(())
    }

    /// Drop every table of the registry
    pub async fn drop_schema(&self) -> Result<()> {
        let statements = DdlGenerator::new(&self.registry).drop_statements();
        self.execute_all(&statements).await?;
        tracing::info!(tables = statements.len(), "Dropped schema");
        Ok(())
    }

    async fn execute_all(&self, statements: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in statements {
            tracing::debug!(sql = %statement, "Executing DDL");
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Transactional for PgDatabase {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction {
            tx,
            registry: Arc::clone(&self.registry),
        })
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    registry: Arc<SchemaRegistry>,
}

/// Map constraint violations to `Constraint`; everything else stays an SQL error
fn map_sql_error(error: sqlx::Error) -> DocumentStoreError {
    if let Some(db_error) = error.as_database_error() {
        if matches!(
            db_error.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) {
            return DocumentStoreError::constraint(db_error.message().to_string());
        }
    }
    DocumentStoreError::Sql(error)
}

fn column<'t>(table: &'t TableDefinition, name: &str) -> Result<&'t ColumnDefinition> {
    table.column(name).ok_or_else(|| {
        DocumentStoreError::database(format!(
            "column \"{}\" of relation \"{}\" does not exist",
            name, table.name
        ))
    })
}

fn select_list(table: &TableDefinition) -> String {
    table
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    col: &ColumnDefinition,
    value: &Value,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let mismatch = |expected: &str| {
        DocumentStoreError::validation(format!(
            "Column '{}' expected {}, got {}",
            col.name, expected, value
        ))
    };

    Ok(match &col.column_type {
        ColumnType::Serial | ColumnType::Integer | ColumnType::Boolean => {
            if value.is_null() {
                query.bind(None::<i32>)
            } else {
                let int_val = value
                    .as_i64()
                    .or_else(|| value.as_str().and_then(|s| s.parse::<i64>().ok()))
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| mismatch("integer"))?;
                query.bind(int_val)
            }
        }
        ColumnType::Numeric => {
            if value.is_null() {
                query.bind(None::<Decimal>)
            } else {
                let num_val = decimal_from_json(value).ok_or_else(|| mismatch("number"))?;
                query.bind(num_val)
            }
        }
        ColumnType::Text | ColumnType::Json | ColumnType::Date | ColumnType::Enum { .. } => {
            match value {
                Value::Null => query.bind(None::<String>),
                Value::String(s) => query.bind(s.clone()),
                other => query.bind(other.to_string()),
            }
        }
    })
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<Value>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::String(s) => query.bind(s),
            other => query.bind(other),
        };
    }
    query
}

/// Parse a JSON number (or numeric string) without going through `f64`
fn decimal_from_json(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Integral values come back as JSON integers, the rest as floats
fn decimal_to_json(d: Decimal) -> Option<Value> {
    if d.fract().is_zero() {
        if let Some(int_val) = d.to_i64() {
            return Some(Value::from(int_val));
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn extract_column_value(row: &sqlx::postgres::PgRow, col: &ColumnDefinition) -> Option<Value> {
    match &col.column_type {
        ColumnType::Serial | ColumnType::Integer | ColumnType::Boolean => row
            .try_get::<Option<i32>, _>(col.name.as_str())
            .ok()
            .flatten()
            .map(Value::from),
        ColumnType::Numeric => row
            .try_get::<Option<Decimal>, _>(col.name.as_str())
            .ok()
            .flatten()
            .and_then(decimal_to_json),
        ColumnType::Text | ColumnType::Json | ColumnType::Date | ColumnType::Enum { .. } => row
            .try_get::<Option<String>, _>(col.name.as_str())
            .ok()
            .flatten()
            .map(Value::String),
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow, table: &TableDefinition) -> Row {
    table
        .columns
        .iter()
        .map(|col| {
            (
                col.name.clone(),
                extract_column_value(row, col).unwrap_or(Value::Null),
            )
        })
        .collect()
}

impl PgTransaction {
    fn definition(&self, table: &str) -> Result<TableDefinition> {
        self.registry.table(table).cloned()
    }

    fn where_clause(predicate: &Predicate, param_offset: &mut i32) -> Result<(String, Vec<Value>)> {
        build_predicate_clause(predicate, param_offset).map_err(DocumentStoreError::validation)
    }
}

#[async_trait]
impl TableAccess for PgTransaction {
    async fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let definition = self.definition(table)?;
        let quoted_table = quote_identifier(table);
        let returning = select_list(&definition);
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let columns = row
                .keys()
                .map(|name| column(&definition, name))
                .collect::<Result<Vec<_>>>()?;

            let insert_sql = if columns.is_empty() {
                format!(
                    "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                    quoted_table, returning
                )
            } else {
                let names: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
                let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                    quoted_table,
                    names.join(", "),
                    placeholders.join(", "),
                    returning
                )
            };

            let mut query = sqlx::query(&insert_sql);
            for (col, value) in columns.iter().zip(row.values()) {
                query = bind_value(query, col, value)?;
            }

            let stored = query
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sql_error)?;
            inserted.push(row_to_json(&stored, &definition));
        }

        tracing::trace!(table = %table, rows = inserted.len(), "Inserted rows");
        Ok(inserted)
    }

    async fn update_rows(
        &mut self,
        table: &str,
        values: Row,
        predicate: &Predicate,
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let definition = self.definition(table)?;
        let columns = values
            .keys()
            .map(|name| column(&definition, name))
            .collect::<Result<Vec<_>>>()?;

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", quote_identifier(&c.name), i + 1))
            .collect();
        let mut param_offset = columns.len() as i32 + 1;
        let (where_clause, params) = Self::where_clause(predicate, &mut param_offset)?;

        let update_sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table),
            assignments.join(", "),
            where_clause
        );

        let mut query = sqlx::query(&update_sql);
        for (col, value) in columns.iter().zip(values.values()) {
            query = bind_value(query, col, value)?;
        }
        let result = bind_params(query, params)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sql_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_rows(&mut self, table: &str, predicate: &Predicate) -> Result<u64> {
        self.definition(table)?;
        let mut param_offset = 1;
        let (where_clause, params) = Self::where_clause(predicate, &mut param_offset)?;

        let delete_sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(table),
            where_clause
        );
        let result = bind_params(sqlx::query(&delete_sql), params)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sql_error)?;
        Ok(result.rows_affected())
    }

    async fn select_rows(&mut self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        let definition = self.definition(table)?;
        let mut param_offset = 1;
        let (where_clause, params) = Self::where_clause(predicate, &mut param_offset)?;

        let select_sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select_list(&definition),
            quote_identifier(table),
            where_clause
        );
        let rows = bind_params(sqlx::query(&select_sql), params)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.iter().map(|row| row_to_json(row, &definition)).collect())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_numeric_decodes_as_integer() {
        let three = decimal_from_json(&json!(3)).unwrap();
        assert_eq!(decimal_to_json(three), Some(json!(3)));

        // NUMERIC keeps the scale it was written with
        let scaled = Decimal::from_str("3.00").unwrap();
        assert_eq!(decimal_to_json(scaled), Some(json!(3)));

        let half = decimal_from_json(&json!(4.5)).unwrap();
        assert_eq!(decimal_to_json(half), Some(json!(4.5)));
    }

    #[test]
    fn test_decimal_from_json_inputs() {
        assert_eq!(decimal_from_json(&json!("2.25")), Decimal::from_str("2.25").ok());
        assert_eq!(decimal_from_json(&json!(1e3)), Some(Decimal::from(1000)));
        assert_eq!(decimal_from_json(&json!(-7)), Some(Decimal::from(-7)));
        assert_eq!(decimal_from_json(&json!(true)), None);
        assert_eq!(decimal_from_json(&json!("many")), None);
    }
}
