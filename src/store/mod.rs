//! Transactional table access
//!
//! The row engine never builds statement text. It talks to storage through
//! [`TableAccess`], which inserts, updates, deletes and selects JSON-object rows
//! matching a [`Predicate`]. Two handles are provided: [`PgDatabase`] on sqlx and
//! the in-process [`MemoryDatabase`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DocumentStoreError, Result};
use crate::schema::SchemaRegistry;
use crate::upsert::{self, UpsertArgs};

pub use memory::{MemoryDatabase, MemoryTransaction};
pub use postgres::{PgDatabase, PgTransaction};

/// One table row keyed by column name
pub type Row = serde_json::Map<String, Value>;

/// Row filter understood by every storage handle
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column equals value (compared as text)
    Eq(String, Value),
    /// Column equals one of the values (compared as text)
    In(String, Vec<Value>),
    IsNull(String),
    /// Text column starts with a literal prefix
    StartsWith(String, String),
    /// All sub-predicates hold; an empty list matches every row
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In(column.into(), values)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn starts_with(column: impl Into<String>, prefix: impl Into<String>) -> Self {
        Predicate::StartsWith(column.into(), prefix.into())
    }

    /// Matches every row
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    /// Conjunction with another predicate, flattening nested `And`s
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), other) => {
                left.push(other);
                Predicate::And(left)
            }
            (this, Predicate::And(mut right)) => {
                right.insert(0, this);
                Predicate::And(right)
            }
            (this, other) => Predicate::And(vec![this, other]),
        }
    }

    /// Columns referenced anywhere in the predicate
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Predicate::Eq(c, _)
            | Predicate::In(c, _)
            | Predicate::IsNull(c)
            | Predicate::StartsWith(c, _) => vec![c.as_str()],
            Predicate::And(parts) => parts.iter().flat_map(Predicate::columns).collect(),
        }
    }
}

/// Text form used to compare stored values; `None` for SQL NULL.
///
/// Ids come back as numbers from one handle and as strings from another, so
/// predicates and the row assembler compare values by their text form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Row-level access to synthesized tables
#[async_trait]
pub trait TableAccess: Send {
    /// Insert rows and return them as stored, including generated ids
    async fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;

    /// Set `values` on every matching row; returns the number of rows changed
    async fn update_rows(&mut self, table: &str, values: Row, predicate: &Predicate)
    -> Result<u64>;

    /// Delete every matching row (children follow by cascade); returns the count
    async fn delete_rows(&mut self, table: &str, predicate: &Predicate) -> Result<u64>;

    async fn select_rows(&mut self, table: &str, predicate: &Predicate) -> Result<Vec<Row>>;
}

/// A unit of work over a [`TableAccess`] handle
#[async_trait]
pub trait Transaction: TableAccess {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Storage that can open transactions
#[async_trait]
pub trait Transactional: Send + Sync {
    type Transaction: Transaction;

    async fn begin(&self) -> Result<Self::Transaction>;
}

/// Collection-level facade over a schema registry and a storage handle
pub struct DocumentStore<D> {
    db: D,
    registry: Arc<SchemaRegistry>,
}

impl<D: Transactional> DocumentStore<D> {
    pub fn new(db: D, registry: Arc<SchemaRegistry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    fn root_table(&self, collection: &str) -> Result<&str> {
        self.registry
            .collection(collection)
            .map(|c| c.root_table.as_str())
    }

    /// Insert a new document and return it as persisted
    pub async fn create(
        &self,
        collection: &str,
        data: &Value,
        locale: Option<&str>,
    ) -> Result<Value> {
        let table = self.root_table(collection)?;
        upsert::upsert_row(
            &self.db,
            &self.registry,
            UpsertArgs {
                table,
                data,
                id: None,
                locale,
            },
        )
        .await
    }

    /// Update an existing document; nested collections present in `data` are replaced
    pub async fn update(
        &self,
        collection: &str,
        id: &Value,
        data: &Value,
        locale: Option<&str>,
    ) -> Result<Value> {
        let table = self.root_table(collection)?;
        upsert::upsert_row(
            &self.db,
            &self.registry,
            UpsertArgs {
                table,
                data,
                id: Some(id),
                locale,
            },
        )
        .await
    }

    pub async fn find_by_id(
        &self,
        collection: &str,
        id: &Value,
        locale: Option<&str>,
    ) -> Result<Option<Value>> {
        let table = self.root_table(collection)?;
        let mut tx = self.db.begin().await?;
        let found = upsert::find_row(&mut tx, &self.registry, table, id, locale).await;
        match found {
            Ok(document) => {
                tx.commit().await?;
                Ok(document)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(error = %rollback_error, "Rollback failed after read error");
                }
                Err(e)
            }
        }
    }

    /// Delete a document and, by cascade, every row below it
    pub async fn delete(&self, collection: &str, id: &Value) -> Result<()> {
        let table = self.root_table(collection)?;
        let mut tx = self.db.begin().await?;
        match upsert::delete_row(&mut tx, &self.registry, table, id).await {
            Ok(true) => tx.commit().await,
            Ok(false) => {
                tx.rollback().await?;
                Err(DocumentStoreError::document_not_found(format!(
                    "{} '{}'",
                    collection, id
                )))
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(error = %rollback_error, "Rollback failed after delete error");
                }
                Err(e)
            }
        }
    }
}
