//! In-process storage handle
//!
//! Keeps every synthesized table as a vector of JSON rows and enforces the same
//! constraints the generated DDL declares: primary keys, NOT NULL, enum and boolean
//! checks, unique constraints and indexes, and foreign keys with cascading deletes.
//! A transaction holds the store lock and works on a copy of the state, which
//! replaces the shared state on commit and is dropped on rollback.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Predicate, Row, TableAccess, Transaction, Transactional, value_text};
use crate::error::{DocumentStoreError, Result};
use crate::schema::SchemaRegistry;
use crate::types::{ColumnType, TableDefinition};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    tables: BTreeMap<String, Vec<Row>>,
    /// Last value handed out per SERIAL table
    sequences: BTreeMap<String, i64>,
}

impl MemoryState {
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Shared in-memory database for one schema registry
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    registry: Arc<SchemaRegistry>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Committed rows of `table`
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().await.rows(table).to_vec()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.state.lock().await.rows(table).len()
    }

    /// Copy of the whole committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Transactional for MemoryDatabase {
    type Transaction = MemoryTransaction;

    /// Waits for any open transaction; transactions run one at a time
    async fn begin(&self) -> Result<MemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction {
            guard,
            working,
            registry: Arc::clone(&self.registry),
        })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    registry: Arc<SchemaRegistry>,
}

fn same(a: Option<&Value>, b: &Value) -> bool {
    match (a.and_then(value_text), value_text(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn matches(row: &Row, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq(column, value) => same(row.get(column), value),
        Predicate::In(column, values) => values.iter().any(|v| same(row.get(column), v)),
        Predicate::IsNull(column) => row.get(column).is_none_or(Value::is_null),
        Predicate::StartsWith(column, prefix) => row
            .get(column)
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with(prefix.as_str())),
        Predicate::And(parts) => parts.iter().all(|p| matches(row, p)),
    }
}

fn check_known_columns<'c>(
    definition: &TableDefinition,
    columns: impl IntoIterator<Item = &'c str>,
) -> Result<()> {
    for column in columns {
        if !definition.has_column(column) {
            return Err(DocumentStoreError::database(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                column, definition.name
            )));
        }
    }
    Ok(())
}

impl MemoryTransaction {
    /// Rows of `table` in this transaction's view
    pub fn rows(&self, table: &str) -> &[Row] {
        self.working.rows(table)
    }

    fn next_serial(&mut self, table: &str) -> i64 {
        let sequence = self.working.sequences.entry(table.to_string()).or_insert(0);
        *sequence += 1;
        *sequence
    }

    fn observe_serial(&mut self, table: &str, value: &Value) {
        if let Some(n) = value.as_i64() {
            let sequence = self.working.sequences.entry(table.to_string()).or_insert(0);
            *sequence = (*sequence).max(n);
        }
    }

    /// Check `row` against the declared constraints of `definition`, where
    /// `rows` is the table content the row must be consistent with and `skip`
    /// the row's own position in it
    fn check_row(
        &self,
        definition: &TableDefinition,
        row: &Row,
        rows: &[Row],
        skip: Option<usize>,
    ) -> Result<()> {
        let table = &definition.name;

        for column in &definition.columns {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            if value.is_null() {
                if !column.nullable {
                    return Err(DocumentStoreError::constraint(format!(
                        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                        column.name, table
                    )));
                }
                continue;
            }

            let valid = match &column.column_type {
                ColumnType::Boolean => matches!(value.as_i64(), Some(0 | 1)),
                ColumnType::Enum { values, .. } => {
                    value.as_str().is_some_and(|v| values.iter().any(|e| e == v))
                }
                _ => true,
            };
            if !valid {
                return Err(DocumentStoreError::constraint(format!(
                    "new row for relation \"{}\" violates check constraint on \"{}\": {}",
                    table, column.name, value
                )));
            }
        }

        for fk in &definition.foreign_keys {
            let value = row.get(&fk.column).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            let exists = self
                .working
                .rows(&fk.references_table)
                .iter()
                .any(|parent| same(parent.get(&fk.references_column), value));
            if !exists {
                return Err(DocumentStoreError::constraint(format!(
                    "insert or update on table \"{}\" violates foreign key constraint: \
                     key ({})=({}) is not present in table \"{}\"",
                    table, fk.column, value, fk.references_table
                )));
            }
        }

        let primary: Vec<String> = definition
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        let unique_sets = std::iter::once((format!("{}_pkey", table), primary))
            .chain(
                definition
                    .unique_constraints
                    .iter()
                    .map(|u| (u.name.clone(), u.columns.clone())),
            )
            .chain(
                definition
                    .indexes
                    .iter()
                    .filter(|i| i.unique)
                    .map(|i| (i.name.clone(), i.columns.clone())),
            );

        for (name, columns) in unique_sets {
            if columns.is_empty() {
                continue;
            }
            let Some(key) = columns
                .iter()
                .map(|c| row.get(c).and_then(value_text))
                .collect::<Option<Vec<String>>>()
            else {
                // NULLs never collide
                continue;
            };

            let duplicate = rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && columns
                        .iter()
                        .zip(&key)
                        .all(|(c, k)| other.get(c).and_then(value_text).as_ref() == Some(k))
            });
            if duplicate {
                return Err(DocumentStoreError::constraint(format!(
                    "duplicate key value violates unique constraint \"{}\": ({})=({})",
                    name,
                    columns.join(", "),
                    key.join(", ")
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TableAccess for MemoryTransaction {
    async fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let registry = Arc::clone(&self.registry);
        let definition = registry.table(table)?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            check_known_columns(definition, row.keys().map(String::as_str))?;

            let mut stored = Row::new();
            for column in &definition.columns {
                let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
                let value = match (&column.column_type, value) {
                    (ColumnType::Serial, Value::Null) => Value::from(self.next_serial(table)),
                    (ColumnType::Serial, value) => {
                        self.observe_serial(table, &value);
                        value
                    }
                    (_, value) => value,
                };
                stored.insert(column.name.clone(), value);
            }

            self.check_row(definition, &stored, self.working.rows(table), None)?;
            self.working
                .tables
                .entry(table.to_string())
                .or_default()
                .push(stored.clone());
            inserted.push(stored);
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
        let registry = Arc::clone(&self.registry);
        let definition = registry.table(table)?;
        check_known_columns(definition, values.keys().map(String::as_str))?;
        check_known_columns(definition, predicate.columns())?;

        let mut candidate = self.working.rows(table).to_vec();
        let mut changed = Vec::new();
        for (i, row) in candidate.iter_mut().enumerate() {
            if matches(row, predicate) {
                for (column, value) in &values {
                    row.insert(column.clone(), value.clone());
                }
                changed.push(i);
            }
        }

        for &i in &changed {
            self.check_row(definition, &candidate[i], &candidate, Some(i))?;
        }

        self.working.tables.insert(table.to_string(), candidate);
        Ok(changed.len() as u64)
    }

    async fn delete_rows(&mut self, table: &str, predicate: &Predicate) -> Result<u64> {
        let registry = Arc::clone(&self.registry);
        let definition = registry.table(table)?;
        check_known_columns(definition, predicate.columns())?;

        let rows = self.working.tables.remove(table).unwrap_or_default();
        let (removed, kept): (Vec<Row>, Vec<Row>) =
            rows.into_iter().partition(|row| matches(row, predicate));
        self.working.tables.insert(table.to_string(), kept);
        let count = removed.len() as u64;

        // Cascade through every foreign key pointing at a table that lost rows
        let mut worklist = vec![(table.to_string(), removed)];
        while let Some((parent, removed)) = worklist.pop() {
            if removed.is_empty() {
                continue;
            }
            for child in registry.tables.values() {
                for fk in child
                    .foreign_keys
                    .iter()
                    .filter(|fk| fk.references_table == parent && fk.on_delete_cascade)
                {
                    let keys: Vec<Value> = removed
                        .iter()
                        .filter_map(|r| r.get(&fk.references_column).cloned())
                        .collect();
                    let cascade = Predicate::is_in(fk.column.clone(), keys);

                    let rows = self.working.tables.remove(&child.name).unwrap_or_default();
                    let (gone, kept): (Vec<Row>, Vec<Row>) =
                        rows.into_iter().partition(|row| matches(row, &cascade));
                    self.working.tables.insert(child.name.clone(), kept);
                    worklist.push((child.name.clone(), gone));
                }
            }
        }

        Ok(count)
    }

    async fn select_rows(&mut self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        let registry = Arc::clone(&self.registry);
        let definition = registry.table(table)?;
        check_known_columns(definition, predicate.columns())?;

        Ok(self
            .working
            .rows(table)
            .iter()
            .filter(|row| matches(row, predicate))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self) -> Result<()> {
        let MemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::fields::{CollectionConfig, FieldDefinition as F};
    use crate::schema::build_schema;
    use serde_json::json;

    fn database() -> MemoryDatabase {
        let config = StoreConfig::builder("memory://").timestamps(false).build();
        let registry = build_schema(
            &config,
            &[CollectionConfig::new(
                "posts",
                vec![
                    F::text("title").required(),
                    F::text("slug").unique(),
                    F::checkbox("draft"),
                    F::array("tags", vec![F::text("label")]),
                ],
            )],
        )
        .unwrap();
        MemoryDatabase::new(Arc::new(registry))
    }

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    // =========================================================================
    // Inserts and constraints
    // =========================================================================

    #[tokio::test]
    async fn test_insert_assigns_serial_ids() {
        let db = database();
        let mut tx = db.begin().await.unwrap();

        let rows = tx
            .insert_rows(
                "posts",
                vec![row(json!({"title": "a"})), row(json!({"title": "b"}))],
            )
            .await
            .unwrap();

        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
        assert_eq!(rows[1]["slug"], Value::Null);
        tx.commit().await.unwrap();
        assert_eq!(db.row_count("posts").await, 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_violations() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        tx.insert_rows("posts", vec![row(json!({"title": "a", "slug": "a"}))])
            .await
            .unwrap();

        let missing = tx.insert_rows("posts", vec![row(json!({"slug": "b"}))]).await;
        assert!(matches!(missing, Err(DocumentStoreError::Constraint(_))));

        let duplicate = tx
            .insert_rows("posts", vec![row(json!({"title": "b", "slug": "a"}))])
            .await;
        assert!(matches!(duplicate, Err(DocumentStoreError::Constraint(_))));

        let boolean = tx
            .insert_rows("posts", vec![row(json!({"title": "b", "draft": 2}))])
            .await;
        assert!(matches!(boolean, Err(DocumentStoreError::Constraint(_))));

        let orphan = tx
            .insert_rows(
                "posts_tags",
                vec![row(json!({"id": "t1", "_order": 0, "_parent_id": 99}))],
            )
            .await;
        assert!(matches!(orphan, Err(DocumentStoreError::Constraint(_))));

        let unknown = tx.insert_rows("posts", vec![row(json!({"title": "c", "body": "x"}))]).await;
        assert!(matches!(unknown, Err(DocumentStoreError::Database(_))));

        let table = tx.insert_rows("nope", vec![]).await;
        assert!(matches!(table, Err(DocumentStoreError::UnknownTable(_))));
    }

    #[tokio::test]
    async fn test_null_unique_values_do_not_collide() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        let rows = tx
            .insert_rows(
                "posts",
                vec![row(json!({"title": "a"})), row(json!({"title": "b"}))],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    // =========================================================================
    // Updates, deletes and selects
    // =========================================================================

    #[tokio::test]
    async fn test_update_and_select() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        tx.insert_rows("posts", vec![row(json!({"title": "a"}))])
            .await
            .unwrap();

        let changed = tx
            .update_rows("posts", row(json!({"title": "z"})), &Predicate::eq("id", "1"))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let rows = tx
            .select_rows("posts", &Predicate::eq("title", "z"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let cleared = tx
            .update_rows("posts", row(json!({"title": null})), &Predicate::all())
            .await;
        assert!(matches!(cleared, Err(DocumentStoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        tx.insert_rows("posts", vec![row(json!({"title": "a"}))])
            .await
            .unwrap();
        tx.insert_rows(
            "posts_tags",
            vec![
                row(json!({"id": "t1", "_order": 0, "_parent_id": 1})),
                row(json!({"id": "t2", "_order": 1, "_parent_id": 1})),
            ],
        )
        .await
        .unwrap();

        let deleted = tx.delete_rows("posts", &Predicate::eq("id", 1)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(tx.rows("posts_tags").is_empty());
    }

    #[tokio::test]
    async fn test_starts_with_is_literal() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        tx.insert_rows(
            "posts",
            vec![row(json!({"title": "a_b"})), row(json!({"title": "axb"}))],
        )
        .await
        .unwrap();

        let rows = tx
            .select_rows("posts", &Predicate::starts_with("title", "a_"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let db = database();
        let mut tx = db.begin().await.unwrap();
        tx.insert_rows("posts", vec![row(json!({"title": "a"}))])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.row_count("posts").await, 0);

        // Sequences roll back with the data
        let mut tx = db.begin().await.unwrap();
        let rows = tx
            .insert_rows("posts", vec![row(json!({"title": "b"}))])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(1));
    }
}
