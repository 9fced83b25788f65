//! Row upsert engine
//!
//! Writes a nested document into its synthesized tables inside one transaction
//! and reads it back. Creating inserts the root row, its locale row and then every
//! descendant table in parent-before-child order. Updating patches the root row,
//! upserts the locale row for the request locale, clears the nested collections
//! present in the document and inserts their replacements. Rows of other locales
//! hanging below a replaced row that the document sends again survive the
//! replacement.

mod delete;
mod ids;
mod read;
mod retain;
mod write;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::config::IdType;
use crate::error::{DocumentStoreError, Result};
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::{Predicate, Row, TableAccess, Transaction, Transactional};
use crate::types::TableDefinition;

pub use delete::delete_row;
pub use read::find_row;

use write::{Decomposition, ParentRef, PendingRow};

/// Position of a field list inside the synthesized tables.
///
/// Mirrors the naming rules of schema synthesis so writes and reads land on the
/// same tables and columns the synthesizer produced.
#[derive(Debug, Clone)]
pub(crate) struct FieldScope<'r> {
    /// Table holding inline columns of the current row
    pub table: &'r TableDefinition,
    /// Locale side-table of `table`, if it has one
    pub locales: Option<&'r TableDefinition>,
    /// Name scope for nested array and select tables
    pub scope: String,
    pub column_prefix: String,
    pub field_prefix: String,
    pub force_localized: bool,
    /// Document path of the current row, e.g. `items.0.`
    pub path_prefix: String,
}

impl<'r> FieldScope<'r> {
    pub fn for_row(
        registry: &'r SchemaRegistry,
        table: &'r TableDefinition,
        path_prefix: String,
    ) -> Self {
        Self {
            table,
            locales: registry
                .tables
                .get(&naming::locales_table_name(&table.name)),
            scope: table.name.clone(),
            column_prefix: String::new(),
            field_prefix: String::new(),
            force_localized: false,
            path_prefix,
        }
    }

    /// Scope for the fields of a named group or named tab
    pub fn nested_group(&self, name: &str, localized: bool) -> Self {
        let column = naming::column_name(&self.column_prefix, name);
        Self {
            table: self.table,
            locales: self.locales,
            scope: naming::group_scope(&self.table.name, &column),
            column_prefix: format!("{}_", column),
            field_prefix: format!("{}{}_", self.field_prefix, name),
            force_localized: self.force_localized || localized,
            path_prefix: format!("{}{}.", self.path_prefix, name),
        }
    }

    /// Whether a field lands in the locale side-table; `locale` is `None` when
    /// localization is off
    pub fn is_localized(&self, localized: bool, locale: Option<&str>) -> bool {
        locale.is_some() && (localized || self.force_localized)
    }

    /// Absolute document path of a field in this scope
    pub fn path(&self, name: &str) -> String {
        format!("{}{}", self.path_prefix, name)
    }
}

/// Arguments of one upsert
#[derive(Debug, Clone, Copy)]
pub struct UpsertArgs<'a> {
    /// Root table of the collection
    pub table: &'a str,
    pub data: &'a Value,
    /// Existing document id; `None` creates a new document
    pub id: Option<&'a Value>,
    pub locale: Option<&'a str>,
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Upsert a document in its own transaction.
///
/// Commits on success. On any error, including validation errors raised before
/// the first write, the transaction is rolled back and nothing is persisted.
pub async fn upsert_row<D: Transactional>(
    db: &D,
    registry: &SchemaRegistry,
    args: UpsertArgs<'_>,
) -> Result<Value> {
    let mut tx = db.begin().await?;
    match upsert_row_in(&mut tx, registry, args).await {
        Ok(document) => {
            tx.commit().await?;
            Ok(document)
        }
        Err(e) => {
            tracing::debug!(table = %args.table, error = %e, "Upsert failed, rolling back");
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!(error = %rollback_error, "Rollback failed after upsert error");
            }
            Err(e)
        }
    }
}

/// Upsert a document inside a caller-owned transaction
pub async fn upsert_row_in<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    args: UpsertArgs<'_>,
) -> Result<Value> {
    let root = registry.table(args.table)?;
    let collection = registry.collection_for_table(args.table)?;
    let locale = registry.resolve_locale(args.locale)?;
    let data = args
        .data
        .as_object()
        .ok_or_else(|| DocumentStoreError::validation("Document must be a JSON object"))?;

    let mut plan = write::decompose(registry, root, &collection.fields, data, locale.as_deref())?;
    tracing::debug!(
        table = %root.name,
        rows = plan.rows.len(),
        scopes = plan.scopes.len(),
        "Decomposed document"
    );

    let locale_ref = locale.as_deref();
    let id = match args.id {
        Some(id) => {
            update_root(tx, registry, root, id, &plan, locale_ref).await?;
            ids::reconcile_ids(tx, registry, &mut plan.rows, &plan.scopes, Some(id), locale_ref)
                .await?;
            let retained = retain::other_locale_rows(tx, registry, &plan.rows, locale_ref).await?;
            delete::clear_scopes(tx, registry, &root.name, id, &plan.scopes).await?;
            insert_descendants(tx, registry, id, plan.rows).await?;
            retain::restore_rows(tx, registry, retained).await?;
            id.clone()
        }
        None => {
            ids::reconcile_ids(tx, registry, &mut plan.rows, &plan.scopes, None, locale_ref)
                .await?;
            let id = insert_root(tx, registry, root, &plan, locale_ref).await?;
            insert_descendants(tx, registry, &id, plan.rows).await?;
            id
        }
    };

    find_row(tx, registry, &root.name, &id, locale_ref)
        .await?
        .ok_or_else(|| {
            DocumentStoreError::document_not_found(format!("{} '{}'", collection.slug, id))
        })
}

async fn insert_root<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    root: &TableDefinition,
    plan: &Decomposition,
    locale: Option<&str>,
) -> Result<Value> {
    let mut values = plan.root.clone();
    if registry.settings.timestamps {
        let now = now();
        values.insert(naming::CREATED_AT.to_string(), now.clone());
        values.insert(naming::UPDATED_AT.to_string(), now);
    }
    if registry.settings.id_type == IdType::Uuid {
        values.insert(
            naming::ID.to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }

    let inserted = tx.insert_rows(&root.name, vec![values]).await?;
    let id = inserted
        .first()
        .and_then(|row| row.get(naming::ID))
        .filter(|id| !id.is_null())
        .cloned()
        .ok_or_else(|| {
            DocumentStoreError::database(format!("Insert into '{}' returned no id", root.name))
        })?;
    tracing::debug!(table = %root.name, id = %id, "Inserted root row");

    if let Some(locale) = locale {
        if !plan.root_locale.is_empty() {
            let mut locale_row = plan.root_locale.clone();
            locale_row.insert(naming::LOCALE.to_string(), Value::from(locale));
            locale_row.insert(naming::PARENT_ID.to_string(), id.clone());
            tx.insert_rows(&naming::locales_table_name(&root.name), vec![locale_row])
                .await?;
        }
    }

    Ok(id)
}

async fn update_root<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    root: &TableDefinition,
    id: &Value,
    plan: &Decomposition,
    locale: Option<&str>,
) -> Result<()> {
    let by_id = Predicate::eq(naming::ID, id.clone());
    if tx.select_rows(&root.name, &by_id).await?.is_empty() {
        return Err(DocumentStoreError::document_not_found(format!(
            "{} '{}'",
            root.name, id
        )));
    }

    let mut values = plan.root.clone();
    if registry.settings.timestamps {
        values.insert(naming::UPDATED_AT.to_string(), now());
    }
    if !values.is_empty() {
        tx.update_rows(&root.name, values, &by_id).await?;
    }

    if let Some(locale) = locale {
        if !plan.root_locale.is_empty() {
            let locales_table = naming::locales_table_name(&root.name);
            let scope = Predicate::eq(naming::PARENT_ID, id.clone())
                .and(Predicate::eq(naming::LOCALE, locale));

            if tx.select_rows(&locales_table, &scope).await?.is_empty() {
                let mut locale_row = plan.root_locale.clone();
                locale_row.insert(naming::LOCALE.to_string(), Value::from(locale));
                locale_row.insert(naming::PARENT_ID.to_string(), id.clone());
                tx.insert_rows(&locales_table, vec![locale_row]).await?;
            } else {
                tx.update_rows(&locales_table, plan.root_locale.clone(), &scope)
                    .await?;
            }
        }
    }

    tracing::debug!(table = %root.name, id = %id, "Updated root row");
    Ok(())
}

/// Insert pending rows table by table, shallowest tables first
async fn insert_descendants<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    root_id: &Value,
    rows: Vec<PendingRow>,
) -> Result<()> {
    let mut batches: Vec<(String, Vec<Row>)> = Vec::new();

    for PendingRow {
        table,
        parent,
        mut values,
        ..
    } in rows
    {
        let definition = registry.table(&table)?;
        let column = definition.parent_column().ok_or_else(|| {
            DocumentStoreError::invalid_configuration(format!("Table '{}' has no parent", table))
        })?;
        let parent_id = match parent {
            ParentRef::Root => root_id.clone(),
            ParentRef::Row(id) => Value::String(id),
        };
        values.insert(column.to_string(), parent_id);

        match batches.iter_mut().find(|(name, _)| *name == table) {
            Some((_, batch)) => batch.push(values),
            None => batches.push((table, vec![values])),
        }
    }

    batches.sort_by_key(|(table, _)| registry.depth(table));

    for (table, batch) in batches {
        let count = batch.len();
        tx.insert_rows(&table, batch).await?;
        tracing::debug!(table = %table, rows = count, "Inserted nested rows");
    }
    Ok(())
}
