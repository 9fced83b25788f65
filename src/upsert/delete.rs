//! Delete scopes
//!
//! An update replaces every nested collection present in the incoming document.
//! The decomposer describes what to clear as [`DeleteScope`]s; this module turns
//! them into predicates against the root row. Rows below a deleted array or block
//! row go with it through `ON DELETE CASCADE`, except block rows, which hang off
//! the root and are purged by path prefix instead.

use serde_json::Value;

use crate::error::{DocumentStoreError, Result};
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::{Predicate, Row, TableAccess, value_text};
use crate::types::TableKind;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeleteScope {
    /// Every row of `table` owned by the root row
    Children {
        table: String,
        locale: Option<String>,
    },
    /// Rows of `table` owned by the root row whose `path_column` is one of `paths`
    Paths {
        table: String,
        path_column: &'static str,
        paths: Vec<String>,
        locale: Option<String>,
    },
    /// Block rows of the root whose `_path` starts with `prefix`
    Subtree {
        prefix: String,
        locale: Option<String>,
    },
}

impl DeleteScope {
    /// Whether applying this scope removes `row`, a stored row of `table` owned
    /// by the root row
    pub(crate) fn covers(&self, registry: &SchemaRegistry, table: &str, row: &Row) -> Result<bool> {
        let definition = registry.table(table)?;
        let locale_matches = |locale: &Option<String>| match (locale, definition.locale_column()) {
            (Some(locale), Some(column)) => {
                row.get(column).and_then(value_text).as_deref() == Some(locale.as_str())
            }
            _ => true,
        };

        Ok(match self {
            DeleteScope::Children { table: t, locale } => t == table && locale_matches(locale),
            DeleteScope::Paths {
                table: t,
                path_column,
                paths,
                locale,
            } => {
                t == table
                    && row
                        .get(*path_column)
                        .and_then(value_text)
                        .is_some_and(|path| paths.contains(&path))
                    && locale_matches(locale)
            }
            DeleteScope::Subtree { prefix, locale } => {
                definition.kind == TableKind::Block
                    && row
                        .get(naming::PATH)
                        .and_then(value_text)
                        .is_some_and(|path| path.starts_with(prefix.as_str()))
                    && locale_matches(locale)
            }
        })
    }
}

fn owned_by(registry: &SchemaRegistry, table: &str, root_id: &Value) -> Result<Predicate> {
    let definition = registry.table(table)?;
    let column = definition.parent_column().ok_or_else(|| {
        DocumentStoreError::invalid_configuration(format!("Table '{}' has no parent", table))
    })?;
    Ok(Predicate::eq(column, root_id.clone()))
}

fn with_locale(
    registry: &SchemaRegistry,
    table: &str,
    predicate: Predicate,
    locale: Option<&str>,
) -> Result<Predicate> {
    match (locale, registry.table(table)?.locale_column()) {
        (Some(locale), Some(column)) => Ok(predicate.and(Predicate::eq(column, locale))),
        _ => Ok(predicate),
    }
}

/// Apply delete scopes for the root row `root_id` of `root_table`
pub(crate) async fn clear_scopes<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    root_table: &str,
    root_id: &Value,
    scopes: &[DeleteScope],
) -> Result<u64> {
    let mut deleted = 0;

    for scope in scopes {
        match scope {
            DeleteScope::Children { table, locale } => {
                let predicate = owned_by(registry, table, root_id)?;
                let predicate = with_locale(registry, table, predicate, locale.as_deref())?;
                deleted += tx.delete_rows(table, &predicate).await?;
            }
            DeleteScope::Paths {
                table,
                path_column,
                paths,
                locale,
            } => {
                let predicate = owned_by(registry, table, root_id)?.and(Predicate::is_in(
                    *path_column,
                    paths.iter().cloned().map(Value::String).collect(),
                ));
                let predicate = with_locale(registry, table, predicate, locale.as_deref())?;
                deleted += tx.delete_rows(table, &predicate).await?;
            }
            DeleteScope::Subtree { prefix, locale } => {
                for table in registry.block_tables(root_table) {
                    let predicate = Predicate::eq(naming::PARENT_ID, root_id.clone())
                        .and(Predicate::starts_with(naming::PATH, prefix.as_str()));
                    let predicate = with_locale(registry, table, predicate, locale.as_deref())?;
                    deleted += tx.delete_rows(table, &predicate).await?;
                }
            }
        }
    }

    tracing::debug!(
        table = %root_table,
        scopes = scopes.len(),
        deleted,
        "Cleared replaced nested rows"
    );
    Ok(deleted)
}

/// Delete a root row; descendants follow by cascade. Returns whether it existed.
pub async fn delete_row<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    table: &str,
    id: &Value,
) -> Result<bool> {
    registry.collection_for_table(table)?;
    let deleted = tx
        .delete_rows(table, &Predicate::eq(naming::ID, id.clone()))
        .await?;
    tracing::debug!(table = %table, id = %id, deleted, "Deleted document");
    Ok(deleted > 0)
}
