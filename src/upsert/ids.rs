//! Supplied row ids
//!
//! Array and block rows keep the ids a document carries, so a document read in
//! one locale can be written back in another. Those ids are primary keys shared
//! by every locale and every document. Before anything is deleted, each supplied
//! id is looked up: a stored row this write replaces gives its id to the pending
//! row, a stored row that outlives the write (another locale of the same parent,
//! or a blocks field the document leaves alone) makes the pending row take a
//! fresh id, and a stored row under any other parent is a validation error.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::error::{DocumentStoreError, Result};
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::{Predicate, Row, TableAccess, value_text};

use super::delete::DeleteScope;
use super::write::{ParentRef, PendingRow};

fn pending_id(row: &PendingRow) -> Option<String> {
    row.values.get(naming::ID).and_then(value_text)
}

/// Resolve supplied ids against stored rows; returns how many were replaced
/// with fresh ids
pub(crate) async fn reconcile_ids<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    rows: &mut [PendingRow],
    scopes: &[DeleteScope],
    root_id: Option<&Value>,
    locale: Option<&str>,
) -> Result<usize> {
    let mut tables: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, row) in rows.iter().enumerate().filter(|(_, r)| r.supplied_id) {
        match tables.iter_mut().find(|(name, _)| *name == row.table) {
            Some((_, indices)) => indices.push(i),
            None => tables.push((row.table.clone(), vec![i])),
        }
    }
    if tables.is_empty() {
        return Ok(0);
    }
    tables.sort_by_key(|(table, _)| registry.depth(table));

    let root_id = root_id.and_then(value_text);
    // (table, supplied id) -> fresh id
    let mut renamed: HashMap<(String, String), String> = HashMap::new();

    for (table, indices) in &tables {
        let definition = registry.table(table)?;
        let parent_column = definition.parent_column().ok_or_else(|| {
            DocumentStoreError::invalid_configuration(format!("Table '{}' has no parent", table))
        })?;

        let mut seen = BTreeSet::new();
        for &i in indices {
            let id = pending_id(&rows[i]).unwrap_or_default();
            if !seen.insert(id.clone()) {
                return Err(DocumentStoreError::validation(format!(
                    "Field '{}': id '{}' appears more than once",
                    rows[i].path, id
                )));
            }
        }

        let ids = seen.iter().cloned().map(Value::String).collect();
        let stored: HashMap<String, Row> = tx
            .select_rows(table, &Predicate::is_in(naming::ID, ids))
            .await?
            .into_iter()
            .filter_map(|row| Some((row.get(naming::ID).and_then(value_text)?, row)))
            .collect();
        if stored.is_empty() {
            continue;
        }

        for &i in indices {
            let row = &rows[i];
            let Some(id) = pending_id(row) else {
                continue;
            };
            let Some(existing) = stored.get(&id) else {
                continue;
            };

            let (parent_id, parent_renamed) = match &row.parent {
                ParentRef::Root => (root_id.clone(), false),
                ParentRef::Row(parent) => {
                    let renamed_parent = definition
                        .parent
                        .as_ref()
                        .is_some_and(|t| renamed.contains_key(&(t.clone(), parent.clone())));
                    (Some(parent.clone()), renamed_parent)
                }
            };
            let existing_parent = existing.get(parent_column).and_then(value_text);
            if existing_parent.is_none() || existing_parent != parent_id {
                return Err(DocumentStoreError::validation(format!(
                    "Field '{}': id '{}' is already used by another row",
                    row.path, id
                )));
            }

            let outlives = parent_renamed
                || other_locale(registry, table, existing, locale)?
                || (row.parent == ParentRef::Root
                    && !covered(registry, table, existing, scopes)?);
            if outlives {
                renamed.insert((table.clone(), id), uuid::Uuid::new_v4().to_string());
            }
        }
    }

    if renamed.is_empty() {
        return Ok(0);
    }

    for row in rows.iter_mut() {
        if let ParentRef::Row(parent) = &row.parent {
            if let Some(parent_table) = registry.table(&row.table)?.parent.as_ref() {
                if let Some(fresh) = renamed.get(&(parent_table.clone(), parent.clone())) {
                    row.parent = ParentRef::Row(fresh.clone());
                }
            }
        }
        if !row.supplied_id {
            continue;
        }
        let Some(id) = pending_id(row) else {
            continue;
        };
        if let Some(fresh) = renamed.get(&(row.table.clone(), id)) {
            row.values
                .insert(naming::ID.to_string(), Value::String(fresh.clone()));
            row.supplied_id = false;
        }
    }

    tracing::debug!(renamed = renamed.len(), "Gave fresh ids to rows kept by another locale");
    Ok(renamed.len())
}

fn other_locale(
    registry: &SchemaRegistry,
    table: &str,
    existing: &Row,
    locale: Option<&str>,
) -> Result<bool> {
    let (Some(column), Some(locale)) = (registry.table(table)?.locale_column(), locale) else {
        return Ok(false);
    };
    Ok(existing
        .get(column)
        .and_then(value_text)
        .is_some_and(|stored| stored != locale))
}

/// Top-level rows go away only when one of the write's delete scopes covers them
fn covered(
    registry: &SchemaRegistry,
    table: &str,
    existing: &Row,
    scopes: &[DeleteScope],
) -> Result<bool> {
    for scope in scopes {
        if scope.covers(registry, table, existing)? {
            return Ok(true);
        }
    }
    Ok(false)
}
