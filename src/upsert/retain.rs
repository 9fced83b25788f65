//! Other-locale rows below replaced rows
//!
//! Replacing a collection deletes its rows and everything below them. When a
//! replaced row is written again under the same id, its locale-scoped children
//! from other locales (locale side rows, localized nested arrays and their
//! descendants) are read before the delete and inserted again once the new rows
//! exist.

use serde_json::Value;

use crate::error::Result;
use crate::naming;
use crate::schema::SchemaRegistry;
use crate::store::{Predicate, Row, TableAccess, value_text};

use super::write::PendingRow;

/// Rows to put back, paired with their table
pub(crate) type Retained = Vec<(String, Row)>;

/// Read the rows of other locales below every pending row that keeps its
/// supplied id
pub(crate) async fn other_locale_rows<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    rows: &[PendingRow],
    locale: Option<&str>,
) -> Result<Retained> {
    let Some(locale) = locale else {
        return Ok(Vec::new());
    };

    // (table, ids, whether only other-locale children are taken)
    let mut frontier: Vec<(String, Vec<Value>, bool)> = Vec::new();
    for row in rows.iter().filter(|r| r.supplied_id) {
        let Some(id) = row.values.get(naming::ID).cloned() else {
            continue;
        };
        match frontier.iter_mut().find(|(table, _, _)| *table == row.table) {
            Some((_, ids, _)) => ids.push(id),
            None => frontier.push((row.table.clone(), vec![id], true)),
        }
    }

    let mut retained = Vec::new();
    while let Some((table, ids, other_locale_only)) = frontier.pop() {
        for relation in registry.child_relations(&table) {
            let child = registry.table(&relation.child_table)?;
            let locale_column = child.locale_column();
            if other_locale_only && locale_column.is_none() {
                continue;
            }

            let found = tx
                .select_rows(
                    &child.name,
                    &Predicate::is_in(relation.foreign_key.as_str(), ids.clone()),
                )
                .await?;
            let found: Vec<Row> = match locale_column {
                Some(column) if other_locale_only => found
                    .into_iter()
                    .filter(|r| {
                        r.get(column)
                            .and_then(value_text)
                            .is_some_and(|stored| stored != locale)
                    })
                    .collect(),
                _ => found,
            };
            if found.is_empty() {
                continue;
            }

            let child_ids: Vec<Value> = found
                .iter()
                .filter_map(|r| r.get(naming::ID))
                .filter(|id| !id.is_null())
                .cloned()
                .collect();
            if !child_ids.is_empty() {
                frontier.push((child.name.clone(), child_ids, false));
            }
            retained.extend(found.into_iter().map(|r| (child.name.clone(), r)));
        }
    }

    if !retained.is_empty() {
        tracing::debug!(rows = retained.len(), locale = %locale, "Retained rows of other locales");
    }
    Ok(retained)
}

/// Insert retained rows, shallowest tables first
pub(crate) async fn restore_rows<T: TableAccess + ?Sized>(
    tx: &mut T,
    registry: &SchemaRegistry,
    retained: Retained,
) -> Result<()> {
    let mut batches: Vec<(String, Vec<Row>)> = Vec::new();
    for (table, row) in retained {
        match batches.iter_mut().find(|(name, _)| *name == table) {
            Some((_, batch)) => batch.push(row),
            None => batches.push((table, vec![row])),
        }
    }
    batches.sort_by_key(|(table, _)| registry.depth(table));

    for (table, batch) in batches {
        tx.insert_rows(&table, batch).await?;
    }
    Ok(())
}
