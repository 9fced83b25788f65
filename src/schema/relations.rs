//! Relation graph
//!
//! Built in a separate pass over the finished table map and the child edges
//! recorded during synthesis. Every child table gets a `One` descriptor to its
//! parent; every parent gets a `Many` descriptor per child edge and one to its
//! locale side-table. The row engine and the query path resolver find adjacent
//! tables through these descriptors only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, Result};
use crate::naming;
use crate::types::{TableDefinition, TableKind};

/// Parent-to-child edge recorded while synthesizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildEdge {
    pub parent_table: String,
    pub key: String,
    pub child_table: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub key: String,
    pub cardinality: Cardinality,
    #[serde(rename = "parentTable")]
    pub parent_table: String,
    #[serde(rename = "childTable")]
    pub child_table: String,
    /// Column on the child table referencing the parent's `id`
    #[serde(rename = "foreignKey")]
    pub foreign_key: String,
    #[serde(rename = "cascadeDelete")]
    pub cascade_delete: bool,
    /// Locale column of the child table, if its rows are locale-scoped
    #[serde(rename = "localeColumn", skip_serializing_if = "Option::is_none")]
    pub locale_column: Option<String>,
}

/// Named relations of one table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationSet {
    pub table: String,
    pub relations: BTreeMap<String, RelationDescriptor>,
}

impl RelationSet {
    pub fn get(&self, key: &str) -> Option<&RelationDescriptor> {
        self.relations.get(key)
    }

    pub fn many(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations
            .values()
            .filter(|r| r.cardinality == Cardinality::Many)
    }

    fn insert(&mut self, descriptor: RelationDescriptor) -> Result<()> {
        match self.relations.get(&descriptor.key) {
            Some(existing) if existing.child_table == descriptor.child_table => Ok(()),
            Some(existing) => Err(DocumentStoreError::invalid_configuration(format!(
                "Relation '{}' of table '{}' points to both '{}' and '{}'",
                descriptor.key, self.table, existing.child_table, descriptor.child_table
            ))),
            None => {
                self.relations.insert(descriptor.key.clone(), descriptor);
                Ok(())
            }
        }
    }
}

fn descriptor(
    key: &str,
    cardinality: Cardinality,
    parent: &TableDefinition,
    child: &TableDefinition,
) -> RelationDescriptor {
    let foreign_key = child.foreign_keys.iter().find(|fk| fk.references_table == parent.name);
    RelationDescriptor {
        key: key.to_string(),
        cardinality,
        parent_table: parent.name.clone(),
        child_table: child.name.clone(),
        foreign_key: foreign_key
            .map(|fk| fk.column.clone())
            .unwrap_or_else(|| naming::PARENT_ID.to_string()),
        cascade_delete: foreign_key.is_some_and(|fk| fk.on_delete_cascade),
        locale_column: child.locale_column().map(String::from),
    }
}

/// Derive every table's relation set, keyed by `relations_<table>`
pub(crate) fn build_relations(
    tables: &BTreeMap<String, TableDefinition>,
    edges: &[ChildEdge],
) -> Result<BTreeMap<String, RelationSet>> {
    let lookup = |name: &str| {
        tables
            .get(name)
            .ok_or_else(|| DocumentStoreError::unknown_table(name))
    };

    let mut sets: BTreeMap<String, RelationSet> = tables
        .keys()
        .map(|name| {
            (
                name.clone(),
                RelationSet {
                    table: name.clone(),
                    relations: BTreeMap::new(),
                },
            )
        })
        .collect();

    for table in tables.values() {
        if let Some(parent_name) = &table.parent {
            let parent = lookup(parent_name)?;
            let key = match table.kind {
                TableKind::Select | TableKind::Numbers => naming::VALUE_PARENT_RELATION,
                _ => naming::PARENT_RELATION,
            };
            if let Some(set) = sets.get_mut(&table.name) {
                set.insert(descriptor(key, Cardinality::One, parent, table))?;
            }

            if table.kind == TableKind::Locales {
                if let Some(set) = sets.get_mut(parent_name) {
                    set.insert(descriptor(
                        naming::LOCALES_RELATION,
                        Cardinality::Many,
                        parent,
                        table,
                    ))?;
                }
            }
        }
    }

    for edge in edges {
        let parent = lookup(&edge.parent_table)?;
        let child = lookup(&edge.child_table)?;
        if let Some(set) = sets.get_mut(&edge.parent_table) {
            set.insert(descriptor(&edge.key, Cardinality::Many, parent, child))?;
        }
    }

    Ok(sets
        .into_values()
        .map(|set| (naming::relations_name(&set.table), set))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDefinition, ColumnType};

    fn root() -> TableDefinition {
        let mut table = TableDefinition::new("pages", TableKind::Root);
        table
            .add_column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .unwrap();
        table
    }

    fn child(name: &str, kind: TableKind, parent: &str) -> TableDefinition {
        let mut table = TableDefinition::new(name, kind);
        let column = match kind {
            TableKind::Select | TableKind::Numbers => naming::VALUE_PARENT_ID,
            _ => naming::PARENT_ID,
        };
        table
            .add_parent_reference(column, ColumnType::Integer, parent)
            .unwrap();
        table
    }

    fn tables(list: Vec<TableDefinition>) -> BTreeMap<String, TableDefinition> {
        list.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    #[test]
    fn test_parent_and_child_descriptors() {
        let tables = tables(vec![
            root(),
            child("pages_items", TableKind::Array, "pages"),
            child("pages_locales", TableKind::Locales, "pages"),
            child("pages_numbers", TableKind::Numbers, "pages"),
        ]);
        let edges = vec![
            ChildEdge {
                parent_table: "pages".into(),
                key: "items".into(),
                child_table: "pages_items".into(),
            },
            ChildEdge {
                parent_table: "pages".into(),
                key: "_numbers".into(),
                child_table: "pages_numbers".into(),
            },
        ];

        let relations = build_relations(&tables, &edges).unwrap();

        let pages = &relations["relations_pages"];
        let many: Vec<&str> = pages.many().map(|r| r.key.as_str()).collect();
        assert_eq!(many, vec!["_locales", "_numbers", "items"]);
        assert!(pages.get("items").unwrap().cascade_delete);
        assert_eq!(pages.get("_numbers").unwrap().foreign_key, "parent_id");

        let items = &relations["relations_pages_items"];
        let parent = items.get("_parentID").unwrap();
        assert_eq!(parent.cardinality, Cardinality::One);
        assert_eq!(parent.parent_table, "pages");

        let numbers = &relations["relations_pages_numbers"];
        assert!(numbers.get("parent").is_some());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let tables = tables(vec![root(), child("pages_blocks_hero", TableKind::Block, "pages")]);
        let edge = ChildEdge {
            parent_table: "pages".into(),
            key: "_blocks_hero".into(),
            child_table: "pages_blocks_hero".into(),
        };

        let relations = build_relations(&tables, &[edge.clone(), edge]).unwrap();
        assert_eq!(relations["relations_pages"].many().count(), 1);
    }

    #[test]
    fn test_conflicting_edges_fail() {
        let tables = tables(vec![
            root(),
            child("pages_a", TableKind::Array, "pages"),
            child("pages_b", TableKind::Array, "pages"),
        ]);
        let edges = vec![
            ChildEdge {
                parent_table: "pages".into(),
                key: "a".into(),
                child_table: "pages_a".into(),
            },
            ChildEdge {
                parent_table: "pages".into(),
                key: "a".into(),
                child_table: "pages_b".into(),
            },
        ];
        assert!(build_relations(&tables, &edges).is_err());
    }
}
