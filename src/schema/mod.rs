//! Schema synthesis
//!
//! Compiles collection field trees into the table, enum and relation definitions
//! held by a [`SchemaRegistry`]. The registry is built once by [`build_schema`] and
//! is read-only afterwards; share it through an `Arc`.

mod block;
pub mod relations;
mod table;
mod traverse;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::{IdType, LocalizationConfig, StoreConfig};
use crate::error::{DocumentStoreError, Result};
use crate::fields::{CollectionConfig, FieldDefinition};
use crate::naming;
use crate::sql::sanitize::validate_identifier;
use crate::types::{TableDefinition, TableKind};

pub use relations::{Cardinality, RelationDescriptor, RelationSet};
pub use traverse::{ManyNumber, TraverseFlags};

/// Collection entry of the registry
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSchema {
    pub slug: String,
    #[serde(rename = "rootTable")]
    pub root_table: String,
    pub fields: Vec<FieldDefinition>,
}

/// Relationship targets recorded for the join-table builder
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RelationshipTargets {
    pub targets: BTreeSet<String>,
    /// Some relationship field under this root is localized
    pub localized: bool,
}

/// Synthesis settings the row engine needs at request time
#[derive(Debug, Clone, Serialize)]
pub struct SchemaSettings {
    pub localization: Option<LocalizationConfig>,
    #[serde(rename = "idType")]
    pub id_type: IdType,
    pub timestamps: bool,
    #[serde(rename = "strictValidation")]
    pub strict_validation: bool,
}

impl SchemaSettings {
    fn from_config(config: &StoreConfig) -> Self {
        Self {
            localization: config.localization.clone(),
            id_type: config.id_type,
            timestamps: config.timestamps,
            strict_validation: config.strict_validation,
        }
    }
}

/// Everything synthesis produced: tables, enums, relations and collections
#[derive(Debug, Clone, Serialize)]
pub struct SchemaRegistry {
    pub tables: BTreeMap<String, TableDefinition>,
    pub enums: BTreeMap<String, Vec<String>>,
    /// Keyed by `relations_<table>`
    pub relations: BTreeMap<String, RelationSet>,
    /// Keyed by root table
    pub relationships: BTreeMap<String, RelationshipTargets>,
    pub collections: BTreeMap<String, CollectionSchema>,
    pub settings: SchemaSettings,
}

impl SchemaRegistry {
    /// Look up a table definition
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| DocumentStoreError::unknown_table(name))
    }

    pub fn collection(&self, slug: &str) -> Result<&CollectionSchema> {
        self.collections
            .get(slug)
            .ok_or_else(|| DocumentStoreError::collection_not_found(slug))
    }

    /// Collection whose root table is `table`
    pub fn collection_for_table(&self, table: &str) -> Result<&CollectionSchema> {
        self.collections
            .values()
            .find(|c| c.root_table == table)
            .ok_or_else(|| {
                DocumentStoreError::collection_not_found(format!("root table '{}'", table))
            })
    }

    /// Relation set owned by `table`
    pub fn relation_set(&self, table: &str) -> Option<&RelationSet> {
        self.relations.get(&naming::relations_name(table))
    }

    pub fn relation(&self, table: &str, key: &str) -> Option<&RelationDescriptor> {
        self.relation_set(table).and_then(|set| set.get(key))
    }

    /// One-to-many descriptors leaving `table`
    pub fn child_relations(&self, table: &str) -> Vec<&RelationDescriptor> {
        self.relation_set(table)
            .map(|set| set.many().collect())
            .unwrap_or_default()
    }

    /// Number of parent hops from `table` up to its root
    pub fn depth(&self, table: &str) -> usize {
        let mut depth = 0;
        let mut current = self.tables.get(table);
        while let Some(parent) = current.and_then(|t| t.parent.as_deref()) {
            depth += 1;
            current = self.tables.get(parent);
        }
        depth
    }

    /// Tables ordered so every parent precedes its children
    pub fn tables_in_dependency_order(&self) -> Vec<&TableDefinition> {
        let mut tables: Vec<&TableDefinition> = self.tables.values().collect();
        tables.sort_by_key(|t| (self.depth(&t.name), t.name.clone()));
        tables
    }

    pub fn localization(&self) -> Option<&LocalizationConfig> {
        self.settings.localization.as_ref()
    }

    /// Resolve the locale a request operates in; `None` when localization is off
    pub fn resolve_locale(&self, requested: Option<&str>) -> Result<Option<String>> {
        let Some(localization) = self.localization() else {
            return Ok(None);
        };
        match requested {
            None => Ok(Some(localization.default_locale.clone())),
            Some(locale) if localization.contains(locale) => Ok(Some(locale.to_string())),
            Some(locale) => Err(DocumentStoreError::validation(format!(
                "Unknown locale '{}'; configured locales are {:?}",
                locale, localization.locales
            ))),
        }
    }

    /// Block tables hanging off a root table
    pub fn block_tables(&self, root_table: &str) -> Vec<&str> {
        self.child_relations(root_table)
            .into_iter()
            .filter(|r| {
                self.tables
                    .get(&r.child_table)
                    .is_some_and(|t| t.kind == TableKind::Block)
            })
            .map(|r| r.child_table.as_str())
            .collect()
    }
}

/// Compile collections into a schema registry.
///
/// Fails with `InvalidConfiguration` on any configuration defect; nothing partial
/// is returned.
pub fn build_schema(config: &StoreConfig, collections: &[CollectionConfig]) -> Result<SchemaRegistry> {
    if let Some(localization) = &config.localization {
        validate_localization(localization)?;
    }
    for collection in collections {
        traverse::validate_field_tree(&collection.slug, &collection.fields)?;
    }

    let mut builder = traverse::SchemaBuilder::new(config);
    for collection in collections {
        builder.build_collection(collection)?;
    }

    let parts = builder.finish();
    let relations = relations::build_relations(&parts.tables, &parts.edges)?;

    let registry = SchemaRegistry {
        tables: parts.tables,
        enums: parts.enums,
        relations,
        relationships: parts.relationships,
        collections: parts.collections,
        settings: SchemaSettings::from_config(config),
    };
    validate_identifiers(&registry)?;

    tracing::debug!(
        tables = registry.tables.len(),
        enums = registry.enums.len(),
        collections = registry.collections.len(),
        "Schema synthesized"
    );

    Ok(registry)
}

fn validate_localization(localization: &LocalizationConfig) -> Result<()> {
    if localization.locales.is_empty() {
        return Err(DocumentStoreError::invalid_configuration(
            "Localization needs at least one locale",
        ));
    }
    for (i, locale) in localization.locales.iter().enumerate() {
        if locale.is_empty() {
            return Err(DocumentStoreError::invalid_configuration("Empty locale code"));
        }
        if localization.locales[..i].contains(locale) {
            return Err(DocumentStoreError::invalid_configuration(format!(
                "Duplicate locale '{}'",
                locale
            )));
        }
    }
    if !localization.contains(&localization.default_locale) {
        return Err(DocumentStoreError::invalid_configuration(format!(
            "Default locale '{}' is not one of {:?}",
            localization.default_locale, localization.locales
        )));
    }
    Ok(())
}

fn validate_identifiers(registry: &SchemaRegistry) -> Result<()> {
    let check = |name: &str| {
        validate_identifier(name).map_err(DocumentStoreError::invalid_configuration)
    };

    for (name, table) in &registry.tables {
        check(name)?;
        for column in &table.columns {
            check(&column.name)?;
        }
        for index in &table.indexes {
            check(&index.name)?;
        }
        for constraint in &table.unique_constraints {
            check(&constraint.name)?;
        }
    }
    for name in registry.enums.keys() {
        check(name)?;
    }
    Ok(())
}
