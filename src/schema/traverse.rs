//! Field tree traversal
//!
//! A tagged walk over the field tree with an immutable [`TraverseContext`] per
//! level. Inline columns go into the [`TableDraft`] of the table being built;
//! nested tables are built recursively and land in the builder's table map. Flags
//! bubble back up and are merged at every return point.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{IdType, StoreConfig};
use crate::error::{DocumentStoreError, Result};
use crate::fields::{
    ArrayField, BlocksField, CollectionConfig, FieldAttributes, FieldDefinition,
    RelationshipField, SelectField,
};
use crate::naming;
use crate::types::{
    ColumnDefinition, ColumnType, IndexDefinition, TableDefinition, TableKind, UniqueConstraint,
};

use super::block::BlockShape;
use super::relations::ChildEdge;
use super::table::TableDraft;
use super::{CollectionSchema, RelationshipTargets};

/// Whether any hasMany number field was seen, and whether one of them is indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ManyNumber {
    #[default]
    None,
    Plain,
    Indexed,
}

/// Facts about a field list that the owning table needs after traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraverseFlags {
    /// A leaf was hoisted into the locale side-table
    pub has_localized_field: bool,
    pub has_localized_relationship_field: bool,
    pub has_many_number: ManyNumber,
    /// A hasMany number field stores one value list per locale
    pub has_localized_many_number: bool,
}

impl TraverseFlags {
    pub fn merge(&mut self, other: TraverseFlags) {
        self.has_localized_field |= other.has_localized_field;
        self.has_localized_relationship_field |= other.has_localized_relationship_field;
        self.has_many_number = self.has_many_number.max(other.has_many_number);
        self.has_localized_many_number |= other.has_localized_many_number;
    }
}

/// Position of a field list within the table tree
#[derive(Debug, Clone)]
pub(crate) struct TraverseContext {
    /// Base for nested table and enum names
    pub scope: String,
    pub column_prefix: String,
    /// Prefix of relation keys
    pub field_prefix: String,
    pub root_table: String,
    pub root_id_type: ColumnType,
    /// Set inside a localized named group or tab
    pub force_localized: bool,
    /// Set below any localized array, block or group
    pub localized_ancestor: bool,
}

impl TraverseContext {
    pub fn for_table(
        table: &str,
        root_table: &str,
        root_id_type: &ColumnType,
        localized_ancestor: bool,
    ) -> Self {
        Self {
            scope: table.to_string(),
            column_prefix: String::new(),
            field_prefix: String::new(),
            root_table: root_table.to_string(),
            root_id_type: root_id_type.clone(),
            force_localized: false,
            localized_ancestor,
        }
    }
}

/// Column type used to reference a table with primary key `id_type`
pub(crate) fn reference_type(id_type: &ColumnType) -> ColumnType {
    match id_type {
        ColumnType::Serial | ColumnType::Integer => ColumnType::Integer,
        _ => ColumnType::Text,
    }
}

/// Reject declarations no table layout can satisfy, before any table exists
pub(crate) fn validate_field_tree(path: &str, fields: &[FieldDefinition]) -> Result<()> {
    for field in fields {
        let field_path = match field.name() {
            Some(name) => format!("{}.{}", path, name),
            None => path.to_string(),
        };
        match field {
            FieldDefinition::Number(f) if f.has_many && f.attributes.unique => {
                return Err(DocumentStoreError::invalid_configuration(format!(
                    "Unique is not supported for hasMany number field '{}'",
                    field_path
                )));
            }
            FieldDefinition::Select(f) | FieldDefinition::Radio(f)
                if f.has_many && f.attributes.unique =>
            {
                return Err(DocumentStoreError::invalid_configuration(format!(
                    "Unique is not supported for hasMany select field '{}'",
                    field_path
                )));
            }
            FieldDefinition::Select(f) | FieldDefinition::Radio(f) if f.options.is_empty() => {
                return Err(DocumentStoreError::invalid_configuration(format!(
                    "Select field '{}' has no options",
                    field_path
                )));
            }
            FieldDefinition::Array(f) => validate_field_tree(&field_path, &f.fields)?,
            FieldDefinition::Blocks(f) => {
                for block in &f.blocks {
                    validate_field_tree(&format!("{}.{}", field_path, block.slug), &block.fields)?;
                }
            }
            FieldDefinition::Group(g) => validate_field_tree(&field_path, &g.fields)?,
            FieldDefinition::Tabs(t) => {
                for tab in &t.tabs {
                    let tab_path = match &tab.name {
                        Some(name) => format!("{}.{}", path, name),
                        None => path.to_string(),
                    };
                    validate_field_tree(&tab_path, &tab.fields)?;
                }
            }
            FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                validate_field_tree(&field_path, &l.fields)?
            }
            _ => {}
        }
    }
    Ok(())
}

/// Collect the block tables under `root_table` that some occurrence places below a
/// localized blocks field, array, block or group. A block table is shared by all
/// occurrences of its slug, so one localized occurrence scopes every row by locale.
pub(crate) fn scan_localized_blocks(
    root_table: &str,
    fields: &[FieldDefinition],
    force_localized: bool,
    localized_ancestor: bool,
    out: &mut BTreeSet<String>,
) {
    for field in fields {
        match field {
            FieldDefinition::Array(f) => {
                let localized = f.attributes.localized || force_localized;
                scan_localized_blocks(
                    root_table,
                    &f.fields,
                    false,
                    localized_ancestor || localized,
                    out,
                );
            }
            FieldDefinition::Blocks(f) => {
                let localized = f.attributes.localized || force_localized || localized_ancestor;
                for block in &f.blocks {
                    if localized {
                        out.insert(naming::block_table_name(root_table, &block.slug));
                    }
                    scan_localized_blocks(root_table, &block.fields, false, localized, out);
                }
            }
            FieldDefinition::Group(g) => scan_localized_blocks(
                root_table,
                &g.fields,
                force_localized || (g.name.is_some() && g.localized),
                localized_ancestor || (g.name.is_some() && g.localized),
                out,
            ),
            FieldDefinition::Tabs(t) => {
                for tab in &t.tabs {
                    let localized = tab.name.is_some() && tab.localized;
                    scan_localized_blocks(
                        root_table,
                        &tab.fields,
                        force_localized || localized,
                        localized_ancestor || localized,
                        out,
                    );
                }
            }
            FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                scan_localized_blocks(root_table, &l.fields, force_localized, localized_ancestor, out)
            }
            _ => {}
        }
    }
}

/// Accumulated synthesis output
pub(crate) struct SchemaParts {
    pub tables: BTreeMap<String, TableDefinition>,
    pub enums: BTreeMap<String, Vec<String>>,
    pub edges: Vec<ChildEdge>,
    pub relationships: BTreeMap<String, RelationshipTargets>,
    pub collections: BTreeMap<String, CollectionSchema>,
}

/// Owns every accumulator while collections are compiled
pub(crate) struct SchemaBuilder<'a> {
    config: &'a StoreConfig,
    tables: BTreeMap<String, TableDefinition>,
    reserved: BTreeSet<String>,
    enums: BTreeMap<String, Vec<String>>,
    edges: Vec<ChildEdge>,
    relationships: BTreeMap<String, RelationshipTargets>,
    collections: BTreeMap<String, CollectionSchema>,
    block_shapes: BTreeMap<String, BlockShape>,
    /// Block tables that at least one occurrence makes locale-scoped
    localized_blocks: BTreeSet<String>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(config: &'a StoreConfig) -> Self {
        let mut enums = BTreeMap::new();
        if let Some(localization) = &config.localization {
            enums.insert(
                naming::LOCALES_ENUM.to_string(),
                localization.locales.clone(),
            );
        }

        Self {
            config,
            tables: BTreeMap::new(),
            reserved: BTreeSet::new(),
            enums,
            edges: Vec::new(),
            relationships: BTreeMap::new(),
            collections: BTreeMap::new(),
            block_shapes: BTreeMap::new(),
            localized_blocks: BTreeSet::new(),
        }
    }

    pub fn finish(self) -> SchemaParts {
        SchemaParts {
            tables: self.tables,
            enums: self.enums,
            edges: self.edges,
            relationships: self.relationships,
            collections: self.collections,
        }
    }

    fn localization_enabled(&self) -> bool {
        self.config.localization.is_some()
    }

    fn is_localized(&self, ctx: &TraverseContext, localized: bool) -> bool {
        self.localization_enabled() && (localized || ctx.force_localized)
    }

    pub(crate) fn locales_enum_type(&self) -> ColumnType {
        let locales = self
            .config
            .localization
            .as_ref()
            .map(|l| l.locales.clone())
            .unwrap_or_default();
        ColumnType::enumeration(naming::LOCALES_ENUM, locales)
    }

    pub(crate) fn reserve(&mut self, table: &str) -> Result<()> {
        if !self.reserved.insert(table.to_string()) {
            return Err(DocumentStoreError::invalid_configuration(format!(
                "Duplicate table name '{}'",
                table
            )));
        }
        Ok(())
    }

    pub(crate) fn insert_table(&mut self, table: TableDefinition) {
        tracing::debug!(
            table = %table.name,
            kind = ?table.kind,
            columns = table.columns.len(),
            "Synthesized table"
        );
        self.tables.insert(table.name.clone(), table);
    }

    pub(crate) fn record_edge(&mut self, parent_table: &str, key: String, child_table: &str) {
        self.edges.push(ChildEdge {
            parent_table: parent_table.to_string(),
            key,
            child_table: child_table.to_string(),
        });
    }

    fn register_enum(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if self.enums.contains_key(name) {
            return Err(DocumentStoreError::invalid_configuration(format!(
                "Duplicate enum name '{}'",
                name
            )));
        }
        self.enums.insert(name.to_string(), values);
        Ok(())
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    pub fn build_collection(&mut self, collection: &CollectionConfig) -> Result<()> {
        let root = naming::root_table_name(&collection.slug);
        let id_type = match self.config.id_type {
            IdType::Serial => ColumnType::Serial,
            IdType::Uuid => ColumnType::Text,
        };

        let mut table = TableDefinition::new(&root, TableKind::Root);
        table.add_column(ColumnDefinition::new(naming::ID, id_type.clone()).primary_key())?;
        if self.config.timestamps {
            for column in [naming::CREATED_AT, naming::UPDATED_AT] {
                table.add_column(ColumnDefinition::new(column, ColumnType::Date).not_null())?;
                table.indexes.push(IndexDefinition::new(
                    format!("{}_{}_idx", root, column),
                    vec![column.to_string()],
                ));
            }
        }

        if self.localization_enabled() {
            scan_localized_blocks(&root, &collection.fields, false, false, &mut self.localized_blocks);
        }

        let flags = self.build_table(table, &collection.fields, &root, &id_type, false)?;
        tracing::debug!(
            collection = %collection.slug,
            root_table = %root,
            localized = flags.has_localized_field,
            localized_relationships = flags.has_localized_relationship_field,
            "Synthesized collection"
        );

        self.collections.insert(
            collection.slug.clone(),
            CollectionSchema {
                slug: collection.slug.clone(),
                root_table: root,
                fields: collection.fields.clone(),
            },
        );
        Ok(())
    }

    /// Build `table` from its seed columns plus `fields`, then its locale and
    /// many-number companions
    pub(crate) fn build_table(
        &mut self,
        table: TableDefinition,
        fields: &[FieldDefinition],
        root_table: &str,
        root_id_type: &ColumnType,
        localized_ancestor: bool,
    ) -> Result<TraverseFlags> {
        self.reserve(&table.name)?;

        let ctx = TraverseContext::for_table(&table.name, root_table, root_id_type, localized_ancestor);
        let mut draft = TableDraft::new(table);
        let flags = self.traverse_fields(&ctx, fields, &mut draft)?;

        let (table, locale_columns, locale_indexes) = draft.into_parts();
        if flags.has_localized_field && self.localization_enabled() {
            self.build_locales_table(&table, locale_columns, locale_indexes)?;
        }
        if flags.has_many_number != ManyNumber::None {
            self.build_numbers_table(&table, flags)?;
        }
        self.insert_table(table);

        Ok(flags)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub(crate) fn traverse_fields(
        &mut self,
        ctx: &TraverseContext,
        fields: &[FieldDefinition],
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        let mut flags = TraverseFlags::default();
        for field in fields {
            if field.attributes().is_some_and(|a| a.name == naming::ID) {
                continue;
            }
            flags.merge(self.traverse_field(ctx, field, draft)?);
        }
        Ok(flags)
    }

    fn traverse_field(
        &mut self,
        ctx: &TraverseContext,
        field: &FieldDefinition,
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        match field {
            FieldDefinition::Text(f)
            | FieldDefinition::Email(f)
            | FieldDefinition::Code(f)
            | FieldDefinition::Textarea(f) => {
                self.add_leaf(ctx, &f.attributes, ColumnType::Text, draft)
            }
            FieldDefinition::Number(f) if f.has_many => Ok(TraverseFlags {
                has_many_number: if f.attributes.index {
                    ManyNumber::Indexed
                } else {
                    ManyNumber::Plain
                },
                has_localized_many_number: self.is_localized(ctx, f.attributes.localized),
                ..Default::default()
            }),
            FieldDefinition::Number(f) => {
                self.add_leaf(ctx, &f.attributes, ColumnType::Numeric, draft)
            }
            FieldDefinition::RichText(f) | FieldDefinition::Json(f) => {
                self.add_leaf(ctx, &f.attributes, ColumnType::Json, draft)
            }
            FieldDefinition::Date(f) => self.add_leaf(ctx, &f.attributes, ColumnType::Date, draft),
            FieldDefinition::Point(f) => {
                tracing::debug!(field = %f.attributes.name, "Point field left to dialect extension");
                Ok(TraverseFlags::default())
            }
            FieldDefinition::Select(f) | FieldDefinition::Radio(f) => self.select(ctx, f, draft),
            FieldDefinition::Checkbox(f) => {
                self.add_leaf(ctx, &f.attributes, ColumnType::Boolean, draft)
            }
            FieldDefinition::Array(f) => self.array(ctx, f, draft),
            FieldDefinition::Blocks(f) => self.blocks(ctx, f),
            FieldDefinition::Group(g) => match &g.name {
                Some(name) => self.named_group(ctx, name, g.localized, &g.fields, draft),
                None => self.traverse_fields(ctx, &g.fields, draft),
            },
            FieldDefinition::Tabs(t) => {
                let mut flags = TraverseFlags::default();
                for tab in &t.tabs {
                    let tab_flags = match &tab.name {
                        Some(name) => {
                            self.named_group(ctx, name, tab.localized, &tab.fields, draft)?
                        }
                        None => self.traverse_fields(ctx, &tab.fields, draft)?,
                    };
                    flags.merge(tab_flags);
                }
                Ok(flags)
            }
            FieldDefinition::Row(l) | FieldDefinition::Collapsible(l) => {
                self.traverse_fields(ctx, &l.fields, draft)
            }
            FieldDefinition::Relationship(f) | FieldDefinition::Upload(f) => {
                Ok(self.relationship(ctx, f))
            }
            FieldDefinition::Unknown => Ok(TraverseFlags::default()),
        }
    }

    // =========================================================================
    // Variants
    // =========================================================================

    fn add_leaf(
        &mut self,
        ctx: &TraverseContext,
        attributes: &FieldAttributes,
        column_type: ColumnType,
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        let column = naming::column_name(&ctx.column_prefix, &attributes.name);
        let localized = self.is_localized(ctx, attributes.localized);

        let mut definition = ColumnDefinition::new(&column, column_type);
        if attributes.required && attributes.condition.is_none() {
            definition = definition.not_null();
        }
        draft.add_column(definition, localized)?;

        if attributes.unique || attributes.index {
            let unique = attributes.unique && !self.config.disable_unique;
            draft.add_index(&column, localized, unique);
        }

        Ok(TraverseFlags {
            has_localized_field: localized,
            ..Default::default()
        })
    }

    fn select(
        &mut self,
        ctx: &TraverseContext,
        field: &SelectField,
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        let attributes = &field.attributes;
        let enum_name = naming::enum_name(&ctx.scope, &ctx.column_prefix, &attributes.name);
        let values = field.values();
        self.register_enum(&enum_name, values.clone())?;
        let enum_type = ColumnType::enumeration(&enum_name, values);

        if !field.has_many {
            return self.add_leaf(ctx, attributes, enum_type, draft);
        }

        let field_name = format!("{}{}", ctx.field_prefix, attributes.name);
        let table_name = naming::nested_table_name(&ctx.scope, &field_name);
        let localized = self.is_localized(ctx, attributes.localized);
        let parent = draft.table();

        let mut table = TableDefinition::new(&table_name, TableKind::Select);
        table.add_column(ColumnDefinition::new(naming::ID, ColumnType::Serial).primary_key())?;
        table.add_column(
            ColumnDefinition::new(naming::VALUE_ORDER, ColumnType::Integer).not_null(),
        )?;
        table.add_parent_reference(
            naming::VALUE_PARENT_ID,
            reference_type(parent.id_type().unwrap_or(&ColumnType::Serial)),
            &parent.name,
        )?;
        table.add_column(ColumnDefinition::new(naming::SELECT_VALUE, enum_type))?;

        let parent_name = parent.name.clone();
        if localized {
            table.add_column(
                ColumnDefinition::new(naming::VALUE_LOCALE, self.locales_enum_type()).not_null(),
            )?;
            table.unique_constraints.push(UniqueConstraint::new(
                format!("{}_parent_order_locale", table_name),
                vec![naming::VALUE_PARENT_ID, naming::VALUE_ORDER, naming::VALUE_LOCALE],
            ));
        } else {
            table.unique_constraints.push(UniqueConstraint::new(
                format!("{}_parent_order", table_name),
                vec![naming::VALUE_PARENT_ID, naming::VALUE_ORDER],
            ));
        }
        table.indexes.push(IndexDefinition::new(
            format!("{}_parent_idx", table_name),
            vec![naming::VALUE_PARENT_ID.to_string()],
        ));
        if attributes.index {
            table.indexes.push(IndexDefinition::new(
                format!("{}_value_idx", table_name),
                vec![naming::SELECT_VALUE.to_string()],
            ));
        }

        self.reserve(&table_name)?;
        self.insert_table(table);
        self.record_edge(&parent_name, field_name, &table_name);

        Ok(TraverseFlags::default())
    }

    fn array(
        &mut self,
        ctx: &TraverseContext,
        field: &ArrayField,
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        let attributes = &field.attributes;
        let table_name = naming::nested_table_name(&ctx.scope, &attributes.name);
        let localized = self.is_localized(ctx, attributes.localized);
        let parent = draft.table();
        let parent_name = parent.name.clone();

        let mut table = TableDefinition::new(&table_name, TableKind::Array);
        table.add_column(ColumnDefinition::new(naming::ID, ColumnType::Text).primary_key())?;
        table.add_column(ColumnDefinition::new(naming::ORDER, ColumnType::Integer).not_null())?;
        table.add_parent_reference(
            naming::PARENT_ID,
            reference_type(parent.id_type().unwrap_or(&ColumnType::Serial)),
            &parent_name,
        )?;
        if localized {
            table.add_column(
                ColumnDefinition::new(naming::LOCALE, self.locales_enum_type()).not_null(),
            )?;
            table.unique_constraints.push(UniqueConstraint::new(
                format!("{}_parent_order_locale", table_name),
                vec![naming::PARENT_ID, naming::ORDER, naming::LOCALE],
            ));
        } else {
            table.unique_constraints.push(UniqueConstraint::new(
                format!("{}_parent_order", table_name),
                vec![naming::PARENT_ID, naming::ORDER],
            ));
        }
        table.indexes.push(IndexDefinition::new(
            format!("{}_parent_idx", table_name),
            vec![naming::PARENT_ID.to_string()],
        ));

        self.build_table(
            table,
            &field.fields,
            &ctx.root_table,
            &ctx.root_id_type,
            ctx.localized_ancestor || localized,
        )?;
        self.record_edge(
            &parent_name,
            format!("{}{}", ctx.field_prefix, attributes.name),
            &table_name,
        );

        Ok(TraverseFlags::default())
    }

    fn blocks(&mut self, ctx: &TraverseContext, field: &BlocksField) -> Result<TraverseFlags> {
        for block in &field.blocks {
            let table_name = naming::block_table_name(&ctx.root_table, &block.slug);
            let shape = BlockShape::of(block);
            let localized = self.localized_blocks.contains(&table_name);

            match self.block_shapes.get(&table_name).cloned() {
                Some(existing) if existing != shape => {
                    if self.config.strict_validation {
                        return Err(DocumentStoreError::invalid_configuration(format!(
                            "Block '{}' is reused under '{}' with a different shape",
                            block.slug, ctx.root_table
                        )));
                    }
                    tracing::warn!(
                        table = %table_name,
                        block = %block.slug,
                        "Reused block differs from its first occurrence; keeping the first shape"
                    );
                }
                Some(_) => {}
                None => {
                    // Recorded before recursion so a nested reuse compares against it
                    self.block_shapes.insert(table_name.clone(), shape);
                    let table = self.block_seed_table(&table_name, ctx, localized)?;
                    self.build_table(
                        table,
                        &block.fields,
                        &ctx.root_table,
                        &ctx.root_id_type,
                        ctx.localized_ancestor || localized,
                    )?;
                }
            }

            self.record_edge(
                &ctx.root_table,
                naming::block_relation_key(&block.slug),
                &table_name,
            );
        }

        Ok(TraverseFlags::default())
    }

    fn block_seed_table(
        &self,
        table_name: &str,
        ctx: &TraverseContext,
        localized: bool,
    ) -> Result<TableDefinition> {
        let mut table = TableDefinition::new(table_name, TableKind::Block);
        table.add_column(ColumnDefinition::new(naming::ID, ColumnType::Text).primary_key())?;
        table.add_column(ColumnDefinition::new(naming::ORDER, ColumnType::Integer).not_null())?;
        table.add_parent_reference(
            naming::PARENT_ID,
            reference_type(&ctx.root_id_type),
            &ctx.root_table,
        )?;
        table.add_column(ColumnDefinition::new(naming::PATH, ColumnType::Text).not_null())?;

        let mut unique = vec![naming::PARENT_ID, naming::PATH, naming::ORDER];
        if localized {
            table.add_column(
                ColumnDefinition::new(naming::LOCALE, self.locales_enum_type()).not_null(),
            )?;
            unique.push(naming::LOCALE);
        }
        table
            .unique_constraints
            .push(UniqueConstraint::new(format!("{}_parent_path_order", table_name), unique));
        for column in [naming::PARENT_ID, naming::PATH] {
            table.indexes.push(IndexDefinition::new(
                format!("{}{}_idx", table_name, column),
                vec![column.to_string()],
            ));
        }
        Ok(table)
    }

    fn named_group(
        &mut self,
        ctx: &TraverseContext,
        name: &str,
        localized: bool,
        fields: &[FieldDefinition],
        draft: &mut TableDraft,
    ) -> Result<TraverseFlags> {
        let column = naming::column_name(&ctx.column_prefix, name);
        let hoisted = self.localization_enabled() && localized;
        let nested = TraverseContext {
            scope: naming::group_scope(&draft.table().name, &column),
            column_prefix: format!("{}_", column),
            field_prefix: format!("{}{}_", ctx.field_prefix, name),
            root_table: ctx.root_table.clone(),
            root_id_type: ctx.root_id_type.clone(),
            force_localized: ctx.force_localized || localized,
            localized_ancestor: ctx.localized_ancestor || hoisted,
        };
        self.traverse_fields(&nested, fields, draft)
    }

    fn relationship(&mut self, ctx: &TraverseContext, field: &RelationshipField) -> TraverseFlags {
        let localized = self.is_localized(ctx, field.attributes.localized);
        let entry = self.relationships.entry(ctx.root_table.clone()).or_default();
        entry
            .targets
            .extend(field.relation_to.targets().into_iter().map(String::from));
        entry.localized |= localized;

        TraverseFlags {
            has_localized_relationship_field: localized,
            ..Default::default()
        }
    }
}
