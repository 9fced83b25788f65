//! Table drafts and companion tables
//!
//! A [`TableDraft`] collects the inline and locale-hoisted columns of one table
//! while its field list is traversed. Once traversal returns, the builder turns the
//! hoisted part into a `<table>_locales` side-table and, when hasMany number
//! fields were seen, adds a `<table>_numbers` table.

use crate::error::Result;
use crate::naming;
use crate::types::{
    ColumnDefinition, ColumnType, IndexDefinition, TableDefinition, TableKind, UniqueConstraint,
};

use super::traverse::{ManyNumber, SchemaBuilder, TraverseFlags, reference_type};

/// Table under construction
#[derive(Debug)]
pub(crate) struct TableDraft {
    table: TableDefinition,
    locale_columns: Vec<ColumnDefinition>,
    locale_indexes: Vec<IndexDefinition>,
}

impl TableDraft {
    pub fn new(table: TableDefinition) -> Self {
        Self {
            table,
            locale_columns: Vec::new(),
            locale_indexes: Vec::new(),
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    /// Add a column inline, or to the locale side-table when `localized`
    pub fn add_column(&mut self, column: ColumnDefinition, localized: bool) -> Result<()> {
        if localized {
            self.locale_columns.push(column);
            Ok(())
        } else {
            self.table.add_column(column)
        }
    }

    /// Index `<table>_<column>_idx` on whichever table holds the column
    pub fn add_index(&mut self, column: &str, localized: bool, unique: bool) {
        let owner = if localized {
            naming::locales_table_name(&self.table.name)
        } else {
            self.table.name.clone()
        };
        let mut index = IndexDefinition::new(
            format!("{}_{}_idx", owner, column),
            vec![column.to_string()],
        );
        if unique {
            index = index.unique();
        }

        if localized {
            self.locale_indexes.push(index);
        } else {
            self.table.indexes.push(index);
        }
    }

    pub fn into_parts(self) -> (TableDefinition, Vec<ColumnDefinition>, Vec<IndexDefinition>) {
        (self.table, self.locale_columns, self.locale_indexes)
    }
}

impl SchemaBuilder<'_> {
    pub(crate) fn build_locales_table(
        &mut self,
        parent: &TableDefinition,
        columns: Vec<ColumnDefinition>,
        indexes: Vec<IndexDefinition>,
    ) -> Result<()> {
        let name = naming::locales_table_name(&parent.name);
        self.reserve(&name)?;

        let mut table = TableDefinition::new(&name, TableKind::Locales);
        table.add_column(ColumnDefinition::new(naming::ID, ColumnType::Serial).primary_key())?;
        for column in columns {
            table.add_column(column)?;
        }
        table.add_column(
            ColumnDefinition::new(naming::LOCALE, self.locales_enum_type()).not_null(),
        )?;
        table.add_parent_reference(
            naming::PARENT_ID,
            reference_type(parent.id_type().unwrap_or(&ColumnType::Serial)),
            &parent.name,
        )?;
        table.unique_constraints.push(UniqueConstraint::new(
            format!("{}_locale_parent_id_unique", name),
            vec![naming::LOCALE, naming::PARENT_ID],
        ));
        table.indexes.extend(indexes);

        self.insert_table(table);
        Ok(())
    }

    pub(crate) fn build_numbers_table(
        &mut self,
        parent: &TableDefinition,
        flags: TraverseFlags,
    ) -> Result<()> {
        let name = naming::numbers_table_name(&parent.name);
        self.reserve(&name)?;

        let mut table = TableDefinition::new(&name, TableKind::Numbers);
        table.add_column(ColumnDefinition::new(naming::ID, ColumnType::Serial).primary_key())?;
        table.add_column(
            ColumnDefinition::new(naming::VALUE_ORDER, ColumnType::Integer).not_null(),
        )?;
        table.add_parent_reference(
            naming::VALUE_PARENT_ID,
            reference_type(parent.id_type().unwrap_or(&ColumnType::Serial)),
            &parent.name,
        )?;
        table.add_column(ColumnDefinition::new(naming::VALUE_PATH, ColumnType::Text).not_null())?;
        table.add_column(ColumnDefinition::new(naming::NUMBER_VALUE, ColumnType::Numeric))?;

        let mut indexed = vec![naming::VALUE_ORDER, naming::VALUE_PARENT_ID, naming::VALUE_PATH];
        if flags.has_localized_many_number {
            table.add_column(ColumnDefinition::new(
                naming::VALUE_LOCALE,
                self.locales_enum_type(),
            ))?;
            indexed.push(naming::VALUE_LOCALE);
        }
        if flags.has_many_number == ManyNumber::Indexed {
            indexed.push(naming::NUMBER_VALUE);
        }
        for column in indexed {
            table.indexes.push(IndexDefinition::new(
                format!("{}_{}_idx", name, column),
                vec![column.to_string()],
            ));
        }

        self.insert_table(table);
        self.record_edge(&parent.name, naming::NUMBERS_RELATION.to_string(), &name);
        Ok(())
    }
}
