//! Deterministic identifier derivation
//!
//! Every table, column, enum and relation name in a synthesized schema is a pure
//! function of the field path that produced it. Synthesis, the row engine and the
//! query path resolver all derive names through this module, so a name can always
//! be recomputed from `(ancestor chain, field name)` without rebuilding the schema.

/// Primary key column on every table
pub const ID: &str = "id";

/// Order column on array and block tables
pub const ORDER: &str = "_order";
/// Parent foreign key on array, block and locale tables
pub const PARENT_ID: &str = "_parent_id";
/// Logical document path on block tables
pub const PATH: &str = "_path";
/// Locale column on array, block and locale tables
pub const LOCALE: &str = "_locale";

/// Order column on select and number tables
pub const VALUE_ORDER: &str = "order";
/// Parent foreign key on select and number tables
pub const VALUE_PARENT_ID: &str = "parent_id";
/// Field path column on number tables
pub const VALUE_PATH: &str = "path";
/// Locale column on select and number tables
pub const VALUE_LOCALE: &str = "locale";
/// Value column on select tables
pub const SELECT_VALUE: &str = "value";
/// Value column on number tables
pub const NUMBER_VALUE: &str = "number";

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Enum holding every configured locale code
pub const LOCALES_ENUM: &str = "enum__locales";

/// Relation key pointing from a child table to its parent
pub const PARENT_RELATION: &str = "_parentID";
/// Relation key pointing from a select/number table to its parent
pub const VALUE_PARENT_RELATION: &str = "parent";
/// Relation key pointing from a table to its locale side-table
pub const LOCALES_RELATION: &str = "_locales";
/// Relation key pointing from a table to its many-number table
pub const NUMBERS_RELATION: &str = "_numbers";

/// Convert a field name or slug to lower snake case.
///
/// Splits on lower-to-upper and digit-to-upper transitions, on the last capital of
/// an acronym followed by a lowercase letter, and collapses any run of
/// non-alphanumeric characters into one underscore.
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        }

        out.extend(c.to_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Column name for a field under the given column prefix.
///
/// A leading underscore on the field name survives snake casing.
pub fn column_name(prefix: &str, field_name: &str) -> String {
    let underscore = if field_name.starts_with('_') { "_" } else { "" };
    format!("{}{}{}", prefix, underscore, to_snake_case(field_name))
}

/// Root table for a collection slug
pub fn root_table_name(slug: &str) -> String {
    to_snake_case(slug)
}

/// `<parent>_<field>` for array and hasMany select tables
pub fn nested_table_name(parent: &str, field_name: &str) -> String {
    format!("{}_{}", parent, to_snake_case(field_name))
}

/// `<root>_blocks_<slug>`; shared by every occurrence of the slug under one root
pub fn block_table_name(root_table: &str, slug: &str) -> String {
    format!("{}_blocks_{}", root_table, to_snake_case(slug))
}

pub fn locales_table_name(table: &str) -> String {
    format!("{}_locales", table)
}

pub fn numbers_table_name(table: &str) -> String {
    format!("{}_numbers", table)
}

/// `enum_<table>_<prefix><field>`
pub fn enum_name(table: &str, column_prefix: &str, field_name: &str) -> String {
    format!("enum_{}_{}{}", table, column_prefix, to_snake_case(field_name))
}

pub fn relations_name(table: &str) -> String {
    format!("relations_{}", table)
}

/// Relation key under which the root table reaches a block table
pub fn block_relation_key(slug: &str) -> String {
    format!("_blocks_{}", slug)
}

/// Scope used to name tables nested inside a named group
pub fn group_scope(table: &str, column_name: &str) -> String {
    format!("{}_{}", table, column_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // to_snake_case
    // =========================================================================

    #[test]
    fn test_snake_case_simple() {
        assert_eq!(to_snake_case("title"), "title");
        assert_eq!(to_snake_case("items"), "items");
    }

    #[test]
    fn test_snake_case_camel() {
        assert_eq!(to_snake_case("localizedText"), "localized_text");
        assert_eq!(to_snake_case("subArray"), "sub_array");
        assert_eq!(to_snake_case("PageTitle"), "page_title");
    }

    #[test]
    fn test_snake_case_acronyms_and_digits() {
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("item2Name"), "item2_name");
        assert_eq!(to_snake_case("v2"), "v2");
    }

    #[test]
    fn test_snake_case_separators() {
        assert_eq!(to_snake_case("hero-banner"), "hero_banner");
        assert_eq!(to_snake_case("my field"), "my_field");
        assert_eq!(to_snake_case("Already_Snake"), "already_snake");
        assert_eq!(to_snake_case("__weird--name__"), "weird_name");
    }

    // =========================================================================
    // Derived names
    // =========================================================================

    #[test]
    fn test_column_name_keeps_leading_underscore() {
        assert_eq!(column_name("", "_status"), "_status");
        assert_eq!(column_name("meta_", "seoTitle"), "meta_seo_title");
    }

    #[test]
    fn test_table_names() {
        assert_eq!(root_table_name("blogPosts"), "blog_posts");
        assert_eq!(nested_table_name("pages", "subItems"), "pages_sub_items");
        assert_eq!(block_table_name("pages", "heroBanner"), "pages_blocks_hero_banner");
        assert_eq!(locales_table_name("pages_items"), "pages_items_locales");
        assert_eq!(numbers_table_name("pages"), "pages_numbers");
    }

    #[test]
    fn test_enum_and_relation_names() {
        assert_eq!(enum_name("pages", "", "status"), "enum_pages_status");
        assert_eq!(
            enum_name("pages_meta", "meta_", "colorMode"),
            "enum_pages_meta_meta_color_mode"
        );
        assert_eq!(relations_name("pages_items"), "relations_pages_items");
        assert_eq!(block_relation_key("hero"), "_blocks_hero");
        assert_eq!(group_scope("pages", "meta"), "pages_meta");
    }
}
