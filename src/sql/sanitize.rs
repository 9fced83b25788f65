//! SQL Identifier Sanitization Utilities
//!
//! Provides functions to safely quote SQL identifiers and LIKE patterns, and to
//! validate the identifiers produced by schema synthesis.

use regex::Regex;

/// Longest identifier PostgreSQL keeps without truncation
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Arguments
/// * `identifier` - The identifier to quote
///
/// # Returns
/// The identifier wrapped in double quotes with escaped internal quotes
///
/// # Example
/// ```
/// use runtara_document_store::sql::quote_identifier;
///
/// let quoted = quote_identifier("pages_items");
/// assert_eq!(quoted, "\"pages_items\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    // Escape any double quotes in the identifier by doubling them
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Validate a synthesized table, column, index or enum name
///
/// Rules:
/// - Must start with a lowercase letter or an underscore
/// - Can only contain lowercase ASCII letters, numbers, and underscores
/// - At most 63 bytes
///
/// Every identifier is quoted when rendered, so reserved words such as `order` are allowed.
///
/// # Example
/// ```
/// use runtara_document_store::sql::validate_identifier;
///
/// assert!(validate_identifier("pages_blocks_hero").is_ok());
/// assert!(validate_identifier("_parent_id").is_ok());
/// assert!(validate_identifier("Pages").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    // Check empty
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    let re = Regex::new(r"^[a-z_][a-z0-9_]*$").map_err(|e| e.to_string())?;
    if !re.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a lowercase letter or underscore and contain only lowercase letters, numbers, and underscores.",
            name
        ));
    }

    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(format!(
            "Identifier '{}' is {} bytes long; PostgreSQL allows at most {}.",
            name,
            name.len(),
            MAX_IDENTIFIER_BYTES
        ));
    }

    Ok(())
}

/// Escape `%`, `_` and `\` so a value matches literally inside a LIKE pattern
/// using `ESCAPE '\'`
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("my_table"), "\"my_table\"");
        assert_eq!(quote_identifier("_order"), "\"_order\"");
    }

    #[test]
    fn test_quote_identifier_with_quotes() {
        assert_eq!(
            quote_identifier("table\"with\"quotes"),
            "\"table\"\"with\"\"quotes\""
        );
    }

    #[test]
    fn test_quote_identifier_reserved_keyword() {
        // Reserved keywords are safe once quoted
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("value"), "\"value\"");
    }

    // =========================================================================
    // validate_identifier Tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("pages").is_ok());
        assert!(validate_identifier("pages_items_locales").is_ok());
        assert!(validate_identifier("enum__locales").is_ok());
        assert!(validate_identifier("_locale").is_ok());
        assert!(validate_identifier("order").is_ok());
        assert!(validate_identifier("table1").is_ok());
    }

    #[test]
    fn test_validate_identifier_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_identifier_invalid_characters() {
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("Pages").is_err());
        assert!(validate_identifier("my-table").is_err());
        assert!(validate_identifier("my.table").is_err());
        assert!(validate_identifier("my table").is_err());
        assert!(validate_identifier("tëst").is_err());
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);
        assert!(validate_identifier(&ok).is_ok());

        let err = validate_identifier(&too_long).unwrap_err();
        assert!(err.contains("64 bytes"));
    }

    // =========================================================================
    // escape_like Tests
    // =========================================================================

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("items.0."), "items.0.");
        assert_eq!(escape_like("sub_array."), "sub\\_array.");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
