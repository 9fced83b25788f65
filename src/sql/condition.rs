//! Condition building for SQL WHERE clauses
//!
//! Converts row [`Predicate`]s into PostgreSQL WHERE clauses. Values are compared
//! as text, so an id bound as a string matches an INTEGER column and vice versa.

use crate::sql::sanitize::{escape_like, quote_identifier, validate_identifier};
use crate::store::{Predicate, value_text};

/// Build SQL WHERE clause from a Predicate
///
/// Returns (clause, params) tuple where:
/// - `clause` is the SQL WHERE condition string with parameter placeholders ($1, $2, etc.)
/// - `params` is a vector of parameter values to bind: strings for scalar
///   comparisons, a JSON array for `In`
///
/// # Arguments
/// * `predicate` - The Predicate to convert
/// * `param_offset` - Starting parameter number (mutated to track next available)
pub fn build_predicate_clause(
    predicate: &Predicate,
    param_offset: &mut i32,
) -> Result<(String, Vec<serde_json::Value>), String> {
    let mut params = Vec::new();

    match predicate {
        Predicate::Eq(column, value) => {
            let column = checked_column(column)?;

            // Handle NULL values specially
            let Some(text) = value_text(value) else {
                return Ok((format!("{} IS NULL", column), params));
            };
            params.push(serde_json::Value::String(text));

            let clause = format!("{}::text = ${}::text", column, param_offset);
            *param_offset += 1;

            Ok((clause, params))
        }
        Predicate::In(column, values) => {
            let column = checked_column(column)?;

            let texts: Vec<serde_json::Value> = values
                .iter()
                .filter_map(value_text)
                .map(serde_json::Value::String)
                .collect();
            if texts.is_empty() {
                return Ok(("FALSE".to_string(), params));
            }
            params.push(serde_json::Value::Array(texts));

            let clause = format!(
                "{}::text = ANY(SELECT jsonb_array_elements_text(${}::jsonb))",
                column, param_offset
            );
            *param_offset += 1;

            Ok((clause, params))
        }
        Predicate::IsNull(column) => {
            let column = checked_column(column)?;
            Ok((format!("{} IS NULL", column), params))
        }
        Predicate::StartsWith(column, prefix) => {
            let column = checked_column(column)?;

            params.push(serde_json::Value::String(format!("{}%", escape_like(prefix))));

            let clause = format!("{}::text LIKE ${}::text ESCAPE '\\'", column, param_offset);
            *param_offset += 1;

            Ok((clause, params))
        }
        Predicate::And(parts) => {
            if parts.is_empty() {
                return Ok(("TRUE".to_string(), params));
            }
            let mut clauses = Vec::new();
            for part in parts {
                let (clause, mut sub_params) = build_predicate_clause(part, param_offset)?;
                clauses.push(format!("({})", clause));
                params.append(&mut sub_params);
            }
            Ok((clauses.join(" AND "), params))
        }
    }
}

fn checked_column(column: &str) -> Result<String, String> {
    validate_identifier(column)?;
    Ok(quote_identifier(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_predicate() {
        let mut offset = 1;
        let (clause, params) =
            build_predicate_clause(&Predicate::eq("_parent_id", 7), &mut offset).unwrap();

        assert_eq!(clause, "\"_parent_id\"::text = $1::text");
        assert_eq!(params, vec![json!("7")]); // Numbers are converted to strings
        assert_eq!(offset, 2);
    }

    #[test]
    fn test_eq_null_predicate() {
        let mut offset = 1;
        let (clause, params) =
            build_predicate_clause(&Predicate::eq("locale", json!(null)), &mut offset).unwrap();

        assert_eq!(clause, "\"locale\" IS NULL");
        assert!(params.is_empty());
        assert_eq!(offset, 1);
    }

    #[test]
    fn test_in_predicate() {
        let mut offset = 3;
        let (clause, params) = build_predicate_clause(
            &Predicate::is_in("_path", vec![json!("layout"), json!(2)]),
            &mut offset,
        )
        .unwrap();

        assert_eq!(
            clause,
            "\"_path\"::text = ANY(SELECT jsonb_array_elements_text($3::jsonb))"
        );
        assert_eq!(params, vec![json!(["layout", "2"])]);
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let mut offset = 1;
        let (clause, params) =
            build_predicate_clause(&Predicate::is_in("id", vec![]), &mut offset).unwrap();
        assert_eq!(clause, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_starts_with_escapes_pattern() {
        let mut offset = 1;
        let (clause, params) = build_predicate_clause(
            &Predicate::starts_with("_path", "my_items.0."),
            &mut offset,
        )
        .unwrap();

        assert_eq!(clause, "\"_path\"::text LIKE $1::text ESCAPE '\\'");
        assert_eq!(params, vec![json!("my\\_items.0.%")]);
    }

    #[test]
    fn test_and_predicate() {
        let predicate = Predicate::eq("_parent_id", 1).and(Predicate::eq("_locale", "en"));

        let mut offset = 1;
        let (clause, params) = build_predicate_clause(&predicate, &mut offset).unwrap();

        assert_eq!(
            clause,
            "(\"_parent_id\"::text = $1::text) AND (\"_locale\"::text = $2::text)"
        );
        assert_eq!(params, vec![json!("1"), json!("en")]);
        assert_eq!(offset, 3);
    }

    #[test]
    fn test_empty_and_is_true() {
        let mut offset = 1;
        let (clause, _) = build_predicate_clause(&Predicate::all(), &mut offset).unwrap();
        assert_eq!(clause, "TRUE");
    }

    #[test]
    fn test_invalid_column_rejected() {
        let mut offset = 1;
        let result = build_predicate_clause(&Predicate::is_null("title; DROP"), &mut offset);
        assert!(result.is_err());
    }
}
