//! Case-insensitive access to result rows
//!
//! Warehouses disagree on identifier casing (Snowflake upper-cases
//! unquoted aliases, Postgres lower-cases them), so every evaluator reads
//! fields through `RowAccessor` instead of indexing rows directly.

use guardrail_core::Row;
use serde_json::Value;

/// Read-only view over one result row with case-insensitive field lookup
#[derive(Debug, Clone, Copy)]
pub struct RowAccessor<'a> {
    row: &'a Row,
}

impl<'a> RowAccessor<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    /// Raw value of a field; an exact-case match wins over other casings
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.row.get(field).or_else(|| {
            self.row
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(field))
                .map(|(_, value)| value)
        })
    }

    /// Numeric value of a field
    ///
    /// Accepts JSON numbers and numeric strings (drivers often render
    /// DECIMAL columns as strings). Null or non-numeric values yield `None`.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Numeric value of a field, or `default` when absent
    pub fn number_or(&self, field: &str, default: f64) -> f64 {
        self.number(field).unwrap_or(default)
    }

    /// Textual value of a field; JSON null reads as `NULL`
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).map(display_value)
    }
}

/// Render a JSON value the way it should appear in a detail sentence
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row fixture must be an object"),
        }
    }

    #[test]
    fn lookup_ignores_case() {
        let upper = row(json!({"DUPLICATE_COUNT": 3}));
        let lower = row(json!({"duplicate_count": 4}));
        let mixed = row(json!({"Duplicate_Count": 5}));

        assert_eq!(RowAccessor::new(&upper).number("duplicate_count"), Some(3.0));
        assert_eq!(RowAccessor::new(&lower).number("DUPLICATE_COUNT"), Some(4.0));
        assert_eq!(RowAccessor::new(&mixed).number("duplicate_count"), Some(5.0));
    }

    #[test]
    fn exact_case_wins() {
        let r = row(json!({"row_count": 1, "ROW_COUNT": 2}));
        assert_eq!(RowAccessor::new(&r).number("ROW_COUNT"), Some(2.0));
        assert_eq!(RowAccessor::new(&r).number("row_count"), Some(1.0));
    }

    #[test]
    fn numeric_strings_and_nulls() {
        let r = row(json!({"NULL_PCT": "0.5000", "MATCH_PCT": null, "LABEL": "x"}));
        let acc = RowAccessor::new(&r);

        assert_eq!(acc.number("null_pct"), Some(0.5));
        assert_eq!(acc.number("match_pct"), None);
        assert_eq!(acc.number_or("match_pct", 100.0), 100.0);
        assert_eq!(acc.number("label"), None);
        assert_eq!(acc.number("missing"), None);
        assert_eq!(acc.text("match_pct").as_deref(), Some("NULL"));
        assert_eq!(acc.text("label").as_deref(), Some("x"));
    }
}
