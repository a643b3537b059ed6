//! Query templates for generated checks
//!
//! Every check family has a fixed query shape parametrized by relation
//! name and column names. Output aliases are the field names the evaluator
//! reads back (case-insensitively).

/// Maximum rows returned by drill-down queries
pub const SAMPLE_LIMIT: usize = 5;

/// Maximum columns selected by null-rate drill-down queries
pub const SAMPLE_COLUMN_LIMIT: usize = 4;

/// Escape a value for embedding inside a single-quoted SQL literal
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render values as a comma-separated list of quoted literals
pub fn quoted_literal_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", escape_literal(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick identifier-like columns for drill-down output
///
/// Excludes `exclude`, puts columns containing "id", "name" or "key"
/// first, and keeps at most `SAMPLE_COLUMN_LIMIT`. Falls back to `*`.
pub fn pick_sample_columns(columns: &[String], exclude: &str) -> String {
    let candidates: Vec<&String> = columns.iter().filter(|c| c.as_str() != exclude).collect();
    if candidates.is_empty() {
        return "*".to_string();
    }

    let is_identifier = |c: &str| {
        let lower = c.to_lowercase();
        ["id", "name", "key"].iter().any(|hint| lower.contains(hint))
    };

    let (identifiers, others): (Vec<&String>, Vec<&String>) =
        candidates.into_iter().partition(|c| is_identifier(c));

    identifiers
        .into_iter()
        .chain(others)
        .take(SAMPLE_COLUMN_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn pk_duplicates(relation: &str, column: &str) -> String {
    format!(
        "SELECT '{col_literal}' AS pk_column, \
         COUNT(*) AS total_rows, \
         COUNT(*) - COUNT(DISTINCT {col}) AS duplicate_count \
         FROM {relation}",
        col_literal = escape_literal(column),
        col = column,
        relation = relation,
    )
}

pub fn pk_duplicates_sample(relation: &str, column: &str) -> String {
    format!(
        "SELECT {col}, COUNT(*) AS occurrences \
         FROM {relation} \
         GROUP BY {col} HAVING COUNT(*) > 1 \
         ORDER BY occurrences DESC LIMIT {limit}",
        col = column,
        relation = relation,
        limit = SAMPLE_LIMIT,
    )
}

pub fn null_rate(relation: &str, column: &str) -> String {
    format!(
        "SELECT '{col_literal}' AS column_name, \
         COUNT(*) AS total_rows, \
         SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) AS null_count, \
         ROUND(SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 4) AS null_pct \
         FROM {relation}",
        col_literal = escape_literal(column),
        col = column,
        relation = relation,
    )
}

pub fn null_rate_sample(relation: &str, column: &str, select_columns: &str) -> String {
    format!(
        "SELECT {select} FROM {relation} WHERE {col} IS NULL LIMIT {limit}",
        select = select_columns,
        relation = relation,
        col = column,
        limit = SAMPLE_LIMIT,
    )
}

pub fn value_distribution(relation: &str, column: &str) -> String {
    format!(
        "SELECT {col} AS value, \
         COUNT(*) AS row_count, \
         ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS pct \
         FROM {relation} \
         GROUP BY {col} \
         ORDER BY row_count DESC",
        col = column,
        relation = relation,
    )
}

pub fn unexpected_values(relation: &str, column: &str, expected: &[String]) -> String {
    format!(
        "SELECT {col} AS unexpected_value, COUNT(*) AS row_count \
         FROM {relation} \
         WHERE {col} NOT IN ({values}) \
         AND {col} IS NOT NULL \
         GROUP BY {col} \
         ORDER BY row_count DESC",
        col = column,
        relation = relation,
        values = quoted_literal_list(expected),
    )
}

fn join_condition(join_cols: &[String]) -> String {
    join_cols
        .iter()
        .map(|c| format!("c.{c} = p.{c}", c = c))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Match rate of child rows against a parent, or `None` without join columns
pub fn fk_match_rate(
    child_relation: &str,
    parent_relation: &str,
    parent_name: &str,
    join_cols: &[String],
) -> Option<String> {
    let first_key = join_cols.first()?;
    Some(format!(
        "SELECT '{parent}' AS parent_model, \
         '{keys}' AS join_keys, \
         COUNT(*) AS child_rows, \
         SUM(CASE WHEN p.{first_key} IS NOT NULL THEN 1 ELSE 0 END) AS matched_rows, \
         ROUND(SUM(CASE WHEN p.{first_key} IS NOT NULL THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 2) AS match_pct \
         FROM {child} c \
         LEFT JOIN {parent_relation} p ON {cond}",
        parent = escape_literal(parent_name),
        keys = escape_literal(&join_cols.join(", ")),
        first_key = first_key,
        child = child_relation,
        parent_relation = parent_relation,
        cond = join_condition(join_cols),
    ))
}

/// Unmatched child key groups, most frequent first
pub fn fk_match_rate_sample(
    child_relation: &str,
    parent_relation: &str,
    join_cols: &[String],
) -> Option<String> {
    let first_key = join_cols.first()?;
    let select = join_cols
        .iter()
        .map(|c| format!("c.{}", c))
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!(
        "SELECT {select}, COUNT(*) AS unmatched_rows \
         FROM {child} c \
         LEFT JOIN {parent_relation} p ON {cond} \
         WHERE p.{first_key} IS NULL \
         GROUP BY {select} \
         ORDER BY unmatched_rows DESC LIMIT {limit}",
        select = select,
        child = child_relation,
        parent_relation = parent_relation,
        cond = join_condition(join_cols),
        first_key = first_key,
        limit = SAMPLE_LIMIT,
    ))
}

pub fn row_count(relation: &str) -> String {
    format!("SELECT COUNT(*) AS row_count FROM {}", relation)
}
