//! SQL filter construction for video listings.

use super::VideoFilter;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::OnceLock;

/// A `WHERE` clause (possibly empty) and its positional parameters.
#[derive(Debug, Default)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

fn term_regex() -> &'static Regex {
    static TERM: OnceLock<Regex> = OnceLock::new();
    TERM.get_or_init(|| Regex::new(r"[\p{L}\p{N}_']+").expect("Invalid regex"))
}

/// Lowercased search terms. Punctuation separates terms and is dropped.
pub fn search_terms(q: &str) -> Vec<String> {
    term_regex()
        .find_iter(q)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Register `fold_case(text)`, a Unicode-aware `lower()`.
///
/// SQLite's built-in `lower()` only folds ASCII, which would leave titles
/// like "Élan" unmatched by the lowercased search terms.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// `LIKE` pattern matching `term` anywhere, with wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl SqlFilter {
    pub fn from_filter(filter: &VideoFilter) -> Self {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(q) = filter.q.as_deref() {
            for term in search_terms(q) {
                conditions.push(
                    "(fold_case(title) LIKE ? ESCAPE '\\' \
                     OR fold_case(full_title) LIKE ? ESCAPE '\\' \
                     OR fold_case(description) LIKE ? ESCAPE '\\')"
                        .to_string(),
                );
                let pattern = like_pattern(&term);
                for _ in 0..3 {
                    params.push(Value::Text(pattern.clone()));
                }
            }
        }

        if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            conditions.push(
                "EXISTS (SELECT 1 FROM json_each(videos.categories) WHERE json_each.value = ?)"
                    .to_string(),
            );
            params.push(Value::Text(category.to_string()));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        Self { clause, params }
    }
}
