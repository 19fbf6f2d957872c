//! DDL rendering for classified column changes.
//!
//! Output is MySQL flavoured: backtick identifiers, `MODIFY COLUMN`,
//! `COMMENT`, and every statement ends with `;`.

use crate::model::ModelFieldDescriptor;
use crate::schema::ColumnDescriptor;
use crate::types::map_type;

/// Backtick-quotes an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Single-quotes a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn statement(parts: &[&str]) -> String {
    let body: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    format!("{};", body.join(" "))
}

fn null_clause(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

/// Column type the model expects for `field`.
pub fn expected_type(field: &ModelFieldDescriptor) -> String {
    map_type(&field.declared_type, field.size_hint, &field.db_name)
}

fn model_default(field: &ModelFieldDescriptor) -> String {
    match field.default_literal.as_deref() {
        Some(literal) if field.declared_type.is_numeric() => format!("DEFAULT {}", literal),
        Some(literal) => format!("DEFAULT {}", quote_literal(literal)),
        None if !field.nullable => field
            .declared_type
            .implicit_default()
            .map(|d| format!("DEFAULT {}", d))
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// `ALTER TABLE t ADD COLUMN c <type> <NULL|NOT NULL> [DEFAULT ..] [COMMENT ..];`
pub fn add_column(table: &str, field: &ModelFieldDescriptor) -> String {
    let comment = field
        .comment
        .as_deref()
        .map(|c| format!("COMMENT {}", quote_literal(c)))
        .unwrap_or_default();
    statement(&[
        "ALTER TABLE",
        &quote_ident(table),
        "ADD COLUMN",
        &quote_ident(&field.db_name),
        &expected_type(field),
        null_clause(field.nullable),
        &model_default(field),
        &comment,
    ])
}

/// `ALTER TABLE t DROP COLUMN c;`
pub fn drop_column(table: &str, column: &str) -> String {
    statement(&[
        "ALTER TABLE",
        &quote_ident(table),
        "DROP COLUMN",
        &quote_ident(column),
    ])
}

/// `ALTER TABLE t MODIFY COLUMN c <type> <NULL|NOT NULL>;`
pub fn modify_column(table: &str, field: &ModelFieldDescriptor) -> String {
    statement(&[
        "ALTER TABLE",
        &quote_ident(table),
        "MODIFY COLUMN",
        &quote_ident(&field.db_name),
        &expected_type(field),
        null_clause(field.nullable),
    ])
}

/// Re-adds a live column exactly as it was introspected.
pub fn add_live_column(table: &str, column: &ColumnDescriptor) -> String {
    statement(&[
        "ALTER TABLE",
        &quote_ident(table),
        "ADD COLUMN",
        &quote_ident(&column.name),
        &column.sql_type,
        null_clause(column.nullable),
        &live_default(column),
    ])
}

/// Restores a live column's type, nullability and default.
pub fn restore_live_column(table: &str, column: &ColumnDescriptor) -> String {
    statement(&[
        "ALTER TABLE",
        &quote_ident(table),
        "MODIFY COLUMN",
        &quote_ident(&column.name),
        &column.sql_type,
        null_clause(column.nullable),
        &live_default(column),
    ])
}

fn live_default(column: &ColumnDescriptor) -> String {
    column
        .default_value
        .as_deref()
        .map(|d| format!("DEFAULT {}", render_live_default(d)))
        .unwrap_or_default()
}

/// Introspected defaults arrive either as raw values (MySQL) or as SQL
/// expressions (SQLite, Postgres). Well-formed expressions and numbers pass
/// through; anything else is quoted as a string literal.
pub fn render_live_default(value: &str) -> String {
    let trimmed = value.trim();
    if is_sql_expression(trimmed) {
        trimmed.to_owned()
    } else {
        quote_literal(value)
    }
}

const KEYWORD_DEFAULTS: [&str; 6] = [
    "NULL",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "TRUE",
    "FALSE",
];

fn is_sql_expression(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let upper = value.to_ascii_uppercase();
    if KEYWORD_DEFAULTS.contains(&upper.as_str()) || is_number(value) {
        return true;
    }

    if value.starts_with('\'') {
        return string_literal_end(value).is_some_and(|end| is_cast_suffix(&value[end..]));
    }

    if value.starts_with('(') {
        return closing_paren(value, 0)
            .is_some_and(|close| close == value.len() - 1 && is_sql_expression(&value[1..close]));
    }

    // function call with an optional cast, e.g. nextval('seq'::regclass)
    let Some(open) = value.find('(') else {
        return false;
    };
    let name = &value[..open];
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid_name
        && closing_paren(value, open).is_some_and(|close| is_cast_suffix(&value[close + 1..]))
}

fn is_number(value: &str) -> bool {
    value.parse::<f64>().is_ok()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

fn is_cast_suffix(rest: &str) -> bool {
    rest.is_empty() || rest.strip_prefix("::").is_some_and(|ty| !ty.trim().is_empty())
}

/// Byte index just past the closing quote of the literal that starts at 0.
fn string_literal_end(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Index of the `)` matching the `(` at `open`, skipping quoted text.
fn closing_paren(value: &str, open: usize) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i += string_literal_end(&value[i..])?;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
