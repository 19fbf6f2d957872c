/// Splits a SQL script into executable statements.
///
/// Blank lines and lines starting with `--` (after trimming) are dropped, the
/// remaining lines are joined and split on `;`. Empty statements are skipped.
/// Terminators inside string literals are not special-cased.
pub fn split_statements(content: &str) -> Vec<String> {
    let cleaned: Vec<&str> = content
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect();

    if cleaned.is_empty() {
        return Vec::new();
    }

    cleaned
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_owned)
        .collect()
}

/// First 100 characters of a statement for log output.
pub fn preview(statement: &str) -> String {
    const LIMIT: usize = 100;
    match statement.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &statement[..cut]),
        None => statement.to_owned(),
    }
}
