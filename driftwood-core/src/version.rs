use std::cmp::Ordering;

/// The file name segment before the first underscore, e.g. `"3"` for
/// `3_seed_tags.up.sql`. Names without an underscore have no token.
pub fn version_token(file_name: &str) -> Option<&str> {
    let (token, _) = file_name.split_once('_')?;
    (!token.is_empty()).then_some(token)
}

/// Numeric version prefix (`^(\d+)_`), used for migration numbering.
pub fn numeric_prefix(file_name: &str) -> Option<u64> {
    let token = version_token(file_name)?;
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Numeric when both tokens are numbers, numbers before anything else, otherwise lexical.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sorts with [`compare_versions`] and removes duplicates.
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}
