/// Maximum filename length in bytes (filesystem limit).
pub const MAX_FILENAME_LEN: usize = 255;

/// True if `name` is a single path component: no `/` or `\` separators,
/// no null bytes and not a `.`/`..` directory reference.
pub fn is_leaf_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// True if every character is in `[A-Za-z0-9._-]`.
pub fn has_portable_charset(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Last path component of `path`, accepting both `/` and `\` separators.
pub fn leaf_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Split a leaf name into `(stem, suffix)` where `suffix` includes the dot.
///
/// The suffix starts at the last `.` unless that dot is the first character,
/// so `.env` has no suffix and `a.tar.gz` splits into `a.tar` and `.gz`.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Lowercase extension of the last component of `path`, without the dot.
/// Empty when there is none.
pub fn extension_of(path: &str) -> String {
    let (_, suffix) = split_name(leaf_of(path));
    suffix.trim_start_matches('.').to_ascii_lowercase()
}
