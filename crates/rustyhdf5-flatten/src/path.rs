//! Absolute path helpers for groups, dimensions and variables.

/// Separator between group names in an absolute path.
pub const GROUP_SEPARATOR: char = '/';

/// Path of the root group.
pub const ROOT: &str = "/";

/// Whether `path` names the root group.
pub fn is_root(path: &str) -> bool {
    path == ROOT || path.is_empty()
}

/// Absolute path of `name` inside `group`.
pub fn join(group: &str, name: &str) -> String {
    if is_root(group) {
        format!("/{name}")
    } else {
        format!("{group}/{name}")
    }
}

/// Split an absolute path into its parent group path and final name.
///
/// `"/g1/v"` → `("/g1", "v")`, `"/v"` → `("/", "v")`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind(GROUP_SEPARATOR) {
        Some(0) => (ROOT, &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => (ROOT, path),
    }
}

/// The group names along `path`, root excluded.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(GROUP_SEPARATOR).filter(|s| !s.is_empty())
}
