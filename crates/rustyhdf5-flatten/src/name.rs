//! Flat name generation.
//!
//! An object at `/a/b/name` becomes `a__b__name` in the flat dataset. Names
//! that would reach [`MAX_NAME_LEN`] characters are shortened by hashing,
//! first the group path and then, if still too long, the whole name.

use sha1::{Digest, Sha1};

use crate::path::{self, GROUP_SEPARATOR};

/// Joiner replacing the group separator in flat names.
pub const FLATTENER_SEPARATOR: &str = "__";

/// Flat names are always shorter than this.
pub const MAX_NAME_LEN: usize = 256;

/// Compute the SHA-1 digest of `data` and return the lowercase hex string.
pub fn sha1_hex(data: &[u8]) -> String {
    let hash = Sha1::digest(data);
    let mut hex = String::with_capacity(40);
    for byte in hash.iter() {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Flat name for object `base` living in group `group_path`.
///
/// Root objects keep their name. Pure and deterministic; the result never
/// contains the group separator.
pub fn flat_name(group_path: &str, base: &str) -> String {
    if path::is_root(group_path) {
        return base.to_string();
    }

    let full = format!("{}{FLATTENER_SEPARATOR}{base}", sanitize(group_path));
    if full.chars().count() < MAX_NAME_LEN {
        return full;
    }

    let hashed = format!(
        "{}{FLATTENER_SEPARATOR}{base}",
        sha1_hex(group_path.as_bytes())
    );
    if hashed.chars().count() < MAX_NAME_LEN {
        return hashed;
    }

    sha1_hex(full.as_bytes())
}

/// `/a/b` → `a__b`.
fn sanitize(group_path: &str) -> String {
    group_path
        .trim_start_matches(GROUP_SEPARATOR)
        .replace(GROUP_SEPARATOR, FLATTENER_SEPARATOR)
}
