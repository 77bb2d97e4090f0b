//! Path identity hashing.

use std::path::Path;

/// Polynomial rolling hash of a string, wrapped to 32-bit signed.
///
/// Each step computes `h * 31 - h + c`, i.e. `h * 30 + c`, over UTF-16 code
/// units so identities match what a display layer computes for the same path.
/// Not collision-free; use it as a lookup key only.
pub fn hash_str(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_mul(31)
            .wrapping_sub(h)
            .wrapping_add(i32::from(c))
    })
}

/// Identity hash of a path.
pub fn hash_path(path: &Path) -> i32 {
    hash_str(&path.to_string_lossy())
}
