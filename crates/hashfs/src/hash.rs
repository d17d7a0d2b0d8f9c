//! Salted 64-bit path hashing (spec §4.1).
//!
//! The hash itself is CityHash-64, an external collaborator per spec §1 —
//! we call into `fasthash`'s binding rather than carry our own
//! implementation.

use fasthash::city;

/// Hashes an in-archive path the same way for writing and for lookup.
///
/// Normalization: a single leading `/` is dropped. If `salt != 0`, the
/// decimal text of `salt` is prepended to the path bytes (no separator)
/// before hashing, so `hash_path("/x", 0)` and `hash_path("x", 0)` agree,
/// and hashing is namespaced per-archive when a salt is configured.
pub fn hash_path(path: &str, salt: u16) -> u64 {
    let trimmed = path.strip_prefix('/').unwrap_or(path);

    if salt == 0 {
        city::hash64(trimmed.as_bytes())
    } else {
        let mut buf = String::with_capacity(5 + trimmed.len());
        buf.push_str(itoa(salt).as_str());
        buf.push_str(trimmed);

        city::hash64(buf.as_bytes())
    }
}

fn itoa(value: u16) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_zero_ignores_leading_slash() {
        assert_eq!(hash_path("/käsefondue.txt", 0), hash_path("käsefondue.txt", 0));
    }

    #[test]
    fn known_value_from_spec_scenario_1() {
        assert_eq!(hash_path("/käsefondue.txt", 0), 8_645_157_520_230_346_068);
    }

    #[test]
    fn nonzero_salt_changes_the_hash() {
        assert_ne!(hash_path("/x", 0), hash_path("/x", 42));
    }

    #[test]
    fn salt_independence_of_leading_slash() {
        assert_eq!(hash_path("/x", 42), hash_path("x", 42));
    }
}
