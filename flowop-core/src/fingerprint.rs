//! Spec Fingerprinting
//!
//! Change detection works by hashing the mutable spec fields into a short
//! stable fingerprint. The fingerprint doubles as the suffix of the derived
//! workflow name, so re-creation attempts for an unchanged spec resolve to
//! the same identity.

use sha2::{Digest, Sha256};

use crate::resources::SpecFields;

/// Hex characters kept from the digest. 64 bits is far beyond what one
/// cluster's worth of objects can collide, and short enough to embed in
/// object names.
const FINGERPRINT_HEX_LEN: usize = 16;

/// Derive a stable content hash from spec fields plus the collision count.
///
/// Values are lowercased before hashing, making desired state
/// case-insensitive. Field iteration order is fixed by `SpecFields`, so the
/// same inputs produce the same fingerprint across processes and restarts.
/// The collision count, when present, is mixed in so a forced regeneration
/// changes the result without any spec edit.
pub fn fingerprint(fields: &SpecFields, collision_count: Option<i32>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields.iter() {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.to_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    if let Some(count) = collision_count {
        hasher.update(count.to_le_bytes());
    }

    let digest = hasher.finalize();
    hex::encode(&digest[..FINGERPRINT_HEX_LEN / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> SpecFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_deterministic() {
        let spec = fields(&[("Foo", "Bar")]);
        assert_eq!(fingerprint(&spec, None), fingerprint(&spec, None));
    }

    #[test]
    fn test_values_are_case_insensitive() {
        assert_eq!(
            fingerprint(&fields(&[("Foo", "bar")]), None),
            fingerprint(&fields(&[("Foo", "BAR")]), None)
        );
    }

    #[test]
    fn test_collision_count_changes_fingerprint() {
        let spec = fields(&[("Foo", "bar"), ("Baz", "qux")]);
        assert_ne!(fingerprint(&spec, Some(0)), fingerprint(&spec, Some(1)));
    }

    #[test]
    fn test_unset_count_differs_from_zero() {
        let spec = fields(&[("Foo", "bar")]);
        assert_ne!(fingerprint(&spec, None), fingerprint(&spec, Some(0)));
    }

    #[test]
    fn test_different_fields_differ() {
        assert_ne!(
            fingerprint(&fields(&[("Message", "hello")]), Some(0)),
            fingerprint(&fields(&[("Message", "world")]), Some(0))
        );
    }

    #[test]
    fn test_length_and_charset() {
        let fp = fingerprint(&fields(&[("Foo", "bar")]), Some(3));
        assert_eq!(fp.len(), FINGERPRINT_HEX_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
