//! Stable, order-independent hashing for decision contexts.
//!
//! The cache key's optional fourth segment must be equal for
//! equivalent contexts regardless of how their object keys were inserted.
//! `serde_json::Value` objects are backed by a `BTreeMap` (we do not enable
//! the `preserve_order` feature anywhere in this crate), so serializing to
//! bytes already yields a canonical, key-sorted representation; hashing those
//! bytes with xxh3 gives a cheap, stable digest.

use xxhash_rust::xxh3::xxh3_64;

/// Hash a JSON value into a stable 64-bit digest, rendered as hex so it can
/// be embedded directly in a cache key string.
pub fn stable_hash(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("{:016x}", xxh3_64(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_objects_hash_equal_regardless_of_key_order() {
        let a = json!({"x": 1, "y": "two", "z": [1, 2, 3]});
        let b = json!({"z": [1, 2, 3], "y": "two", "x": 1});
        assert_eq!(stable_hash(&a), stable_hash(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_ne!(stable_hash(&a), stable_hash(&b));
    }
}
