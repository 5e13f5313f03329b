//! Cache key derivation.
//!
//! Keys look like `<prefix>:<category>:<hash>`, where the hash is a 128-bit
//! digest of the parameters serialized in canonical form. Object keys are
//! sorted at every depth before hashing, so two parameter sets that differ
//! only in insertion order always land on the same key. Parameters that have
//! no JSON form (e.g. maps with non-string keys) get no key at all, and
//! callers skip the cache for them.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in a key (128 bits).
const HASH_BYTES: usize = 16;

/// Builds cache keys under one fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>:<category>:<hash(params)>`, or `None` when `params` cannot
    /// be serialized.
    pub fn build_key<P: Serialize + ?Sized>(&self, category: &str, params: &P) -> Option<String> {
        let hash = params_hash(params)?;
        Some(format!("{}:{}:{}", self.prefix, category, hash))
    }

    /// `<prefix>:<segment>:<segment>...` for keys without a parameter hash.
    pub fn fixed_key(&self, segments: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for segment in segments {
            key.push(':');
            key.push_str(segment);
        }
        key
    }

    /// Glob matching every key of one category, e.g. `time_records:pagination:*`.
    pub fn namespace_pattern(&self, category: &str) -> String {
        format!("{}:{}:*", self.prefix, category)
    }

    /// Glob matching every key under the prefix.
    pub fn prefix_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

/// Hex-encoded 128-bit digest of the canonical JSON form of `params`.
pub fn params_hash<P: Serialize + ?Sized>(params: &P) -> Option<String> {
    let value = match serde_json::to_value(params) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Cache key parameters are not serializable, bypassing cache");
            return None;
        }
    };

    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    Some(hex::encode(&digest[..HASH_BYTES]))
}

/// Serializes `value` as compact JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Strings serialize infallibly; this also escapes the key.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, json};
    use std::collections::{HashMap, HashSet};

    fn builder() -> CacheKeyBuilder {
        CacheKeyBuilder::new("time_records")
    }

    fn key<P: Serialize + ?Sized>(category: &str, params: &P) -> String {
        builder().build_key(category, params).unwrap()
    }

    #[test]
    fn test_key_shape() {
        let built = key("pagination", &json!({"page": 1}));
        let parts: Vec<&str> = built.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "time_records");
        assert_eq!(parts[1], "pagination");
        assert_eq!(parts[2].len(), HASH_BYTES * 2);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = Map::new();
        first.insert("search".into(), json!("ana"));
        first.insert("per_page".into(), json!(15));
        first.insert("filters".into(), json!({"user_id": 3, "manager_id": 9}));

        let mut second = Map::new();
        second.insert("filters".into(), json!({"manager_id": 9, "user_id": 3}));
        second.insert("per_page".into(), json!(15));
        second.insert("search".into(), json!("ana"));

        assert_eq!(
            key("pagination", &Value::Object(first)),
            key("pagination", &Value::Object(second))
        );
    }

    #[test]
    fn test_array_order_matters() {
        let a = key("report", &json!({"ids": [1, 2]}));
        let b = key("report", &json!({"ids": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_category_and_value_change_key() {
        let key1 = key("test", &json!({"param1": "value1"}));
        let key2 = key("test", &json!({"param1": "value2"}));
        let key3 = key("different", &json!({"param1": "value1"}));

        assert_ne!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key2, key3);
    }

    #[test]
    fn test_number_and_string_are_distinct() {
        let a = key("pagination", &json!({"page": 1}));
        let b = key("pagination", &json!({"page": "1"}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_ten_thousand_filter_combinations_are_distinct() {
        let mut keys = HashSet::new();
        for user_id in 0..25 {
            for page in 1..=20 {
                for per_page in [10, 15, 25, 50, 100, 5, 20, 30, 40, 60, 70, 80, 90, 99, 1, 2, 3, 4, 6, 7] {
                    keys.insert(key(
                        "pagination",
                        &json!({
                            "filters": {"user_id": user_id, "search": format!("emp{user_id}")},
                            "per_page": per_page,
                            "page": page,
                        }),
                    ));
                }
            }
        }
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_unserializable_params_have_no_key() {
        let a: HashMap<(i32, i32), i32> = HashMap::from([((1, 1), 10)]);
        let b: HashMap<(i32, i32), i32> = HashMap::from([((2, 2), 20)]);

        assert_eq!(builder().build_key("report", &a), None);
        assert_eq!(builder().build_key("report", &b), None);
        assert_eq!(params_hash(&a), None);
    }

    #[test]
    fn test_fixed_key_and_patterns() {
        let b = builder();
        assert_eq!(
            b.fixed_key(&["can_record", "user", "42"]),
            "time_records:can_record:user:42"
        );
        assert_eq!(b.namespace_pattern("pagination"), "time_records:pagination:*");
        assert_eq!(b.prefix_pattern(), "time_records:*");
    }

    #[test]
    fn test_keys_with_special_characters_are_escaped() {
        // Without escaping, these two objects would canonicalize identically.
        let a = key("x", &json!({"a\":1,\"b": 2}));
        let b = key("x", &json!({"a": 1, "b": 2}));
        assert_ne!(a, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any permutation of the same pairs yields the same key.
        #[test]
        fn prop_permutation_invariant(
            pairs in proptest::collection::btree_map("[a-z_]{1,8}", any::<i64>(), 1..8),
            seed in any::<u64>(),
        ) {
            let forward: Map<String, Value> =
                pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();

            let mut shuffled: Vec<(String, i64)> =
                pairs.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
            let reordered: Map<String, Value> =
                shuffled.into_iter().map(|(k, v)| (k, json!(v))).collect();

            prop_assert_eq!(
                key("pagination", &Value::Object(forward)),
                key("pagination", &Value::Object(reordered))
            );
        }

        /// Changing any single value changes the key.
        #[test]
        fn prop_value_change_changes_key(
            pairs in proptest::collection::btree_map("[a-z_]{1,8}", any::<i32>(), 1..8),
        ) {
            let original: Map<String, Value> =
                pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let (first_key, first_value) = pairs.iter().next().unwrap();
            let mut changed = original.clone();
            changed.insert(first_key.clone(), json!(i64::from(*first_value) + 1));

            prop_assert_ne!(
                key("pagination", &Value::Object(original)),
                key("pagination", &Value::Object(changed))
            );
        }
    }
}
