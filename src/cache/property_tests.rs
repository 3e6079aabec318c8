//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check store, key builder and invalidation invariants.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::cache::{build_key, key_prefix, CacheStore, ManualClock};

// == Test Configuration ==
const START_MS: u64 = 1_700_000_000_000;

fn manual_store() -> (CacheStore, ManualClock) {
    let clock = ManualClock::new(START_MS);
    (CacheStore::with_clock(Arc::new(clock.clone())), clock)
}

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}"
}

fn tenant_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,16}"
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,64}".prop_map(|s| json!(s)),
        prop::collection::vec(any::<u16>(), 0..8).prop_map(|v| json!(v)),
    ]
}

fn params_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..8)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* set of params, building a key from them in two different
    // insertion orders yields the same key.
    #[test]
    fn prop_key_determinism(
        tenant in tenant_strategy(),
        params in params_strategy()
    ) {
        let forward: HashMap<String, i64> = params.iter().cloned().collect();
        let sorted: BTreeMap<String, i64> = forward.clone().into_iter().collect();
        let mut descending = serde_json::Map::new();
        for (k, v) in sorted.iter().rev() {
            descending.insert(k.clone(), json!(v));
        }

        let k1 = build_key("schedule", "metrics", &tenant, &forward).unwrap();
        let k2 = build_key("schedule", "metrics", &tenant, &sorted).unwrap();
        let k3 = build_key("schedule", "metrics", &tenant, &Value::Object(descending)).unwrap();
        prop_assert_eq!(&k1, &k2);
        prop_assert_eq!(&k1, &k3);
    }

    // *For any* two distinct tenants, equal operation and params never
    // produce the same key, and neither tenant's prefix covers the other.
    #[test]
    fn prop_tenant_isolation(
        t1 in tenant_strategy(),
        t2 in tenant_strategy(),
        params in params_strategy()
    ) {
        prop_assume!(t1 != t2);
        let params: BTreeMap<String, i64> = params.into_iter().collect();

        let k1 = build_key("hours", "hours", &t1, &params).unwrap();
        let k2 = build_key("hours", "hours", &t2, &params).unwrap();

        prop_assert_ne!(&k1, &k2);
        prop_assert!(!k2.starts_with(&key_prefix("hours", "hours", &t1)));
        prop_assert!(!k1.starts_with(&key_prefix("hours", "hours", &t2)));
    }

    // *For any* TTL, a read one millisecond before expiry is a hit and a
    // read one millisecond after is a miss that evicts the entry.
    #[test]
    fn prop_ttl_expiry(
        key in valid_key_strategy(),
        value in value_strategy(),
        ttl in 2i64..10_000_000
    ) {
        let (mut store, clock) = manual_store();
        store.set(key.clone(), value.clone(), ttl).unwrap();

        clock.set(START_MS + ttl as u64 - 1);
        prop_assert_eq!(store.get(&key), Some(value));

        clock.set(START_MS + ttl as u64 + 1);
        prop_assert_eq!(store.get(&key), None);
        prop_assert!(!store.contains_key(&key));
    }

    // *For any* non-positive TTL, set fails and stores nothing.
    #[test]
    fn prop_non_positive_ttl_rejected(
        key in valid_key_strategy(),
        ttl in i64::MIN..=0
    ) {
        let (mut store, _) = manual_store();
        prop_assert!(store.set(key.clone(), json!(1), ttl).is_err());
        prop_assert!(!store.contains_key(&key));
    }

    // *For any* population of keys, prefix invalidation removes exactly the
    // keys starting with the prefix, and a second pass removes nothing.
    #[test]
    fn prop_pattern_invalidation_exact(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..40),
        prefix in "[a-zA-Z0-9_]{1,3}"
    ) {
        let (mut store, _) = manual_store();
        for key in &keys {
            store.set(key.clone(), json!(key), 60_000).unwrap();
        }

        let expected = keys.iter().filter(|k| k.starts_with(&prefix)).count();
        prop_assert_eq!(store.invalidate_pattern(&prefix), expected);
        prop_assert_eq!(store.invalidate_pattern(&prefix), 0);

        for key in &keys {
            prop_assert_eq!(store.contains_key(key), !key.starts_with(&prefix));
        }
    }

    // *For any* sequence of operations, hit and miss counters match what
    // the callers observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (mut store, _) = manual_store();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key, value, 60_000).unwrap();
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Invalidate { key } => {
                    store.invalidate(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, store.len());
    }

    // *For any* value, mutating what `get` returned never changes what the
    // next reader sees.
    #[test]
    fn prop_reads_are_snapshots(key in valid_key_strategy(), value in value_strategy()) {
        let (mut store, _) = manual_store();
        store.set(key.clone(), value.clone(), 60_000).unwrap();

        let mut copy = store.get(&key).unwrap();
        copy.take();
        prop_assert_eq!(store.get(&key), Some(value));
    }
}

// == Concurrent Access ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    // *For any* interleaving of tasks sharing the store, every read returns
    // a complete value that some writer stored.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let store = CacheStore::new().into_shared();
            let written: Vec<Value> = operations
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Set { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect();

            let mut handles = vec![];
            for op in operations {
                let store = Arc::clone(&store);
                handles.push(tokio::spawn(async move {
                    let mut cache = store.write().await;
                    match op {
                        CacheOp::Set { key, value } => {
                            let _ = cache.set(key, value, 60_000);
                            None
                        }
                        CacheOp::Get { key } => cache.get(&key),
                        CacheOp::Invalidate { key } => {
                            cache.invalidate(&key);
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                let read = handle.await.expect("Task should not panic");
                if let Some(value) = read {
                    prop_assert!(written.contains(&value), "Read a value nobody wrote: {}", value);
                }
            }

            let stats = store.read().await.stats();
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate));
            Ok(())
        })?;
    }
}
