//! Cache Key Module
//!
//! Canonical key construction shared by every query domain.
//!
//! Keys have the shape `<domain>_<operation>_<tenant>_<params>` where the
//! tenant is JSON-quoted and the params are canonical JSON. The quoting keeps
//! tenant `biz` from prefix-matching tenant `biz_1`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Builds the cache key for one read call.
///
/// `params` may be any serializable value. Object keys are sorted at every
/// level, so field or map insertion order never changes the key.
pub fn build_key<P: Serialize + ?Sized>(
    domain: &str,
    operation: &str,
    tenant: &str,
    params: &P,
) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(params)?);
    Ok(format!(
        "{}{}",
        key_prefix(domain, operation, tenant),
        serde_json::to_string(&canonical)?
    ))
}

/// Prefix matching every key of `operation` for one tenant.
///
/// Used only for invalidation; never stored as an entry.
pub fn key_prefix(domain: &str, operation: &str, tenant: &str) -> String {
    format!("{}_{}_{}_", domain, operation, quote(tenant))
}

fn quote(tenant: &str) -> String {
    // Serializing a &str cannot fail.
    serde_json::to_string(tenant).unwrap_or_else(|_| format!("\"{}\"", tenant))
}

/// Rebuilds objects with sorted keys, recursively.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize)]
    struct Window {
        start: &'static str,
        end: &'static str,
    }

    #[test]
    fn test_key_shape() {
        let key = build_key("schedule", "todays_jobs", "biz-1", &json!({"date": "2024-03-15"}))
            .unwrap();
        assert_eq!(key, r#"schedule_todays_jobs_"biz-1"_{"date":"2024-03-15"}"#);
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let mut a = HashMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);

        assert_eq!(
            build_key("d", "op", "t", &a).unwrap(),
            build_key("d", "op", "t", &b).unwrap()
        );
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let v1 = json!({"filter": {"z": true, "a": false}, "limit": 10});
        let v2 = json!({"limit": 10, "filter": {"a": false, "z": true}});
        assert_eq!(
            build_key("d", "op", "t", &v1).unwrap(),
            build_key("d", "op", "t", &v2).unwrap()
        );
    }

    #[test]
    fn test_struct_params() {
        let key = build_key("schedule", "range", "biz", &Window { start: "s", end: "e" }).unwrap();
        assert!(key.ends_with(r#"{"end":"e","start":"s"}"#));
    }

    #[test]
    fn test_different_params_differ() {
        let k1 = build_key("d", "op", "t", &json!({"a": 1})).unwrap();
        let k2 = build_key("d", "op", "t", &json!({"a": 2})).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_tenant_isolation() {
        let k1 = build_key("d", "op", "biz-1", &json!({})).unwrap();
        let k2 = build_key("d", "op", "biz-2", &json!({})).unwrap();
        assert_ne!(k1, k2);
        assert!(k1.starts_with(&key_prefix("d", "op", "biz-1")));
        assert!(!k2.starts_with(&key_prefix("d", "op", "biz-1")));
    }

    #[test]
    fn test_prefix_does_not_bleed_across_similar_tenants() {
        let key = build_key("d", "op", "biz_1", &json!({})).unwrap();
        assert!(!key.starts_with(&key_prefix("d", "op", "biz")));
    }
}
