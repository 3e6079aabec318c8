//! Result shapes returned by query modules.

use std::time::Duration;

use serde::Serialize;

// == Performance ==
/// Timing metadata attached to every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// Wall time of the call in milliseconds
    #[serde(rename = "queryTime")]
    pub query_time_ms: f64,
    /// Whether the payload came from the cache
    pub cache_hit: bool,
}

// == Query Result ==
/// Payload of a read plus how it was served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub data: T,
    pub performance: Performance,
}

impl<T> QueryResult<T> {
    pub fn hit(data: T, elapsed: Duration) -> Self {
        Self::new(data, elapsed, true)
    }

    pub fn miss(data: T, elapsed: Duration) -> Self {
        Self::new(data, elapsed, false)
    }

    fn new(data: T, elapsed: Duration, cache_hit: bool) -> Self {
        Self {
            data,
            performance: Performance {
                query_time_ms: elapsed.as_secs_f64() * 1000.0,
                cache_hit,
            },
        }
    }

    pub fn cache_hit(&self) -> bool {
        self.performance.cache_hit
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

// == Write Result ==
/// Outcome of a mutating call.
///
/// A failed write carries the data source message and no entity; callers
/// must not assume any part of it was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> WriteResult<T> {
    pub fn ok(entity: T) -> Self {
        Self {
            success: true,
            entity: Some(entity),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            entity: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_serialize() {
        let result = QueryResult::hit(vec!["job-1"], Duration::from_micros(1500));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["data"][0], "job-1");
        assert_eq!(json["performance"]["cacheHit"], true);
        assert_eq!(json["performance"]["queryTime"], 1.5);
    }

    #[test]
    fn test_write_result_shapes() {
        let ok = WriteResult::ok(7);
        assert!(ok.success);
        assert_eq!(ok.entity, Some(7));

        let failed: WriteResult<i32> = WriteResult::failed("backend down");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("entity").is_none());
        assert_eq!(json["error"], "backend down");
    }
}
