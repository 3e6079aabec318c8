//! Request DTOs for the admin API
//!
//! Defines the query strings accepted by incoming HTTP requests.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Query string for GET /businesses/:id/open
///
/// `at` is an RFC 3339 instant; when omitted the current time is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenQuery {
    pub at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_query_deserialize_with_instant() {
        let json = r#"{"at": "2024-03-15T21:00:00Z"}"#;
        let query: OpenQuery = serde_json::from_str(json).unwrap();
        assert_eq!(
            query.at,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 21, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_open_query_deserialize_without_instant() {
        let query: OpenQuery = serde_json::from_str("{}").unwrap();
        assert!(query.at.is_none());
    }

    #[test]
    fn test_open_query_rejects_garbage() {
        let result: Result<OpenQuery, _> = serde_json::from_str(r#"{"at": "friday"}"#);
        assert!(result.is_err());
    }
}
