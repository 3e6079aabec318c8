//! Business Hours Queries
//!
//! Weekly opening hours, dated special-hours overrides, and the derived
//! "is this business open right now" check.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, DataSourceError, Result};
use crate::query::{CachedQuery, QueryEngine, QueryResult, WriteResult};

pub const DOMAIN: &str = "business_hours";

/// Default lifetime of cached hours reads; hours change rarely.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

const TIME_FORMAT: &str = "%H:%M";

// == Models ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    pub day: Weekday,
    pub is_open: bool,
    /// "HH:MM" local time
    pub open_time: Option<String>,
    /// "HH:MM" local time; at or before `open_time` means past midnight
    pub close_time: Option<String>,
}

impl DayHours {
    pub fn open(day: Weekday, open_time: &str, close_time: &str) -> Self {
        Self {
            day,
            is_open: true,
            open_time: Some(open_time.to_string()),
            close_time: Some(close_time.to_string()),
        }
    }

    pub fn closed(day: Weekday) -> Self {
        Self {
            day,
            is_open: false,
            open_time: None,
            close_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHours {
    pub business_id: String,
    /// IANA zone name, e.g. "America/Chicago"
    pub timezone: String,
    pub days: Vec<DayHours>,
}

/// Hours for one calendar date that replace the weekly entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialHours {
    pub date: NaiveDate,
    pub is_open: bool,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextOpening {
    pub date: NaiveDate,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenStatus {
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_close_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_open: Option<NextOpening>,
    /// Reason attached to a special-hours override in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// == Data Source ==
#[async_trait]
pub trait HoursSource: Send + Sync {
    async fn business_hours(
        &self,
        business_id: &str,
    ) -> std::result::Result<BusinessHours, DataSourceError>;

    /// Special-hours rows dated on or after `from`.
    async fn special_hours_from(
        &self,
        business_id: &str,
        from: NaiveDate,
    ) -> std::result::Result<Vec<SpecialHours>, DataSourceError>;

    async fn upsert_business_hours(
        &self,
        hours: BusinessHours,
    ) -> std::result::Result<BusinessHours, DataSourceError>;

    async fn upsert_special_hours(
        &self,
        business_id: &str,
        special: SpecialHours,
    ) -> std::result::Result<SpecialHours, DataSourceError>;
}

// == Cache Params ==
#[derive(Debug, Serialize)]
struct NoParams {}

#[derive(Debug, Serialize)]
struct FromParams {
    from: NaiveDate,
}

// == Hours Queries ==
pub struct HoursQueries {
    engine: QueryEngine,
    source: Arc<dyn HoursSource>,
    hours: CachedQuery<NoParams, BusinessHours>,
    special: CachedQuery<FromParams, Vec<SpecialHours>>,
}

impl HoursQueries {
    pub fn new(engine: QueryEngine, source: Arc<dyn HoursSource>, ttl: Duration) -> Self {
        Self {
            engine,
            source,
            hours: CachedQuery::new(DOMAIN, "hours", ttl),
            special: CachedQuery::new(DOMAIN, "special", ttl),
        }
    }

    pub async fn get_business_hours(&self, business_id: &str) -> Result<QueryResult<BusinessHours>> {
        self.engine
            .read(&self.hours, business_id, &NoParams {}, || {
                self.source.business_hours(business_id)
            })
            .await
    }

    pub async fn get_special_hours(
        &self,
        business_id: &str,
        from: NaiveDate,
    ) -> Result<QueryResult<Vec<SpecialHours>>> {
        self.engine
            .read(&self.special, business_id, &FromParams { from }, || {
                self.source.special_hours_from(business_id, from)
            })
            .await
    }

    /// Whether the business is open at `at`, in its own time zone.
    ///
    /// A special-hours row for the local date overrides the weekly entry.
    /// Spans whose close time is at or before the open time run past
    /// midnight into the next day.
    pub async fn is_business_open(&self, business_id: &str, at: DateTime<Utc>) -> Result<OpenStatus> {
        let hours = self.get_business_hours(business_id).await?.into_data();
        let tz = parse_timezone(&hours.timezone).map_err(CacheError::DataSource)?;

        let local = at.with_timezone(&tz);
        let today = local.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);

        let specials = self.get_special_hours(business_id, yesterday).await?.into_data();
        let resolver = DayResolver {
            hours: &hours,
            specials: &specials,
        };

        resolver.status_at(today, local.time()).map_err(CacheError::DataSource)
    }

    pub async fn update_business_hours(
        &self,
        business_id: &str,
        days: Vec<DayHours>,
        timezone: &str,
    ) -> WriteResult<BusinessHours> {
        let validated = parse_timezone(timezone).and_then(|_| {
            days.iter()
                .try_for_each(|d| validate_span(d.is_open, &d.open_time, &d.close_time))
        });
        if let Err(err) = validated {
            return WriteResult::failed(err.to_string());
        }

        let hours = BusinessHours {
            business_id: business_id.to_string(),
            timezone: timezone.to_string(),
            days,
        };

        self.engine
            .write(
                "business_hours.update",
                self.source.upsert_business_hours(hours),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    pub async fn upsert_special_hours(
        &self,
        business_id: &str,
        special: SpecialHours,
    ) -> WriteResult<SpecialHours> {
        if let Err(err) = validate_span(special.is_open, &special.open_time, &special.close_time) {
            return WriteResult::failed(err.to_string());
        }

        self.engine
            .write(
                "business_hours.upsert_special",
                self.source.upsert_special_hours(business_id, special),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    /// Prefixes read by every hours lookup and by the open check.
    pub fn invalidation_set(&self, business_id: &str) -> Vec<String> {
        vec![self.hours.prefix(business_id), self.special.prefix(business_id)]
    }
}

// == Open/Closed Resolution ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    open: NaiveTime,
    close: NaiveTime,
}

impl Span {
    fn crosses_midnight(&self) -> bool {
        self.close <= self.open
    }
}

struct DayResolver<'a> {
    hours: &'a BusinessHours,
    specials: &'a [SpecialHours],
}

impl DayResolver<'_> {
    /// Opening span for `date` plus the override reason, if any.
    fn span_for(
        &self,
        date: NaiveDate,
    ) -> std::result::Result<(Option<Span>, Option<String>), DataSourceError> {
        if let Some(special) = self.specials.iter().find(|s| s.date == date) {
            let span = to_span(special.is_open, &special.open_time, &special.close_time)?;
            return Ok((span, special.reason.clone()));
        }

        match self.hours.days.iter().find(|d| d.day == date.weekday()) {
            Some(day) => Ok((to_span(day.is_open, &day.open_time, &day.close_time)?, None)),
            None => Ok((None, None)),
        }
    }

    fn status_at(
        &self,
        today: NaiveDate,
        now: NaiveTime,
    ) -> std::result::Result<OpenStatus, DataSourceError> {
        let (today_span, reason) = self.span_for(today)?;

        if let Some(span) = today_span {
            if span.open <= now && (span.crosses_midnight() || now < span.close) {
                return Ok(open_until(span.close, reason));
            }
        }

        if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
            if let (Some(span), yesterday_reason) = self.span_for(yesterday)? {
                if span.crosses_midnight() && now < span.close {
                    return Ok(open_until(span.close, yesterday_reason));
                }
            }
        }

        let next_open = match today_span {
            Some(span) if now < span.open => Some(NextOpening {
                date: today,
                time: format_time(span.open),
            }),
            _ => self.next_opening_after(today)?,
        };

        Ok(OpenStatus {
            is_open: false,
            next_close_time: None,
            next_open,
            reason,
        })
    }

    fn next_opening_after(
        &self,
        today: NaiveDate,
    ) -> std::result::Result<Option<NextOpening>, DataSourceError> {
        for offset in 1..=7 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            if let (Some(span), _) = self.span_for(date)? {
                return Ok(Some(NextOpening {
                    date,
                    time: format_time(span.open),
                }));
            }
        }
        Ok(None)
    }
}

fn open_until(close: NaiveTime, reason: Option<String>) -> OpenStatus {
    OpenStatus {
        is_open: true,
        next_close_time: Some(format_time(close)),
        next_open: None,
        reason,
    }
}

fn to_span(
    is_open: bool,
    open_time: &Option<String>,
    close_time: &Option<String>,
) -> std::result::Result<Option<Span>, DataSourceError> {
    if !is_open {
        return Ok(None);
    }
    match (open_time, close_time) {
        (Some(open), Some(close)) => Ok(Some(Span {
            open: parse_time(open)?,
            close: parse_time(close)?,
        })),
        _ => Err(DataSourceError::Validation(
            "open day is missing open or close time".to_string(),
        )),
    }
}

fn validate_span(
    is_open: bool,
    open_time: &Option<String>,
    close_time: &Option<String>,
) -> std::result::Result<(), DataSourceError> {
    to_span(is_open, open_time, close_time).map(|_| ())
}

fn parse_time(value: &str) -> std::result::Result<NaiveTime, DataSourceError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| DataSourceError::Validation(format!("invalid time '{}', expected HH:MM", value)))
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_timezone(name: &str) -> std::result::Result<Tz, DataSourceError> {
    name.parse::<Tz>()
        .map_err(|_| DataSourceError::Validation(format!("unknown time zone '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekday_hours() -> BusinessHours {
        BusinessHours {
            business_id: "biz-3".to_string(),
            timezone: "UTC".to_string(),
            days: vec![
                DayHours::open(Weekday::Mon, "09:00", "17:00"),
                DayHours::open(Weekday::Tue, "09:00", "17:00"),
                DayHours::open(Weekday::Wed, "09:00", "17:00"),
                DayHours::open(Weekday::Thu, "09:00", "17:00"),
                DayHours::open(Weekday::Fri, "09:00", "17:00"),
                DayHours::open(Weekday::Sat, "20:00", "02:00"),
                DayHours::closed(Weekday::Sun),
            ],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn friday() -> NaiveDate {
        date(2024, 3, 15)
    }

    #[test]
    fn test_open_during_weekday_hours() {
        let hours = weekday_hours();
        let resolver = DayResolver { hours: &hours, specials: &[] };

        let status = resolver.status_at(friday(), time(15, 0)).unwrap();
        assert!(status.is_open);
        assert_eq!(status.next_close_time.as_deref(), Some("17:00"));
        assert_eq!(status.next_open, None);
    }

    #[test]
    fn test_closed_at_close_time() {
        let hours = weekday_hours();
        let resolver = DayResolver { hours: &hours, specials: &[] };

        let status = resolver.status_at(friday(), time(17, 0)).unwrap();
        assert!(!status.is_open);
        // Saturday evening opening
        assert_eq!(
            status.next_open,
            Some(NextOpening { date: date(2024, 3, 16), time: "20:00".to_string() })
        );
    }

    #[test]
    fn test_before_opening_reports_same_day() {
        let hours = weekday_hours();
        let resolver = DayResolver { hours: &hours, specials: &[] };

        let status = resolver.status_at(friday(), time(7, 30)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.next_open.unwrap().date, friday());
    }

    #[test]
    fn test_overnight_span_carries_into_next_day() {
        let hours = weekday_hours();
        let resolver = DayResolver { hours: &hours, specials: &[] };
        let saturday = date(2024, 3, 16);
        let sunday = date(2024, 3, 17);

        assert!(resolver.status_at(saturday, time(23, 0)).unwrap().is_open);

        let status = resolver.status_at(sunday, time(1, 30)).unwrap();
        assert!(status.is_open);
        assert_eq!(status.next_close_time.as_deref(), Some("02:00"));

        let status = resolver.status_at(sunday, time(3, 0)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.next_open.unwrap().date, date(2024, 3, 18));
    }

    #[test]
    fn test_special_hours_override() {
        let hours = weekday_hours();
        let specials = vec![SpecialHours {
            date: friday(),
            is_open: false,
            open_time: None,
            close_time: None,
            reason: Some("Holiday".to_string()),
        }];
        let resolver = DayResolver { hours: &hours, specials: &specials };

        let status = resolver.status_at(friday(), time(15, 0)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.reason.as_deref(), Some("Holiday"));
    }

    #[test]
    fn test_validation_helpers() {
        assert!(parse_timezone("America/Chicago").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
        assert!(parse_time("25:00").is_err());
        assert!(validate_span(true, &Some("09:00".into()), &None).is_err());
        assert!(validate_span(false, &None, &None).is_ok());
    }

    #[test]
    fn test_open_status_serializes_camel_case() {
        let json = serde_json::to_value(open_until(time(17, 0), None)).unwrap();
        assert_eq!(json, serde_json::json!({"isOpen": true, "nextCloseTime": "17:00"}));
    }
}
