//! Schedule Queries
//!
//! Jobs, schedule metrics and technician conflicts for a business.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, DataSourceError, Result};
use crate::query::{CachedQuery, QueryEngine, QueryResult, WriteResult};

pub const DOMAIN: &str = "schedule";

/// Default lifetime of cached schedule reads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

// == Models ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub business_id: String,
    pub title: String,
    pub customer_name: String,
    pub technician_id: Option<String>,
    pub status: JobStatus,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

impl Job {
    /// Whether the job occupies any part of `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_start < end && start < self.scheduled_end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: String,
    pub customer_name: String,
    pub technician_id: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// Reporting window for schedule metrics, anchored on the current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Today,
    Week,
    Month,
}

impl Timeframe {
    /// `[start, end)` covering the last 1, 7 or 30 days including `today`.
    pub fn window(self, today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let days_back = match self {
            Timeframe::Today => 0,
            Timeframe::Week => 6,
            Timeframe::Month => 29,
        };
        let first = today.checked_sub_days(Days::new(days_back)).unwrap_or(today);
        (start_of_day(first), start_of_day(next_day(today)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMetrics {
    pub total_jobs: u32,
    pub scheduled: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
    /// completed / (total - cancelled), 0.0 when nothing is billable
    pub completion_rate: f64,
}

impl ScheduleMetrics {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut metrics = ScheduleMetrics::default();
        for job in jobs {
            metrics.total_jobs += 1;
            match job.status {
                JobStatus::Scheduled => metrics.scheduled += 1,
                JobStatus::InProgress => metrics.in_progress += 1,
                JobStatus::Completed => metrics.completed += 1,
                JobStatus::Cancelled => metrics.cancelled += 1,
            }
        }
        let active = metrics.total_jobs - metrics.cancelled;
        if active > 0 {
            metrics.completion_rate = f64::from(metrics.completed) / f64::from(active);
        }
        metrics
    }
}

// == Data Source ==
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Jobs of `business_id` overlapping `[start, end)`, ordered by start.
    async fn jobs_between(
        &self,
        business_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<Job>, DataSourceError>;

    async fn schedule_metrics(
        &self,
        business_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<ScheduleMetrics, DataSourceError>;

    async fn insert_job(
        &self,
        business_id: &str,
        job: NewJob,
    ) -> std::result::Result<Job, DataSourceError>;

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        business_id: &str,
    ) -> std::result::Result<Job, DataSourceError>;
}

// == Cache Params ==
#[derive(Debug, Serialize)]
struct DayParams {
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct RangeParams {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct MetricsParams {
    timeframe: Timeframe,
    date: NaiveDate,
}

// == Schedule Queries ==
pub struct ScheduleQueries {
    engine: QueryEngine,
    source: Arc<dyn ScheduleSource>,
    todays_jobs: CachedQuery<DayParams, Vec<Job>>,
    jobs_in_range: CachedQuery<RangeParams, Vec<Job>>,
    metrics: CachedQuery<MetricsParams, ScheduleMetrics>,
}

impl ScheduleQueries {
    pub fn new(engine: QueryEngine, source: Arc<dyn ScheduleSource>, ttl: Duration) -> Self {
        Self {
            engine,
            source,
            todays_jobs: CachedQuery::new(DOMAIN, "todays_jobs", ttl),
            jobs_in_range: CachedQuery::new(DOMAIN, "jobs_in_range", ttl),
            metrics: CachedQuery::new(DOMAIN, "schedule_metrics", ttl),
        }
    }

    /// Jobs overlapping the current UTC day.
    pub async fn get_todays_jobs(&self, business_id: &str) -> Result<QueryResult<Vec<Job>>> {
        let date = self.engine.now_utc().date_naive();
        let (start, end) = (start_of_day(date), start_of_day(next_day(date)));

        self.engine
            .read(&self.todays_jobs, business_id, &DayParams { date }, || {
                self.source.jobs_between(business_id, start, end)
            })
            .await
    }

    pub async fn get_jobs_in_range(
        &self,
        business_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<QueryResult<Vec<Job>>> {
        validate_window(start, end)?;

        self.engine
            .read(&self.jobs_in_range, business_id, &RangeParams { start, end }, || {
                self.source.jobs_between(business_id, start, end)
            })
            .await
    }

    pub async fn get_schedule_metrics(
        &self,
        business_id: &str,
        timeframe: Timeframe,
    ) -> Result<QueryResult<ScheduleMetrics>> {
        let date = self.engine.now_utc().date_naive();
        let (start, end) = timeframe.window(date);

        self.engine
            .read(
                &self.metrics,
                business_id,
                &MetricsParams { timeframe, date },
                || self.source.schedule_metrics(business_id, start, end),
            )
            .await
    }

    /// Non-cancelled jobs of `technician_id` overlapping `[start, end)`.
    ///
    /// Built on the cached range read; the result itself is not cached.
    pub async fn find_conflicts(
        &self,
        business_id: &str,
        technician_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Job>> {
        let jobs = self.get_jobs_in_range(business_id, start, end).await?.into_data();

        Ok(jobs
            .into_iter()
            .filter(|job| job.technician_id.as_deref() == Some(technician_id))
            .filter(|job| job.status != JobStatus::Cancelled)
            .filter(|job| job.overlaps(start, end))
            .collect())
    }

    pub async fn create_job(&self, business_id: &str, job: NewJob) -> WriteResult<Job> {
        if let Err(err) = validate_window(job.scheduled_start, job.scheduled_end) {
            return WriteResult::failed(err.to_string());
        }

        self.engine
            .write(
                "schedule.create_job",
                self.source.insert_job(business_id, job),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        business_id: &str,
    ) -> WriteResult<Job> {
        self.engine
            .write(
                "schedule.update_job_status",
                self.source.update_job_status(job_id, status, business_id),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    /// Every prefix a job mutation can make stale for `business_id`.
    pub fn invalidation_set(&self, business_id: &str) -> Vec<String> {
        vec![
            self.todays_jobs.prefix(business_id),
            self.jobs_in_range.prefix(business_id),
            self.metrics.prefix(business_id),
        ]
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(CacheError::DataSource(DataSourceError::Validation(format!(
            "window end {} is not after start {}",
            end, start
        ))));
    }
    Ok(())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}
