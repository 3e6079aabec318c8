//! In-Memory Data Source
//!
//! Implements every domain's source trait over plain collections. Counts
//! calls per operation and can be told to fail or stall, which is what the
//! cache tests need to observe hits, misses and error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{Clock, SystemClock};
use crate::domains::console::{ConsoleStats, NewTicket, Ticket, TicketFilter, TicketStatus};
use crate::domains::hours::{BusinessHours, SpecialHours};
use crate::domains::memberships::{MemberRole, Membership, MembershipStatus};
use crate::domains::schedule::{Job, JobStatus, NewJob, ScheduleMetrics};
use crate::domains::{ConsoleSource, HoursSource, MembershipSource, ScheduleSource};
use crate::error::DataSourceError;

type SourceResult<T> = std::result::Result<T, DataSourceError>;

#[derive(Debug, Default)]
struct Tables {
    jobs: Vec<Job>,
    hours: HashMap<String, BusinessHours>,
    special_hours: HashMap<String, Vec<SpecialHours>>,
    memberships: Vec<Membership>,
    tickets: Vec<Ticket>,
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<String>,
    latency: Option<Duration>,
}

// == In-Memory Directory ==
#[derive(Debug)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
    calls: Mutex<HashMap<String, u64>>,
    faults: Mutex<Faults>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Uses `clock` for generated timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    // == Seeding (not counted as calls) ==
    pub async fn seed_job(&self, job: Job) {
        self.tables.write().await.jobs.push(job);
    }

    pub async fn seed_hours(&self, hours: BusinessHours) {
        self.tables
            .write()
            .await
            .hours
            .insert(hours.business_id.clone(), hours);
    }

    pub async fn seed_special_hours(&self, business_id: &str, special: SpecialHours) {
        let mut tables = self.tables.write().await;
        upsert_special(tables.special_hours.entry(business_id.to_string()).or_default(), special);
    }

    pub async fn seed_membership(&self, membership: Membership) {
        self.tables.write().await.memberships.push(membership);
    }

    pub async fn seed_ticket(&self, ticket: Ticket) {
        self.tables.write().await.tickets.push(ticket);
    }

    // == Fault Injection ==
    /// Makes `operation` fail with a backend error until cleared.
    pub fn fail(&self, operation: &str) {
        lock(&self.faults).failing.insert(operation.to_string());
    }

    pub fn recover(&self, operation: &str) {
        lock(&self.faults).failing.remove(operation);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.faults).latency = latency;
    }

    /// Number of times `operation` was called, failed calls included.
    pub fn call_count(&self, operation: &str) -> u64 {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    async fn enter(&self, operation: &str) -> SourceResult<()> {
        *lock(&self.calls).entry(operation.to_string()).or_insert(0) += 1;

        let (failing, latency) = {
            let faults = lock(&self.faults);
            (faults.failing.contains(operation), faults.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failing {
            debug!("In-memory source failing {} on request", operation);
            return Err(DataSourceError::Backend(format!("{} unavailable", operation)));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn upsert_special(rows: &mut Vec<SpecialHours>, special: SpecialHours) {
    match rows.iter_mut().find(|row| row.date == special.date) {
        Some(row) => *row = special,
        None => rows.push(special),
    }
    rows.sort_by_key(|row| row.date);
}

fn jobs_overlapping(tables: &Tables, business_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Job> {
    let mut jobs: Vec<Job> = tables
        .jobs
        .iter()
        .filter(|job| job.business_id == business_id && job.overlaps(start, end))
        .cloned()
        .collect();
    jobs.sort_by_key(|job| job.scheduled_start);
    jobs
}

// == Schedule ==
#[async_trait]
impl ScheduleSource for InMemoryDirectory {
    async fn jobs_between(
        &self,
        business_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<Job>> {
        self.enter("jobs_between").await?;
        let tables = self.tables.read().await;
        Ok(jobs_overlapping(&tables, business_id, start, end))
    }

    async fn schedule_metrics(
        &self,
        business_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<ScheduleMetrics> {
        self.enter("schedule_metrics").await?;
        let tables = self.tables.read().await;
        Ok(ScheduleMetrics::from_jobs(&jobs_overlapping(&tables, business_id, start, end)))
    }

    async fn insert_job(&self, business_id: &str, job: NewJob) -> SourceResult<Job> {
        self.enter("insert_job").await?;
        let job = Job {
            id: self.next_id("job"),
            business_id: business_id.to_string(),
            title: job.title,
            customer_name: job.customer_name,
            technician_id: job.technician_id,
            status: JobStatus::Scheduled,
            scheduled_start: job.scheduled_start,
            scheduled_end: job.scheduled_end,
        };
        self.tables.write().await.jobs.push(job.clone());
        Ok(job)
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        business_id: &str,
    ) -> SourceResult<Job> {
        self.enter("update_job_status").await?;
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id && job.business_id == business_id)
            .ok_or_else(|| DataSourceError::NotFound(format!("job {}", job_id)))?;
        job.status = status;
        Ok(job.clone())
    }
}

// == Business Hours ==
#[async_trait]
impl HoursSource for InMemoryDirectory {
    async fn business_hours(&self, business_id: &str) -> SourceResult<BusinessHours> {
        self.enter("business_hours").await?;
        self.tables
            .read()
            .await
            .hours
            .get(business_id)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(format!("hours for {}", business_id)))
    }

    async fn special_hours_from(
        &self,
        business_id: &str,
        from: NaiveDate,
    ) -> SourceResult<Vec<SpecialHours>> {
        self.enter("special_hours_from").await?;
        let tables = self.tables.read().await;
        Ok(tables
            .special_hours
            .get(business_id)
            .map(|rows| rows.iter().filter(|row| row.date >= from).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_business_hours(&self, hours: BusinessHours) -> SourceResult<BusinessHours> {
        self.enter("upsert_business_hours").await?;
        self.tables
            .write()
            .await
            .hours
            .insert(hours.business_id.clone(), hours.clone());
        Ok(hours)
    }

    async fn upsert_special_hours(
        &self,
        business_id: &str,
        special: SpecialHours,
    ) -> SourceResult<SpecialHours> {
        self.enter("upsert_special_hours").await?;
        let mut tables = self.tables.write().await;
        upsert_special(
            tables.special_hours.entry(business_id.to_string()).or_default(),
            special.clone(),
        );
        Ok(special)
    }
}

// == Memberships ==
#[async_trait]
impl MembershipSource for InMemoryDirectory {
    async fn members_of(&self, business_id: &str) -> SourceResult<Vec<Membership>> {
        self.enter("members_of").await?;
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn memberships_for_user(&self, user_id: &str) -> SourceResult<Vec<Membership>> {
        self.enter("memberships_for_user").await?;
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_membership(
        &self,
        business_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> SourceResult<Membership> {
        self.enter("insert_membership").await?;
        let mut tables = self.tables.write().await;
        if tables
            .memberships
            .iter()
            .any(|m| m.business_id == business_id && m.user_id == user_id)
        {
            return Err(DataSourceError::Validation(format!(
                "{} is already a member of {}",
                user_id, business_id
            )));
        }

        let membership = Membership {
            id: self.next_id("membership"),
            business_id: business_id.to_string(),
            user_id: user_id.to_string(),
            role,
            status: MembershipStatus::Invited,
            joined_at: self.clock.now_utc(),
        };
        tables.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn update_role(
        &self,
        business_id: &str,
        membership_id: &str,
        role: MemberRole,
    ) -> SourceResult<Membership> {
        self.enter("update_role").await?;
        let mut tables = self.tables.write().await;
        let membership = tables
            .memberships
            .iter_mut()
            .find(|m| m.id == membership_id && m.business_id == business_id)
            .ok_or_else(|| DataSourceError::NotFound(format!("membership {}", membership_id)))?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn delete_membership(&self, business_id: &str, membership_id: &str) -> SourceResult<Membership> {
        self.enter("delete_membership").await?;
        let mut tables = self.tables.write().await;
        let index = tables
            .memberships
            .iter()
            .position(|m| m.id == membership_id && m.business_id == business_id)
            .ok_or_else(|| DataSourceError::NotFound(format!("membership {}", membership_id)))?;
        Ok(tables.memberships.remove(index))
    }
}

// == CSR Console ==
#[async_trait]
impl ConsoleSource for InMemoryDirectory {
    async fn tickets(&self, business_id: &str, filter: &TicketFilter) -> SourceResult<Vec<Ticket>> {
        self.enter("tickets").await?;
        let tables = self.tables.read().await;
        let mut tickets: Vec<Ticket> = tables
            .tickets
            .iter()
            .filter(|t| t.business_id == business_id && filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(tickets)
    }

    async fn console_stats(&self, business_id: &str) -> SourceResult<ConsoleStats> {
        self.enter("console_stats").await?;
        let tables = self.tables.read().await;
        let tickets: Vec<Ticket> = tables
            .tickets
            .iter()
            .filter(|t| t.business_id == business_id)
            .cloned()
            .collect();
        Ok(ConsoleStats::from_tickets(&tickets))
    }

    async fn insert_ticket(&self, business_id: &str, ticket: NewTicket) -> SourceResult<Ticket> {
        self.enter("insert_ticket").await?;
        let now = self.clock.now_utc();
        let ticket = Ticket {
            id: self.next_id("ticket"),
            business_id: business_id.to_string(),
            customer_name: ticket.customer_name,
            subject: ticket.subject,
            status: TicketStatus::Open,
            priority: ticket.priority,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn assign_ticket(
        &self,
        business_id: &str,
        ticket_id: &str,
        assignee: Option<String>,
    ) -> SourceResult<Ticket> {
        self.enter("assign_ticket").await?;
        let now = self.clock.now_utc();
        let mut tables = self.tables.write().await;
        let ticket = find_ticket(&mut tables, business_id, ticket_id)?;
        ticket.assigned_to = assignee;
        ticket.updated_at = now;
        Ok(ticket.clone())
    }

    async fn set_ticket_status(
        &self,
        business_id: &str,
        ticket_id: &str,
        status: TicketStatus,
    ) -> SourceResult<Ticket> {
        self.enter("set_ticket_status").await?;
        let now = self.clock.now_utc();
        let mut tables = self.tables.write().await;
        let ticket = find_ticket(&mut tables, business_id, ticket_id)?;
        ticket.status = status;
        ticket.updated_at = now;
        Ok(ticket.clone())
    }
}

fn find_ticket<'a>(tables: &'a mut Tables, business_id: &str, ticket_id: &str) -> SourceResult<&'a mut Ticket> {
    tables
        .tickets
        .iter_mut()
        .find(|t| t.id == ticket_id && t.business_id == business_id)
        .ok_or_else(|| DataSourceError::NotFound(format!("ticket {}", ticket_id)))
}
