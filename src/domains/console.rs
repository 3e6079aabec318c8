//! CSR Console Queries
//!
//! Support ticket queue and counters shown to customer service reps.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataSourceError, Result};
use crate::query::{CachedQuery, QueryEngine, QueryResult, WriteResult};

pub const DOMAIN: &str = "csr_console";

/// Console data churns quickly, so entries are short-lived.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60);

// == Models ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub business_id: String,
    pub customer_name: String,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub customer_name: String,
    pub subject: String,
    pub priority: TicketPriority,
}

/// Queue filter; every field is part of the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<String>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.priority.map_or(true, |p| ticket.priority == p)
            && self
                .assigned_to
                .as_ref()
                .map_or(true, |a| ticket.assigned_to.as_ref() == Some(a))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleStats {
    pub open: u32,
    pub pending: u32,
    pub resolved: u32,
    pub closed: u32,
    /// Urgent tickets still open or pending
    pub urgent_active: u32,
    /// Open or pending tickets with no assignee
    pub unassigned: u32,
}

impl ConsoleStats {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut stats = ConsoleStats::default();
        for ticket in tickets {
            let active = matches!(ticket.status, TicketStatus::Open | TicketStatus::Pending);
            match ticket.status {
                TicketStatus::Open => stats.open += 1,
                TicketStatus::Pending => stats.pending += 1,
                TicketStatus::Resolved => stats.resolved += 1,
                TicketStatus::Closed => stats.closed += 1,
            }
            if active && ticket.priority == TicketPriority::Urgent {
                stats.urgent_active += 1;
            }
            if active && ticket.assigned_to.is_none() {
                stats.unassigned += 1;
            }
        }
        stats
    }
}

// == Data Source ==
#[async_trait]
pub trait ConsoleSource: Send + Sync {
    /// Tickets matching `filter`, highest priority first, then oldest first.
    async fn tickets(
        &self,
        business_id: &str,
        filter: &TicketFilter,
    ) -> std::result::Result<Vec<Ticket>, DataSourceError>;

    async fn console_stats(
        &self,
        business_id: &str,
    ) -> std::result::Result<ConsoleStats, DataSourceError>;

    async fn insert_ticket(
        &self,
        business_id: &str,
        ticket: NewTicket,
    ) -> std::result::Result<Ticket, DataSourceError>;

    async fn assign_ticket(
        &self,
        business_id: &str,
        ticket_id: &str,
        assignee: Option<String>,
    ) -> std::result::Result<Ticket, DataSourceError>;

    async fn set_ticket_status(
        &self,
        business_id: &str,
        ticket_id: &str,
        status: TicketStatus,
    ) -> std::result::Result<Ticket, DataSourceError>;
}

#[derive(Debug, Serialize)]
struct NoParams {}

// == Console Queries ==
pub struct ConsoleQueries {
    engine: QueryEngine,
    source: Arc<dyn ConsoleSource>,
    queue: CachedQuery<TicketFilter, Vec<Ticket>>,
    stats: CachedQuery<NoParams, ConsoleStats>,
}

impl ConsoleQueries {
    pub fn new(engine: QueryEngine, source: Arc<dyn ConsoleSource>, ttl: Duration) -> Self {
        Self {
            engine,
            source,
            queue: CachedQuery::new(DOMAIN, "ticket_queue", ttl),
            stats: CachedQuery::new(DOMAIN, "console_stats", ttl),
        }
    }

    pub async fn get_ticket_queue(
        &self,
        business_id: &str,
        filter: &TicketFilter,
    ) -> Result<QueryResult<Vec<Ticket>>> {
        self.engine
            .read(&self.queue, business_id, filter, || {
                self.source.tickets(business_id, filter)
            })
            .await
    }

    pub async fn get_console_stats(&self, business_id: &str) -> Result<QueryResult<ConsoleStats>> {
        self.engine
            .read(&self.stats, business_id, &NoParams {}, || {
                self.source.console_stats(business_id)
            })
            .await
    }

    pub async fn create_ticket(&self, business_id: &str, ticket: NewTicket) -> WriteResult<Ticket> {
        if ticket.subject.trim().is_empty() {
            return WriteResult::failed(
                DataSourceError::Validation("ticket subject cannot be empty".to_string()).to_string(),
            );
        }

        self.engine
            .write(
                "csr_console.create_ticket",
                self.source.insert_ticket(business_id, ticket),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    /// Assigns (or with `None`, unassigns) a ticket.
    pub async fn assign_ticket(
        &self,
        business_id: &str,
        ticket_id: &str,
        assignee: Option<String>,
    ) -> WriteResult<Ticket> {
        self.engine
            .write(
                "csr_console.assign_ticket",
                self.source.assign_ticket(business_id, ticket_id, assignee),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    pub async fn update_ticket_status(
        &self,
        business_id: &str,
        ticket_id: &str,
        status: TicketStatus,
    ) -> WriteResult<Ticket> {
        self.engine
            .write(
                "csr_console.update_ticket_status",
                self.source.set_ticket_status(business_id, ticket_id, status),
                |_| self.invalidation_set(business_id),
            )
            .await
    }

    pub fn invalidation_set(&self, business_id: &str) -> Vec<String> {
        vec![self.queue.prefix(business_id), self.stats.prefix(business_id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ticket(status: TicketStatus, priority: TicketPriority, assigned: Option<&str>) -> Ticket {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
        Ticket {
            id: "t-1".to_string(),
            business_id: "biz-1".to_string(),
            customer_name: "Sam".to_string(),
            subject: "Late technician".to_string(),
            status,
            priority,
            assigned_to: assigned.map(str::to_string),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_filter_matches() {
        let t = ticket(TicketStatus::Open, TicketPriority::High, Some("rep-1"));

        assert!(TicketFilter::default().matches(&t));
        assert!(TicketFilter {
            status: Some(TicketStatus::Open),
            assigned_to: Some("rep-1".to_string()),
            ..Default::default()
        }
        .matches(&t));
        assert!(!TicketFilter {
            priority: Some(TicketPriority::Low),
            ..Default::default()
        }
        .matches(&t));
        assert!(!TicketFilter {
            assigned_to: Some("rep-2".to_string()),
            ..Default::default()
        }
        .matches(&t));
    }

    #[test]
    fn test_stats_from_tickets() {
        let tickets = vec![
            ticket(TicketStatus::Open, TicketPriority::Urgent, None),
            ticket(TicketStatus::Pending, TicketPriority::Normal, Some("rep-1")),
            ticket(TicketStatus::Resolved, TicketPriority::Urgent, None),
            ticket(TicketStatus::Closed, TicketPriority::Low, Some("rep-1")),
        ];
        let stats = ConsoleStats::from_tickets(&tickets);

        assert_eq!(stats.open, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.urgent_active, 1);
        assert_eq!(stats.unassigned, 1);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TicketPriority::Urgent > TicketPriority::High);
        assert!(TicketPriority::Low < TicketPriority::Normal);
    }
}
