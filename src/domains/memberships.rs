//! Membership Queries
//!
//! Who belongs to which business, and in what role.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataSourceError, Result};
use crate::query::{CachedQuery, QueryEngine, QueryResult, WriteResult};

pub const DOMAIN: &str = "memberships";

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

// == Models ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Admin,
    Manager,
    Technician,
    Csr,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Invited,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub business_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MembershipStatus,
    pub joined_at: DateTime<Utc>,
}

// == Data Source ==
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn members_of(
        &self,
        business_id: &str,
    ) -> std::result::Result<Vec<Membership>, DataSourceError>;

    async fn memberships_for_user(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<Membership>, DataSourceError>;

    /// Creates an invited membership.
    async fn insert_membership(
        &self,
        business_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> std::result::Result<Membership, DataSourceError>;

    async fn update_role(
        &self,
        business_id: &str,
        membership_id: &str,
        role: MemberRole,
    ) -> std::result::Result<Membership, DataSourceError>;

    /// Deletes the membership and returns the removed row.
    async fn delete_membership(
        &self,
        business_id: &str,
        membership_id: &str,
    ) -> std::result::Result<Membership, DataSourceError>;
}

#[derive(Debug, Serialize)]
struct NoParams {}

// == Membership Queries ==
pub struct MembershipQueries {
    engine: QueryEngine,
    source: Arc<dyn MembershipSource>,
    business_members: CachedQuery<NoParams, Vec<Membership>>,
    user_memberships: CachedQuery<NoParams, Vec<Membership>>,
}

impl MembershipQueries {
    pub fn new(engine: QueryEngine, source: Arc<dyn MembershipSource>, ttl: Duration) -> Self {
        Self {
            engine,
            source,
            business_members: CachedQuery::new(DOMAIN, "business_members", ttl),
            user_memberships: CachedQuery::new(DOMAIN, "user_memberships", ttl),
        }
    }

    pub async fn get_business_members(
        &self,
        business_id: &str,
    ) -> Result<QueryResult<Vec<Membership>>> {
        self.engine
            .read(&self.business_members, business_id, &NoParams {}, || {
                self.source.members_of(business_id)
            })
            .await
    }

    /// Memberships across all businesses; partitioned by user id.
    pub async fn get_user_memberships(&self, user_id: &str) -> Result<QueryResult<Vec<Membership>>> {
        self.engine
            .read(&self.user_memberships, user_id, &NoParams {}, || {
                self.source.memberships_for_user(user_id)
            })
            .await
    }

    /// Role of an active member, `None` for non-members and inactive rows.
    pub async fn get_member_role(&self, business_id: &str, user_id: &str) -> Result<Option<MemberRole>> {
        let members = self.get_business_members(business_id).await?.into_data();

        Ok(members
            .iter()
            .find(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .map(|m| m.role))
    }

    pub async fn invite_member(
        &self,
        business_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> WriteResult<Membership> {
        self.engine
            .write(
                "memberships.invite",
                self.source.insert_membership(business_id, user_id, role),
                |m| self.invalidation_set(m),
            )
            .await
    }

    pub async fn update_member_role(
        &self,
        business_id: &str,
        membership_id: &str,
        role: MemberRole,
    ) -> WriteResult<Membership> {
        self.engine
            .write(
                "memberships.update_role",
                self.source.update_role(business_id, membership_id, role),
                |m| self.invalidation_set(m),
            )
            .await
    }

    pub async fn remove_member(&self, business_id: &str, membership_id: &str) -> WriteResult<Membership> {
        self.engine
            .write(
                "memberships.remove",
                self.source.delete_membership(business_id, membership_id),
                |m| self.invalidation_set(m),
            )
            .await
    }

    /// Both sides of a membership row: the business roster and the user's list.
    pub fn invalidation_set(&self, membership: &Membership) -> Vec<String> {
        vec![
            self.business_members.prefix(&membership.business_id),
            self.user_memberships.prefix(&membership.user_id),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(MemberRole::Csr).unwrap(), "csr");
        let role: MemberRole = serde_json::from_str("\"technician\"").unwrap();
        assert_eq!(role, MemberRole::Technician);
    }

    #[test]
    fn test_membership_round_trip_fields() {
        let json = serde_json::json!({
            "id": "m-1",
            "businessId": "biz-1",
            "userId": "user-1",
            "role": "owner",
            "status": "active",
            "joinedAt": "2024-03-15T12:00:00Z"
        });
        let membership: Membership = serde_json::from_value(json).unwrap();
        assert_eq!(membership.role, MemberRole::Owner);
        assert_eq!(membership.status, MembershipStatus::Active);
    }
}
