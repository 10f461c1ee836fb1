//! Knowledge store
//!
//! Persists accounts, the cached cluster snapshot and recommendations.
//! Every record except the account carries an expiry; expired records read
//! back as missing. [`DynamoStore`] is the production backend and
//! [`MemoryStore`] keeps the same semantics in process.

mod dynamo;
mod memory;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{
    Account, AccountRecommendation, ClusterSnapshot, Health, Priority, ServiceRecommendation,
    ServiceRecommendationRecord, StoredRecommendation,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which backend the service should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Dynamodb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Accounts, cluster snapshots and account-wide recommendations
    pub knowledge_table: String,
    /// Per-service recommendations
    pub recommendations_table: String,
    pub account_recommendation_ttl_secs: i64,
    pub service_recommendation_ttl_secs: i64,
    pub cluster_data_ttl_secs: i64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Dynamodb,
            knowledge_table: "ecs-monitoring-knowledge".to_string(),
            recommendations_table: "ecs-service-recommendation".to_string(),
            account_recommendation_ttl_secs: 30 * 24 * 3600,
            service_recommendation_ttl_secs: 7 * 24 * 3600,
            cluster_data_ttl_secs: 24 * 3600,
        }
    }
}

impl StoreSettings {
    pub fn ttl(&self) -> StoreTtl {
        StoreTtl {
            account_recommendation: Duration::seconds(self.account_recommendation_ttl_secs),
            service_recommendation: Duration::seconds(self.service_recommendation_ttl_secs),
            cluster_data: Duration::seconds(self.cluster_data_ttl_secs),
        }
    }
}

/// Lifetimes of the expiring record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTtl {
    pub account_recommendation: Duration,
    pub service_recommendation: Duration,
    pub cluster_data: Duration,
}

impl Default for StoreTtl {
    fn default() -> Self {
        StoreSettings::default().ttl()
    }
}

/// Health and priority filter for stored service recommendations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationFilter {
    pub health: Option<Health>,
    pub priority: Option<Priority>,
}

impl RecommendationFilter {
    pub fn matches(&self, record: &ServiceRecommendationRecord) -> bool {
        self.health.map_or(true, |h| record.service_health == h)
            && self.priority.map_or(true, |p| record.priority == p)
    }

    /// `health=..., priority=...`, or `all` without filters
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(health) = self.health {
            parts.push(format!("health={}", health.as_str()));
        }
        if let Some(priority) = self.priority {
            parts.push(format!("priority={}", priority.as_str()));
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Record count for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub account_id: String,
    pub total_records: usize,
    pub last_updated: String,
    pub status: String,
}

impl KnowledgeSummary {
    fn new(account_id: &str, total_records: usize) -> Self {
        Self {
            account_id: account_id.to_string(),
            total_records,
            last_updated: Utc::now().to_rfc3339(),
            status: "active".to_string(),
        }
    }
}

/// Persistent state shared by every account
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or replace an account
    async fn put_account(&self, account: &Account) -> Result<()>;

    async fn accounts(&self) -> Result<Vec<Account>>;

    async fn account(&self, account_id: &str) -> Result<Option<Account>>;

    async fn put_cluster_snapshot(&self, account_id: &str, snapshot: &ClusterSnapshot) -> Result<()>;

    async fn cluster_snapshot(&self, account_id: &str) -> Result<Option<ClusterSnapshot>>;

    /// Replace the account-wide recommendation
    async fn put_account_recommendation(
        &self,
        account_id: &str,
        recommendation: &AccountRecommendation,
    ) -> Result<()>;

    async fn account_recommendation(&self, account_id: &str) -> Result<Option<StoredRecommendation>>;

    /// Replace the recommendation of one service
    async fn put_service_recommendation(
        &self,
        account_id: &str,
        cluster: &str,
        service: &str,
        recommendation: &ServiceRecommendation,
    ) -> Result<()>;

    /// Current service recommendations of an account, ordered by cluster then service
    async fn service_recommendations(
        &self,
        account_id: &str,
        filter: &RecommendationFilter,
    ) -> Result<Vec<ServiceRecommendationRecord>>;

    async fn knowledge_summary(&self, account_id: &str) -> Result<KnowledgeSummary>;
}

fn service_record(
    account_id: &str,
    cluster: &str,
    service: &str,
    recommendation: &ServiceRecommendation,
    timestamp: DateTime<Utc>,
) -> ServiceRecommendationRecord {
    ServiceRecommendationRecord {
        account_id: account_id.to_string(),
        cluster: cluster.to_string(),
        service: service.to_string(),
        service_health: recommendation.service_health,
        scaling_action: recommendation.scaling_action,
        priority: recommendation.priority,
        timestamp: timestamp.to_rfc3339(),
        full_recommendation: recommendation.clone(),
    }
}

/// Sort key shared by both backends
fn service_cluster_key(cluster: &str, service: &str) -> String {
    format!("{}#{}", cluster, service)
}
