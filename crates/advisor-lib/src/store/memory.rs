//! In-process knowledge store

use super::{
    service_cluster_key, service_record, KnowledgeStore, KnowledgeSummary, RecommendationFilter,
    StoreTtl,
};
use crate::error::Result;
use crate::models::{
    Account, AccountRecommendation, ClusterSnapshot, ServiceRecommendation,
    ServiceRecommendationRecord, StoredRecommendation,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T: Clone> Expiring<T> {
    fn new(value: T, ttl: chrono::Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    fn live(&self) -> Option<T> {
        (!self.expired(Utc::now())).then(|| self.value.clone())
    }

    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Knowledge store backed by concurrent maps, lost on restart
pub struct MemoryStore {
    ttl: StoreTtl,
    accounts: DashMap<String, Account>,
    snapshots: DashMap<String, Expiring<ClusterSnapshot>>,
    recommendations: DashMap<String, Expiring<StoredRecommendation>>,
    /// Keyed by account id and `cluster#service`
    services: DashMap<(String, String), Expiring<ServiceRecommendationRecord>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreTtl::default())
    }
}

impl MemoryStore {
    pub fn new(ttl: StoreTtl) -> Self {
        Self {
            ttl,
            accounts: DashMap::new(),
            snapshots: DashMap::new(),
            recommendations: DashMap::new(),
            services: DashMap::new(),
        }
    }

    /// Drop every entry past its expiry, run before each write
    fn evict_expired(&self) {
        let now = Utc::now();
        self.snapshots.retain(|_, e| !e.expired(now));
        self.recommendations.retain(|_, e| !e.expired(now));
        self.services.retain(|_, e| !e.expired(now));
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn put_account(&self, account: &Account) -> Result<()> {
        self.accounts.insert(account.account_id.clone(), account.clone());
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|e| e.value().clone()).collect();
        accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(accounts)
    }

    async fn account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(account_id).map(|e| e.value().clone()))
    }

    async fn put_cluster_snapshot(
        &self,
        account_id: &str,
        snapshot: &ClusterSnapshot,
    ) -> Result<()> {
        self.evict_expired();
        self.snapshots.insert(
            account_id.to_string(),
            Expiring::new(snapshot.clone(), self.ttl.cluster_data),
        );
        Ok(())
    }

    async fn cluster_snapshot(&self, account_id: &str) -> Result<Option<ClusterSnapshot>> {
        let now = Utc::now();
        self.snapshots.remove_if(account_id, |_, e| e.expired(now));
        Ok(self.snapshots.get(account_id).and_then(|e| e.live()))
    }

    async fn put_account_recommendation(
        &self,
        account_id: &str,
        recommendation: &AccountRecommendation,
    ) -> Result<()> {
        let stored = StoredRecommendation {
            recommendation: recommendation.clone(),
            stored_at: Utc::now().to_rfc3339(),
        };
        self.evict_expired();
        self.recommendations.insert(
            account_id.to_string(),
            Expiring::new(stored, self.ttl.account_recommendation),
        );
        Ok(())
    }

    async fn account_recommendation(
        &self,
        account_id: &str,
    ) -> Result<Option<StoredRecommendation>> {
        let now = Utc::now();
        self.recommendations.remove_if(account_id, |_, e| e.expired(now));
        Ok(self.recommendations.get(account_id).and_then(|e| e.live()))
    }

    async fn put_service_recommendation(
        &self,
        account_id: &str,
        cluster: &str,
        service: &str,
        recommendation: &ServiceRecommendation,
    ) -> Result<()> {
        let record = service_record(account_id, cluster, service, recommendation, Utc::now());
        self.evict_expired();
        self.services.insert(
            (account_id.to_string(), service_cluster_key(cluster, service)),
            Expiring::new(record, self.ttl.service_recommendation),
        );
        Ok(())
    }

    async fn service_recommendations(
        &self,
        account_id: &str,
        filter: &RecommendationFilter,
    ) -> Result<Vec<ServiceRecommendationRecord>> {
        let now = Utc::now();
        self.services.retain(|_, e| !e.expired(now));
        let mut records: Vec<(String, ServiceRecommendationRecord)> = self
            .services
            .iter()
            .filter(|e| e.key().0 == account_id)
            .filter_map(|e| e.value().live().map(|r| (e.key().1.clone(), r)))
            .filter(|(_, r)| filter.matches(r))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records.into_iter().map(|(_, r)| r).collect())
    }

    async fn knowledge_summary(&self, account_id: &str) -> Result<KnowledgeSummary> {
        let total = usize::from(self.accounts.contains_key(account_id))
            + usize::from(self.cluster_snapshot(account_id).await?.is_some())
            + usize::from(self.account_recommendation(account_id).await?.is_some());
        Ok(KnowledgeSummary::new(account_id, total))
    }
}
