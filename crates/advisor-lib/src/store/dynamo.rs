//! DynamoDB knowledge store
//!
//! Two tables:
//! - knowledge table, keyed by `pk = ACCOUNT#{id}` and `sk` in
//!   `ACCOUNT_DATA`, `CLUSTER_DATA`, `RECOMMENDATIONS`
//! - service recommendation table, keyed by `account_id` and
//!   `service_cluster_key = {cluster}#{service}`
//!
//! Structured payloads are stored as JSON strings. Expiring items carry an
//! epoch-seconds `ttl` attribute; DynamoDB deletes them lazily, so reads
//! skip anything already past it.

use super::{
    service_cluster_key, service_record, KnowledgeStore, KnowledgeSummary, RecommendationFilter,
    StoreSettings, StoreTtl,
};
use crate::error::{AdvisorError, Result};
use crate::models::{
    Account, AccountRecommendation, ClusterSnapshot, Health, Priority, ScalingAction,
    ServiceRecommendation, ServiceRecommendationRecord, StoredRecommendation,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, warn};

type Item = HashMap<String, AttributeValue>;

const ACCOUNT_DATA: &str = "ACCOUNT_DATA";
const CLUSTER_DATA: &str = "CLUSTER_DATA";
const RECOMMENDATIONS: &str = "RECOMMENDATIONS";

pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    knowledge_table: String,
    recommendations_table: String,
    ttl: StoreTtl,
}

impl DynamoStore {
    pub fn new(config: &SdkConfig, settings: &StoreSettings) -> Self {
        Self {
            client: aws_sdk_dynamodb::Client::new(config),
            knowledge_table: settings.knowledge_table.clone(),
            recommendations_table: settings.recommendations_table.clone(),
            ttl: settings.ttl(),
        }
    }

    async fn put(&self, table: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| AdvisorError::store("PutItem", e))?;
        Ok(())
    }

    /// A live knowledge item of the account
    async fn knowledge_item(&self, account_id: &str, sk: &str) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.knowledge_table)
            .key("pk", s(pk(account_id)))
            .key("sk", s(sk))
            .send()
            .await
            .map_err(|e| AdvisorError::store("GetItem", e))?;

        Ok(output.item().filter(|item| !expired(item)).cloned())
    }
}

fn pk(account_id: &str) -> String {
    format!("ACCOUNT#{}", account_id)
}

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn expires_in(ttl: Duration) -> AttributeValue {
    AttributeValue::N((Utc::now() + ttl).timestamp().to_string())
}

/// String attribute, `None` when missing or empty
fn text(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .filter(|v| !v.is_empty())
        .cloned()
}

fn required(item: &Item, name: &str) -> Result<String> {
    text(item, name)
        .ok_or_else(|| AdvisorError::Store(format!("item is missing attribute '{}'", name)))
}

/// A required attribute holding one of the lowercase enum names
fn parsed<T>(item: &Item, name: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    required(item, name)?
        .parse()
        .map_err(|e| AdvisorError::Store(format!("attribute '{}': {}", name, e)))
}

fn expired(item: &Item) -> bool {
    item.get("ttl")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .is_some_and(|ttl| ttl <= Utc::now().timestamp())
}

fn account_item(account: &Account) -> Item {
    let optional = |v: &Option<String>| s(v.clone().unwrap_or_default());
    let now = Utc::now().to_rfc3339();
    HashMap::from([
        ("pk".to_string(), s(pk(&account.account_id))),
        ("sk".to_string(), s(ACCOUNT_DATA)),
        ("account_id".to_string(), s(&account.account_id)),
        ("account_name".to_string(), s(&account.account_name)),
        ("region".to_string(), s(&account.region)),
        ("access_key".to_string(), optional(&account.access_key)),
        ("secret_key".to_string(), optional(&account.secret_key)),
        ("session_token".to_string(), optional(&account.session_token)),
        ("profile_name".to_string(), optional(&account.profile_name)),
        ("role_arn".to_string(), optional(&account.role_arn)),
        (
            "created_at".to_string(),
            s(account.created_at.clone().unwrap_or_else(|| now.clone())),
        ),
        (
            "last_updated".to_string(),
            s(account.last_updated.clone().unwrap_or(now)),
        ),
    ])
}

fn account_from_item(item: &Item) -> Result<Account> {
    Ok(Account {
        account_id: required(item, "account_id")?,
        account_name: text(item, "account_name").unwrap_or_default(),
        region: required(item, "region")?,
        access_key: text(item, "access_key"),
        secret_key: text(item, "secret_key"),
        session_token: text(item, "session_token"),
        profile_name: text(item, "profile_name"),
        role_arn: text(item, "role_arn"),
        created_at: text(item, "created_at"),
        last_updated: text(item, "last_updated"),
    })
}

fn service_item(record: &ServiceRecommendationRecord, ttl: Duration) -> Result<Item> {
    Ok(HashMap::from([
        ("account_id".to_string(), s(&record.account_id)),
        (
            "service_cluster_key".to_string(),
            s(service_cluster_key(&record.cluster, &record.service)),
        ),
        ("service".to_string(), s(&record.service)),
        ("cluster".to_string(), s(&record.cluster)),
        ("service_health".to_string(), s(record.service_health.as_str())),
        ("scaling_action".to_string(), s(record.scaling_action.as_str())),
        ("priority".to_string(), s(record.priority.as_str())),
        (
            "recommendations".to_string(),
            s(serde_json::to_string(&record.full_recommendation)?),
        ),
        ("timestamp".to_string(), s(&record.timestamp)),
        ("ttl".to_string(), expires_in(ttl)),
    ]))
}

/// Sum the counts of every page, following `LastEvaluatedKey` until it runs out
async fn count_pages<F, Fut>(mut page: F) -> Result<usize>
where
    F: FnMut(Option<Item>) -> Fut,
    Fut: Future<Output = Result<(i32, Option<Item>)>>,
{
    let mut records = 0usize;
    let mut start_key = None;
    loop {
        let (count, last_key) = page(start_key).await?;
        records += count.max(0) as usize;
        match last_key {
            Some(key) if !key.is_empty() => start_key = Some(key),
            _ => return Ok(records),
        }
    }
}

fn service_from_item(item: &Item) -> Result<ServiceRecommendationRecord> {
    let full_recommendation: ServiceRecommendation =
        serde_json::from_str(&required(item, "recommendations")?)?;

    Ok(ServiceRecommendationRecord {
        account_id: required(item, "account_id")?,
        cluster: required(item, "cluster")?,
        service: required(item, "service")?,
        service_health: parsed::<Health>(item, "service_health")?,
        scaling_action: parsed::<ScalingAction>(item, "scaling_action")?,
        priority: parsed::<Priority>(item, "priority")?,
        timestamp: text(item, "timestamp").unwrap_or_default(),
        full_recommendation,
    })
}

#[async_trait]
impl KnowledgeStore for DynamoStore {
    async fn put_account(&self, account: &Account) -> Result<()> {
        self.put(&self.knowledge_table, account_item(account)).await
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.knowledge_table)
                .filter_expression("sk = :sk")
                .expression_attribute_values(":sk", s(ACCOUNT_DATA))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| AdvisorError::store("Scan", e))?;

            for item in output.items() {
                match account_from_item(item) {
                    Ok(account) => accounts.push(account),
                    Err(e) => warn!(error = %e, "Skipping malformed account item"),
                }
            }
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        debug!(accounts = accounts.len(), "Loaded accounts");
        Ok(accounts)
    }

    async fn account(&self, account_id: &str) -> Result<Option<Account>> {
        self.knowledge_item(account_id, ACCOUNT_DATA)
            .await?
            .map(|item| account_from_item(&item))
            .transpose()
    }

    async fn put_cluster_snapshot(
        &self,
        account_id: &str,
        snapshot: &ClusterSnapshot,
    ) -> Result<()> {
        let item = HashMap::from([
            ("pk".to_string(), s(pk(account_id))),
            ("sk".to_string(), s(CLUSTER_DATA)),
            ("account_id".to_string(), s(account_id)),
            ("cluster_data".to_string(), s(serde_json::to_string(snapshot)?)),
            ("timestamp".to_string(), s(Utc::now().to_rfc3339())),
            ("ttl".to_string(), expires_in(self.ttl.cluster_data)),
        ]);
        self.put(&self.knowledge_table, item).await
    }

    async fn cluster_snapshot(&self, account_id: &str) -> Result<Option<ClusterSnapshot>> {
        let Some(item) = self.knowledge_item(account_id, CLUSTER_DATA).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&required(&item, "cluster_data")?)?))
    }

    async fn put_account_recommendation(
        &self,
        account_id: &str,
        recommendation: &AccountRecommendation,
    ) -> Result<()> {
        let item = HashMap::from([
            ("pk".to_string(), s(pk(account_id))),
            ("sk".to_string(), s(RECOMMENDATIONS)),
            ("account_id".to_string(), s(account_id)),
            ("timestamp".to_string(), s(Utc::now().to_rfc3339())),
            ("recommendations".to_string(), s(serde_json::to_string(recommendation)?)),
            ("ttl".to_string(), expires_in(self.ttl.account_recommendation)),
        ]);
        self.put(&self.knowledge_table, item).await
    }

    async fn account_recommendation(
        &self,
        account_id: &str,
    ) -> Result<Option<StoredRecommendation>> {
        let Some(item) = self.knowledge_item(account_id, RECOMMENDATIONS).await? else {
            return Ok(None);
        };
        Ok(Some(StoredRecommendation {
            recommendation: serde_json::from_str(&required(&item, "recommendations")?)?,
            stored_at: text(&item, "timestamp").unwrap_or_default(),
        }))
    }

    async fn put_service_recommendation(
        &self,
        account_id: &str,
        cluster: &str,
        service: &str,
        recommendation: &ServiceRecommendation,
    ) -> Result<()> {
        let record = service_record(account_id, cluster, service, recommendation, Utc::now());
        let item = service_item(&record, self.ttl.service_recommendation)?;
        self.put(&self.recommendations_table, item).await
    }

    async fn service_recommendations(
        &self,
        account_id: &str,
        filter: &RecommendationFilter,
    ) -> Result<Vec<ServiceRecommendationRecord>> {
        let mut conditions = Vec::new();
        let mut names = HashMap::new();
        let mut values = HashMap::from([(":account_id".to_string(), s(account_id))]);
        if let Some(health) = filter.health {
            conditions.push("#health = :health");
            names.insert("#health".to_string(), "service_health".to_string());
            values.insert(":health".to_string(), s(health.as_str()));
        }
        if let Some(priority) = filter.priority {
            conditions.push("#priority = :priority");
            names.insert("#priority".to_string(), "priority".to_string());
            values.insert(":priority".to_string(), s(priority.as_str()));
        }
        let filter_expression = (!conditions.is_empty()).then(|| conditions.join(" AND "));
        let names = (!names.is_empty()).then_some(names);

        let mut records = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.recommendations_table)
                .key_condition_expression("account_id = :account_id")
                .set_filter_expression(filter_expression.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| AdvisorError::store("Query", e))?;

            for item in output.items().iter().filter(|item| !expired(item)) {
                match service_from_item(item) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(
                        account_id = %account_id,
                        error = %e,
                        "Skipping malformed recommendation item"
                    ),
                }
            }
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(records)
    }

    async fn knowledge_summary(&self, account_id: &str) -> Result<KnowledgeSummary> {
        let records = count_pages(|start_key| async move {
            let output = self
                .client
                .query()
                .table_name(&self.knowledge_table)
                .key_condition_expression("pk = :pk")
                .expression_attribute_values(":pk", s(pk(account_id)))
                .select(Select::Count)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| AdvisorError::store("Query", e))?;
            Ok::<_, AdvisorError>((output.count(), output.last_evaluated_key().cloned()))
        })
        .await?;

        Ok(KnowledgeSummary::new(account_id, records))
    }
}
