//! API client for the fleet advisor service

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A non-success response from the advisor
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => Self {
                status,
                code: err.code,
                message: err.error,
            },
            Err(_) => Self {
                status,
                code: None,
                message: body.to_string(),
            },
        }
    }
}

/// API client for the advisor HTTP API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            // Account recommendations wait on the model
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path)?);
        self.send(request).await
    }

    /// GET with query parameters; `None` values are left out
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let request = self.client.get(self.url(path)?).query(query);
        self.send(request).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.url(path)?).json(body);
        self.send(request).await
    }

    /// Make a POST request without a body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.post(self.url(path)?);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status, &body).into());
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRequest {
    pub account_id: String,
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatus {
    pub account_id: String,
    pub account_name: String,
    pub status: String,
    #[serde(default)]
    pub clusters: Vec<String>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total_count: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPage {
    pub accounts: Vec<AccountStatus>,
    pub pagination: Pagination,
}

/// The advisor answers a plain list unless paging or filters were asked for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountListing {
    All(Vec<AccountStatus>),
    Page(AccountPage),
}

impl AccountListing {
    pub fn accounts(&self) -> &[AccountStatus] {
        match self {
            Self::All(accounts) => accounts,
            Self::Page(page) => &page.accounts,
        }
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        match self {
            Self::All(_) => None,
            Self::Page(page) => Some(&page.pagination),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub status: String,
    pub message: String,
    pub refreshed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingRecommendation {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub service: String,
    pub action: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceIssue {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub solution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostOptimization {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub potential_savings: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecommendation {
    pub overall_health: String,
    #[serde(default)]
    pub scaling_recommendations: Vec<ScalingRecommendation>,
    #[serde(default)]
    pub performance_issues: Vec<PerformanceIssue>,
    #[serde(default)]
    pub cost_optimization: Vec<CostOptimization>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecommendation {
    pub service_health: String,
    pub scaling_action: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAnalysis {
    pub service_name: String,
    pub cluster_name: String,
    pub service_health: String,
    pub scaling_action: String,
    pub priority: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_clusters: usize,
    pub total_services: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRecommendations {
    pub account_id: String,
    pub clusters: BTreeMap<String, Vec<ServiceAnalysis>>,
    pub summary: FleetSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_services: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleClusterRecommendations {
    pub account_id: String,
    pub cluster_name: String,
    pub services: Vec<ServiceAnalysis>,
    pub summary: ClusterSummary,
}

/// Every cluster of an account, or one cluster when a name was given
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterRecommendations {
    Fleet(FleetRecommendations),
    Cluster(SingleClusterRecommendations),
}

impl ClusterRecommendations {
    /// All analyses, cluster by cluster
    pub fn analyses(&self) -> Vec<&ServiceAnalysis> {
        match self {
            Self::Fleet(fleet) => fleet.clusters.values().flatten().collect(),
            Self::Cluster(cluster) => cluster.services.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecommendationRecord {
    pub cluster: String,
    pub service: String,
    pub service_health: String,
    pub scaling_action: String,
    pub priority: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredRecommendations {
    pub account_id: String,
    pub filter: String,
    pub count: usize,
    pub recommendations: Vec<ServiceRecommendationRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub service_name: String,
    pub cluster_name: String,
    pub status: String,
    pub running_count: i32,
    pub desired_count: i32,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub memory_avg: f64,
    pub memory_max: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub account_id: String,
    pub total_records: usize,
    pub last_updated: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
    pub reset_chat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailOutcome {
    pub status: String,
    pub message: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: String,
    pub message: String,
    pub accounts: usize,
    pub services: usize,
}
