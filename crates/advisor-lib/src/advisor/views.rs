//! Response shapes of the advisor operations

use crate::models::{
    ClusterSnapshot, Health, Priority, ScalingAction, ServiceRecommendation,
    ServiceRecommendationRecord, ServiceSnapshot, TargetGroupSummary,
};
use crate::observability::RecommendationSource;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Search, status filter and paging for the account listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountQuery {
    pub page: usize,
    pub limit: usize,
    /// Case-insensitive match on account name or id
    pub search: String,
    /// `active` or `inactive`; empty matches both
    pub status_filter: String,
}

impl Default for AccountQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: String::new(),
            status_filter: String::new(),
        }
    }
}

impl AccountQuery {
    /// The default query returns the plain, unpaged list
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub account_id: String,
    pub account_name: String,
    pub status: String,
    pub clusters: Vec<String>,
    pub cluster_details: ClusterSnapshot,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total_count: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountFilters {
    pub search: String,
    pub status_filter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPage {
    pub accounts: Vec<AccountStatus>,
    pub pagination: Pagination,
    pub filters: AccountFilters,
}

/// Plain list for the default query, a page otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountListing {
    All(Vec<AccountStatus>),
    Page(AccountPage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub status: String,
    pub message: String,
    pub cluster_details: ClusterSnapshot,
    pub refreshed_at: String,
}

/// One service out of the cached snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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
    pub target_groups: BTreeMap<String, TargetGroupSummary>,
    pub last_updated: String,
}

/// A service snapshot with the recommendation generated for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAnalysis {
    pub service_name: String,
    pub cluster_name: String,
    pub service_details: ServiceSnapshot,
    pub service_health: Health,
    pub scaling_action: ScalingAction,
    pub priority: Priority,
    pub reason: String,
    pub recommendations: Vec<String>,
    pub full_recommendation: ServiceRecommendation,
    pub source: RecommendationSource,
}

impl ServiceAnalysis {
    pub(super) fn new(
        cluster: &str,
        snapshot: &ServiceSnapshot,
        recommendation: ServiceRecommendation,
        source: RecommendationSource,
    ) -> Self {
        Self {
            service_name: snapshot.name.clone(),
            cluster_name: cluster.to_string(),
            service_details: snapshot.clone(),
            service_health: recommendation.service_health,
            scaling_action: recommendation.scaling_action,
            priority: recommendation.priority,
            reason: recommendation.reason.clone(),
            recommendations: recommendation.recommendations.clone(),
            full_recommendation: recommendation,
            source,
        }
    }
}

/// Priority first, then worst health first
pub(super) fn sort_analyses(analyses: &mut [ServiceAnalysis]) {
    analyses.sort_by_key(|a| (a.priority.rank(), a.service_health.rank()));
}

/// Counts of health, scaling action and priority across analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distributions {
    pub health_distribution: BTreeMap<String, usize>,
    pub scaling_distribution: BTreeMap<String, usize>,
    pub priority_distribution: BTreeMap<String, usize>,
}

impl Distributions {
    pub fn from_analyses<'a>(analyses: impl IntoIterator<Item = &'a ServiceAnalysis>) -> Self {
        let mut distributions = Self::empty();
        for analysis in analyses {
            distributions.count(analysis.service_health, analysis.scaling_action, analysis.priority);
        }
        distributions
    }

    fn empty() -> Self {
        let zeroed = |keys: &[&str]| keys.iter().map(|k| (k.to_string(), 0)).collect();
        Self {
            health_distribution: zeroed(&["good", "warning", "critical"]),
            scaling_distribution: zeroed(&["scale_up", "scale_down", "no_change"]),
            priority_distribution: zeroed(&["high", "medium", "low"]),
        }
    }

    fn count(&mut self, health: Health, action: ScalingAction, priority: Priority) {
        *self.health_distribution.entry(health.as_str().to_string()).or_default() += 1;
        *self.scaling_distribution.entry(action.as_str().to_string()).or_default() += 1;
        *self.priority_distribution.entry(priority.as_str().to_string()).or_default() += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetRecommendationSummary {
    pub total_clusters: usize,
    pub total_services: usize,
    pub health_summary: Distributions,
}

/// Every cluster of an account with per-service recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetRecommendations {
    pub account_id: String,
    pub timestamp: String,
    pub clusters: BTreeMap<String, Vec<ServiceAnalysis>>,
    pub summary: FleetRecommendationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecommendationSummary {
    pub total_services: usize,
    #[serde(flatten)]
    pub distributions: Distributions,
}

/// One cluster with per-service recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleClusterRecommendations {
    pub account_id: String,
    pub cluster_name: String,
    pub timestamp: String,
    pub services: Vec<ServiceAnalysis>,
    pub summary: ClusterRecommendationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterRecommendations {
    Fleet(FleetRecommendations),
    Cluster(SingleClusterRecommendations),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredRecommendations {
    pub account_id: String,
    /// `health=..., priority=...` or `all`
    pub filter: String,
    pub count: usize,
    pub recommendations: Vec<ServiceRecommendationRecord>,
    pub timestamp: String,
}

/// Schedule a job belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Daily,
    Weekly,
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: String,
    pub message: String,
    /// Accounts processed, or reports sent for report jobs
    pub accounts: usize,
    /// Services analyzed, or services reported
    pub services: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailOutcome {
    pub status: String,
    pub message: String,
    pub message_id: String,
}

/// A stored service recommendation tagged with its account's name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountServiceRecommendation {
    #[serde(flatten)]
    pub record: ServiceRecommendationRecord,
    pub account_name: String,
}

/// Recommendations of every account, keyed by priority then health
///
/// Serializes as nested JSON objects in `high, medium, low` and
/// `critical, warning, good` order; empty groups are left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRecommendations {
    groups: Vec<(Priority, Vec<(Health, Vec<AccountServiceRecommendation>)>)>,
}

impl GroupedRecommendations {
    pub fn new(recommendations: Vec<AccountServiceRecommendation>) -> Self {
        let mut groups = Vec::new();
        for priority in [Priority::High, Priority::Medium, Priority::Low] {
            let mut by_health = Vec::new();
            for health in [Health::Critical, Health::Warning, Health::Good] {
                let matching: Vec<AccountServiceRecommendation> = recommendations
                    .iter()
                    .filter(|r| r.record.priority == priority && r.record.service_health == health)
                    .cloned()
                    .collect();
                if !matching.is_empty() {
                    by_health.push((health, matching));
                }
            }
            if !by_health.is_empty() {
                groups.push((priority, by_health));
            }
        }
        Self { groups }
    }

    pub fn get(&self, priority: Priority, health: Health) -> &[AccountServiceRecommendation] {
        self.groups
            .iter()
            .find(|(p, _)| *p == priority)
            .and_then(|(_, by_health)| by_health.iter().find(|(h, _)| *h == health))
            .map(|(_, records)| records.as_slice())
            .unwrap_or_default()
    }

    pub fn priorities(&self) -> Vec<Priority> {
        self.groups.iter().map(|(p, _)| *p).collect()
    }
}

struct HealthGroups<'a>(&'a [(Health, Vec<AccountServiceRecommendation>)]);

impl Serialize for HealthGroups<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (health, records) in self.0 {
            map.serialize_entry(health.as_str(), records)?;
        }
        map.end()
    }
}

impl Serialize for GroupedRecommendations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (priority, by_health) in &self.groups {
            map.serialize_entry(priority.as_str(), &HealthGroups(by_health))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAnalytics {
    pub account_id: String,
    pub account_name: String,
    pub region: String,
    /// `active` when a cached snapshot exists
    pub status: String,
    pub clusters: usize,
    pub services: usize,
    pub tasks: i64,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsSummary {
    pub total: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_health: BTreeMap<String, usize>,
    pub by_scaling: BTreeMap<String, usize>,
}

impl From<&Distributions> for RecommendationsSummary {
    fn from(distributions: &Distributions) -> Self {
        Self {
            total: distributions.priority_distribution.values().sum(),
            by_priority: distributions.priority_distribution.clone(),
            by_health: distributions.health_distribution.clone(),
            by_scaling: distributions.scaling_distribution.clone(),
        }
    }
}

/// Fleet-wide rollup from the cached snapshots and stored recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub accounts: Vec<AccountAnalytics>,
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub total_clusters: usize,
    pub total_services: usize,
    pub total_tasks: i64,
    pub recommendations_summary: RecommendationsSummary,
    /// Highest priority first, newest first within a priority
    pub recent_recommendations: Vec<AccountServiceRecommendation>,
}

pub(super) fn record_distributions<'a>(
    records: impl IntoIterator<Item = &'a AccountServiceRecommendation>,
) -> Distributions {
    let mut distributions = Distributions::empty();
    for r in records {
        distributions.count(r.record.service_health, r.record.scaling_action, r.record.priority);
    }
    distributions
}
