//! Core data models for the fleet advisor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A monitored AWS account and the credentials used to reach it
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("account_name", &self.account_name)
            .field("region", &self.region)
            .field("credentials", &self.credential_source())
            .finish()
    }
}

impl Account {
    pub fn new(
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            account_name: account_name.into(),
            region: region.into(),
            access_key: None,
            secret_key: None,
            session_token: None,
            profile_name: None,
            role_arn: None,
            created_at: None,
            last_updated: None,
        }
    }

    /// Pick the credential source, in precedence order:
    /// profile, role, key plus session token, static key, default chain.
    ///
    /// Empty strings are treated as absent.
    pub fn credential_source(&self) -> CredentialSource {
        if let Some(profile) = non_empty(&self.profile_name) {
            return CredentialSource::Profile(profile.to_string());
        }
        if let Some(role_arn) = non_empty(&self.role_arn) {
            return CredentialSource::AssumeRole(role_arn.to_string());
        }
        match (
            non_empty(&self.access_key),
            non_empty(&self.secret_key),
            non_empty(&self.session_token),
        ) {
            (Some(access_key), Some(secret_key), Some(session_token)) => {
                CredentialSource::SessionToken {
                    access_key: access_key.to_string(),
                    secret_key: secret_key.to_string(),
                    session_token: session_token.to_string(),
                }
            }
            (Some(access_key), Some(secret_key), None) => CredentialSource::StaticKeys {
                access_key: access_key.to_string(),
                secret_key: secret_key.to_string(),
            },
            _ => CredentialSource::DefaultChain,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Where the credentials for an account come from
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Profile(String),
    AssumeRole(String),
    SessionToken {
        access_key: String,
        secret_key: String,
        session_token: String,
    },
    StaticKeys {
        access_key: String,
        secret_key: String,
    },
    DefaultChain,
}

impl CredentialSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Profile(_) => "profile",
            Self::AssumeRole(_) => "assume_role",
            Self::SessionToken { .. } => "session_token",
            Self::StaticKeys { .. } => "static_keys",
            Self::DefaultChain => "default_chain",
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(name) => write!(f, "Profile({})", name),
            Self::AssumeRole(arn) => write!(f, "AssumeRole({})", arn),
            Self::SessionToken { access_key, .. } | Self::StaticKeys { access_key, .. } => {
                write!(f, "{}({}***)", self.kind(), access_key.chars().take(4).collect::<String>())
            }
            Self::DefaultChain => write!(f, "DefaultChain"),
        }
    }
}

/// One sample of a CloudWatch statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub maximum: f64,
    #[serde(default)]
    pub sum: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Arithmetic mean of the `average` statistic, `None` for an empty series
pub fn mean_average(series: &[Datapoint]) -> Option<f64> {
    mean(series.iter().map(|d| d.average), series.len())
}

/// Arithmetic mean of the `sum` statistic, `None` for an empty series
pub fn mean_sum(series: &[Datapoint]) -> Option<f64> {
    mean(series.iter().map(|d| d.sum), series.len())
}

pub fn max_maximum(series: &[Datapoint]) -> Option<f64> {
    series.iter().map(|d| d.maximum).reduce(f64::max)
}

pub fn max_sum(series: &[Datapoint]) -> Option<f64> {
    series.iter().map(|d| d.sum).reduce(f64::max)
}

pub fn total_sum(series: &[Datapoint]) -> f64 {
    series.iter().map(|d| d.sum).sum()
}

fn mean(values: impl Iterator<Item = f64>, len: usize) -> Option<f64> {
    if len == 0 {
        return None;
    }
    Some(values.sum::<f64>() / len as f64)
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Application Auto Scaling setup of an ECS service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingConfiguration {
    pub min_capacity: i32,
    pub max_capacity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default)]
    pub policies: Vec<ScalingPolicy>,
}

impl ScalingConfiguration {
    /// `min 1, max 10, policies: cpu (TargetTrackingScaling ECSServiceAverageCPUUtilization target 70.0)`
    pub fn describe(&self) -> String {
        let mut line = format!("min {}, max {}", self.min_capacity, self.max_capacity);
        if !self.policies.is_empty() {
            let policies: Vec<String> = self.policies.iter().map(ScalingPolicy::describe).collect();
            line.push_str(&format!(", policies: {}", policies.join(", ")));
        }
        line
    }
}

/// One scaling policy attached to a scalable target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub policy_name: String,
    /// `TargetTrackingScaling` or `StepScaling`
    pub policy_type: String,
    #[serde(default)]
    pub scalable_dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_aggregation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_adjustments: Vec<StepAdjustment>,
}

impl ScalingPolicy {
    fn describe(&self) -> String {
        let mut details = vec![self.policy_type.clone()];
        if let Some(metric) = &self.metric_type {
            details.push(metric.clone());
        }
        if let Some(target) = self.target_value {
            details.push(format!("target {:.1}", target));
        }
        if !self.step_adjustments.is_empty() {
            details.push(format!("{} steps", self.step_adjustments.len()));
        }
        format!("{} ({})", self.policy_name, details.join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepAdjustment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_interval_lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_interval_upper_bound: Option<f64>,
    pub scaling_adjustment: i32,
}

/// Raw metrics for one ECS service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    #[serde(default)]
    pub cpu: Vec<Datapoint>,
    #[serde(default)]
    pub memory: Vec<Datapoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<TaskDefinitionShape>,
    /// Keyed by target group name
    #[serde(default)]
    pub target_groups: BTreeMap<String, TargetGroupMetrics>,
    /// `None` when the service has no scalable target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingConfiguration>,
}

impl ServiceMetrics {
    /// True when at least one utilization series came back
    pub fn has_utilization(&self) -> bool {
        !self.cpu.is_empty() || !self.memory.is_empty()
    }
}

/// Load balancer metrics for one target group attached to a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupMetrics {
    pub target_group_arn: String,
    pub target_group_full_name: String,
    pub load_balancer_name: String,
    pub load_balancer_full_name: String,
    pub load_balancer_type: String,
    #[serde(default)]
    pub healthy_hosts: Vec<Datapoint>,
    #[serde(default)]
    pub unhealthy_hosts: Vec<Datapoint>,
    #[serde(default)]
    pub response_time: Vec<Datapoint>,
    #[serde(default)]
    pub request_count: Vec<Datapoint>,
    #[serde(default)]
    pub http_2xx_count: Vec<Datapoint>,
    #[serde(default)]
    pub http_3xx_count: Vec<Datapoint>,
    #[serde(default)]
    pub http_4xx_count: Vec<Datapoint>,
    pub total_2xx_count: f64,
    pub total_3xx_count: f64,
    pub total_4xx_count: f64,
    pub http_error_percentage: f64,
}

/// 3xx and 4xx responses as a percentage of 2xx responses
pub fn http_error_percentage(total_2xx: f64, total_3xx: f64, total_4xx: f64) -> f64 {
    let errors = total_3xx + total_4xx;
    if total_2xx > 0.0 {
        round_to(100.0 * errors / total_2xx, 2)
    } else if errors > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Shape of the task definition a service runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinitionShape {
    pub family: String,
    pub revision: i32,
    #[serde(default)]
    pub compatibilities: Vec<String>,
    #[serde(default)]
    pub requires_compatibilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerShape {
    pub name: String,
    pub cpu: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation: Option<i32>,
}

/// Point-in-time view of one service, with metrics already reduced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub status: String,
    pub running_count: i32,
    pub desired_count: i32,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub memory_avg: f64,
    pub memory_max: f64,
    #[serde(default)]
    pub target_groups: BTreeMap<String, TargetGroupSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<TaskDefinitionShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupSummary {
    pub load_balancer_name: String,
    pub load_balancer_type: String,
    pub healthy_hosts_avg: f64,
    pub healthy_hosts_max: f64,
    pub unhealthy_hosts_avg: f64,
    pub unhealthy_hosts_max: f64,
    pub response_time_avg: f64,
    pub response_time_max: f64,
    pub requests_avg: f64,
    pub requests_max: f64,
    pub http_error_percentage: f64,
    pub total_2xx_count: f64,
    pub total_3xx_count: f64,
    pub total_4xx_count: f64,
}

impl From<&TargetGroupMetrics> for TargetGroupSummary {
    fn from(tg: &TargetGroupMetrics) -> Self {
        let r1 = |v: Option<f64>| round_to(v.unwrap_or(0.0), 1);
        let r3 = |v: Option<f64>| round_to(v.unwrap_or(0.0), 3);
        Self {
            load_balancer_name: tg.load_balancer_name.clone(),
            load_balancer_type: tg.load_balancer_type.clone(),
            healthy_hosts_avg: r1(mean_average(&tg.healthy_hosts)),
            healthy_hosts_max: r1(max_maximum(&tg.healthy_hosts)),
            unhealthy_hosts_avg: r1(mean_average(&tg.unhealthy_hosts)),
            unhealthy_hosts_max: r1(max_maximum(&tg.unhealthy_hosts)),
            response_time_avg: r3(mean_average(&tg.response_time)),
            response_time_max: r3(max_maximum(&tg.response_time)),
            requests_avg: r1(mean_sum(&tg.request_count)),
            requests_max: r1(max_sum(&tg.request_count)),
            http_error_percentage: tg.http_error_percentage,
            total_2xx_count: tg.total_2xx_count,
            total_3xx_count: tg.total_3xx_count,
            total_4xx_count: tg.total_4xx_count,
        }
    }
}

/// Cluster name to its services
pub type ClusterSnapshot = BTreeMap<String, Vec<ServiceSnapshot>>;

/// Metrics for one service, as fed to the summarizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSample {
    pub service: String,
    pub metrics: ServiceMetrics,
}

/// Enums below accept any letter case on input (`Warning`, `SCALE_UP`) since
/// model replies do not always follow the schema's spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Health {
    Good,
    Warning,
    Critical,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Worst first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::Warning => 1,
            Self::Good => 2,
        }
    }
}

impl std::str::FromStr for Health {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "good" => Ok(Self::Good),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown health status '{}'", other)),
        }
    }
}

impl TryFrom<String> for Health {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    NoChange,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleUp => "scale_up",
            Self::ScaleDown => "scale_down",
            Self::NoChange => "no_change",
        }
    }
}

impl std::str::FromStr for ScalingAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "scale_up" => Ok(Self::ScaleUp),
            "scale_down" => Ok(Self::ScaleDown),
            "no_change" => Ok(Self::NoChange),
            other => Err(format!("unknown scaling action '{}'", other)),
        }
    }
}

impl TryFrom<String> for ScalingAction {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Highest first
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Account-wide recommendation, from the model or the rule-based fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecommendation {
    pub overall_health: Health,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRecommendation {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub service: String,
    pub action: ScalingAction,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_capacity: Option<SuggestedCapacity>,
}

/// Free-form capacity hints; the model answers with numbers, the fallback with text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestedCapacity {
    #[serde(default)]
    pub desired_count: serde_json::Value,
    #[serde(default)]
    pub cpu: serde_json::Value,
    #[serde(default)]
    pub memory: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostOptimization {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub potential_savings: serde_json::Value,
}

/// Account recommendation as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    #[serde(flatten)]
    pub recommendation: AccountRecommendation,
    pub stored_at: String,
}

/// Recommendation for a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecommendation {
    pub service_health: Health,
    pub scaling_action: ScalingAction,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub priority: Priority,
}

/// A stored service recommendation with its index fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecommendationRecord {
    pub account_id: String,
    pub cluster: String,
    pub service: String,
    pub service_health: Health,
    pub scaling_action: ScalingAction,
    pub priority: Priority,
    pub timestamp: String,
    pub full_recommendation: ServiceRecommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
