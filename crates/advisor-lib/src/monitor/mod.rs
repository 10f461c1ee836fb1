//! Fleet monitoring across ECS clusters
//!
//! The monitor walks clusters and services of one account, pulls CloudWatch
//! utilization, load balancer metrics and auto scaling setup per service,
//! and tails recent log lines. All AWS access goes through the [`FleetApi`] trait so the walk
//! itself can be exercised against an in-memory fleet.

mod aws;
mod fleet;
mod logs;


pub use aws::{AwsFleetApi, AwsMonitorFactory};
pub use fleet::{FleetMonitor, MonitorStatus};

use crate::error::Result;
use crate::models::{Account, Datapoint, ScalingPolicy, TaskDefinitionShape};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

/// CloudWatch metric names used by the monitor
pub mod metric_names {
    pub const CPU_UTILIZATION: &str = "CPUUtilization";
    pub const MEMORY_UTILIZATION: &str = "MemoryUtilization";
    pub const HEALTHY_HOST_COUNT: &str = "HealthyHostCount";
    pub const UNHEALTHY_HOST_COUNT: &str = "UnHealthyHostCount";
    pub const TARGET_RESPONSE_TIME: &str = "TargetResponseTime";
    pub const REQUEST_COUNT: &str = "RequestCount";
    pub const HTTP_2XX: &str = "HTTPCode_Target_2XX_Count";
    pub const HTTP_3XX: &str = "HTTPCode_Target_3XX_Count";
    pub const HTTP_4XX: &str = "HTTPCode_Target_4XX_Count";
}

/// Tuning knobs for metric windows, batching and log caps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Metric window in days (default: 7)
    pub metrics_days: i64,
    /// Metric period in seconds (default: one day)
    pub metrics_period_secs: i32,
    /// Services per DescribeServices call (default: 10, the API maximum)
    pub describe_batch_size: usize,
    /// Events per GetLogEvents call
    pub log_events_limit: i32,
    /// Log groups read per cluster
    pub log_groups_limit: usize,
    /// Most recent streams read per log group
    pub log_streams_limit: i32,
    /// Lines kept per cluster or service
    pub total_logs_limit: usize,
    /// How far back cluster log tailing starts
    pub recent_logs_window_secs: i64,
    pub ecs_namespace: String,
    pub alb_namespace: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            metrics_days: 7,
            metrics_period_secs: 86400,
            describe_batch_size: 10,
            log_events_limit: 1000,
            log_groups_limit: 3,
            log_streams_limit: 2,
            total_logs_limit: 100,
            recent_logs_window_secs: 3600,
            ecs_namespace: "AWS/ECS".to_string(),
            alb_namespace: "AWS/ApplicationELB".to_string(),
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// The parts of an ECS service description the monitor needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDescription {
    pub name: String,
    pub status: String,
    pub running_count: i32,
    pub desired_count: i32,
    pub task_definition: Option<String>,
    pub target_group_arns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroupDescription {
    pub arn: String,
    pub name: String,
    pub load_balancer_arns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerDescription {
    pub arn: String,
    pub name: String,
    /// `application`, `network` or `gateway`
    pub lb_type: String,
}

/// Capacity bounds of an Application Auto Scaling target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalableTarget {
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Average,
    Maximum,
    Sum,
}

/// A GetMetricStatistics request
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<(String, String)>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: i32,
    pub statistics: Vec<Statistic>,
}

impl MetricQuery {
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Page-level access to ECS, ELBv2, Application Auto Scaling, CloudWatch and CloudWatch Logs
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// List cluster ARNs, one page at a time
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>>;

    /// List service ARNs in a cluster, one page at a time
    async fn list_services(&self, cluster: &str, next_token: Option<String>)
        -> Result<Page<String>>;

    /// Describe up to ten services of a cluster
    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceDescription>>;

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Option<TaskDefinitionShape>>;

    async fn describe_target_group(&self, arn: &str) -> Result<Option<TargetGroupDescription>>;

    async fn describe_load_balancer(&self, arn: &str) -> Result<Option<LoadBalancerDescription>>;

    /// Scalable target of a `service/{cluster}/{service}` resource, if registered
    async fn describe_scalable_target(&self, resource_id: &str) -> Result<Option<ScalableTarget>>;

    /// Every scaling policy of a resource
    async fn describe_scaling_policies(&self, resource_id: &str) -> Result<Vec<ScalingPolicy>>;

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>>;

    /// Log group names starting with `prefix`
    async fn log_groups(&self, prefix: &str) -> Result<Vec<String>>;

    /// Stream names of a group, most recent event first
    async fn latest_log_streams(&self, group: &str, limit: i32) -> Result<Vec<String>>;

    async fn log_events(
        &self,
        group: &str,
        stream: &str,
        start_time_ms: Option<i64>,
        limit: i32,
    ) -> Result<Vec<String>>;
}

/// Builds a monitor for an account
#[async_trait]
pub trait MonitorFactory: Send + Sync {
    async fn monitor(&self, account: &Account) -> Result<FleetMonitor>;
}

/// Application Auto Scaling resource id of an ECS service
pub fn scaling_resource_id(cluster: &str, service: &str) -> String {
    format!("service/{}/{}", cluster, service)
}

/// Resource name from an ARN: everything after the last `/`
pub fn name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
