//! Cluster and service walk for one account

use super::{
    metric_names, name_from_arn, scaling_resource_id, FleetApi, MetricQuery, MonitorSettings,
    ServiceDescription, Statistic,
};
use crate::error::{AdvisorError, Result};
use crate::models::{
    http_error_percentage, max_maximum, mean_average, round_to, total_sum, ClusterSnapshot,
    Datapoint, ScalingConfiguration, ServiceMetrics, ServiceSample, ServiceSnapshot,
    TargetGroupMetrics,
    TargetGroupSummary, TaskDefinitionShape,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const AVERAGE_AND_MAXIMUM: &[Statistic] = &[Statistic::Average, Statistic::Maximum];
const SUM: &[Statistic] = &[Statistic::Sum];

/// Monitoring status of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// `active` once clusters were discovered, `inactive` otherwise
    pub status: String,
    pub clusters: Vec<String>,
    pub last_updated: String,
}

/// Walks the clusters of one account
pub struct FleetMonitor {
    account_id: String,
    api: Arc<dyn FleetApi>,
    settings: MonitorSettings,
    clusters: RwLock<Vec<String>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
}

impl FleetMonitor {
    pub fn new(
        account_id: impl Into<String>,
        api: Arc<dyn FleetApi>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            api,
            settings,
            clusters: RwLock::new(Vec::new()),
            last_updated: RwLock::new(None),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub(super) fn api(&self) -> &dyn FleetApi {
        self.api.as_ref()
    }

    /// List every cluster in the account, following pagination
    pub async fn discover_clusters(&self) -> Result<Vec<String>> {
        let mut clusters = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.api.list_clusters(next_token).await?;
            clusters.extend(page.items.iter().map(|arn| name_from_arn(arn).to_string()));
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        *self.clusters.write().await = clusters.clone();
        *self.last_updated.write().await = Some(Utc::now());

        info!(
            account_id = %self.account_id,
            clusters = clusters.len(),
            "Discovered clusters"
        );
        Ok(clusters)
    }

    /// Clusters found by the last discovery
    pub async fn clusters(&self) -> Vec<String> {
        self.clusters.read().await.clone()
    }

    /// List every service name in a cluster, following pagination
    pub async fn list_services(&self, cluster: &str) -> Result<Vec<String>> {
        let mut services = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.api.list_services(cluster, next_token).await?;
            services.extend(page.items.iter().map(|arn| name_from_arn(arn).to_string()));
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(services)
    }

    pub async fn status(&self) -> MonitorStatus {
        let clusters = self.clusters().await;
        let last_updated = self
            .last_updated
            .read()
            .await
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        MonitorStatus {
            status: if clusters.is_empty() { "inactive" } else { "active" }.to_string(),
            clusters,
            last_updated,
        }
    }

    /// Full metrics for one service: utilization, counts, task definition and target groups
    pub async fn service_metrics(&self, cluster: &str, service: &str) -> Result<ServiceMetrics> {
        let description = self
            .api
            .describe_services(cluster, &[service.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AdvisorError::NotFound(format!("service {}/{}", cluster, service)))?;

        Ok(self.collect_service_metrics(cluster, &description).await)
    }

    /// Per-cluster service metrics for every discovered cluster
    ///
    /// Services that cannot be described are left out.
    pub async fn cluster_metrics(&self) -> BTreeMap<String, Vec<ServiceSample>> {
        let clusters = self.clusters().await;
        let per_cluster = join_all(clusters.iter().map(|cluster| self.cluster_samples(cluster))).await;
        clusters.into_iter().zip(per_cluster).collect()
    }

    async fn cluster_samples(&self, cluster: &str) -> Vec<ServiceSample> {
        let descriptions = self.describe_cluster(cluster).await;
        join_all(descriptions.iter().map(|description| async move {
            ServiceSample {
                service: description.name.clone(),
                metrics: self.collect_service_metrics(cluster, description).await,
            }
        }))
        .await
    }

    /// Reduced snapshot of every discovered cluster
    pub async fn cluster_details(&self) -> ClusterSnapshot {
        let clusters = self.clusters().await;
        let per_cluster =
            join_all(clusters.iter().map(|cluster| self.cluster_snapshot(cluster))).await;
        clusters.into_iter().zip(per_cluster).collect()
    }

    async fn cluster_snapshot(&self, cluster: &str) -> Vec<ServiceSnapshot> {
        let descriptions = self.describe_cluster(cluster).await;
        let snapshots = join_all(descriptions.iter().map(|description| async move {
            let metrics = self.collect_service_metrics(cluster, description).await;
            snapshot(description, &metrics)
        }))
        .await;

        debug!(
            account_id = %self.account_id,
            cluster = %cluster,
            services = snapshots.len(),
            "Built cluster snapshot"
        );
        snapshots
    }

    async fn describe_cluster(&self, cluster: &str) -> Vec<ServiceDescription> {
        match self.list_services(cluster).await {
            Ok(services) => self.describe_batched(cluster, &services).await,
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    cluster = %cluster,
                    error = %e,
                    "Failed to list services, skipping cluster"
                );
                Vec::new()
            }
        }
    }

    async fn describe_batched(&self, cluster: &str, services: &[String]) -> Vec<ServiceDescription> {
        let batch_size = self.settings.describe_batch_size.max(1);
        let mut described = Vec::with_capacity(services.len());

        for batch in services.chunks(batch_size) {
            match self.api.describe_services(cluster, batch).await {
                Ok(descriptions) => described.extend(descriptions),
                Err(e) => warn!(
                    account_id = %self.account_id,
                    cluster = %cluster,
                    batch_size = batch.len(),
                    error = %e,
                    "Failed to describe service batch, skipping"
                ),
            }
        }
        described
    }

    async fn collect_service_metrics(
        &self,
        cluster: &str,
        description: &ServiceDescription,
    ) -> ServiceMetrics {
        let (cpu, memory, task_definition, target_groups, scaling) = tokio::join!(
            self.utilization(cluster, &description.name, metric_names::CPU_UTILIZATION),
            self.utilization(cluster, &description.name, metric_names::MEMORY_UTILIZATION),
            self.task_definition(description),
            self.target_group_metrics(&description.name, &description.target_group_arns),
            self.scaling(cluster, &description.name),
        );

        ServiceMetrics {
            cpu,
            memory,
            running_count: Some(description.running_count),
            desired_count: Some(description.desired_count),
            task_definition,
            target_groups,
            scaling,
        }
    }

    async fn utilization(&self, cluster: &str, service: &str, metric: &str) -> Vec<Datapoint> {
        let dimensions = vec![
            ("ClusterName".to_string(), cluster.to_string()),
            ("ServiceName".to_string(), service.to_string()),
        ];
        let query = self.query(
            &self.settings.ecs_namespace,
            metric,
            dimensions,
            AVERAGE_AND_MAXIMUM,
        );
        self.fetch(query).await
    }

    async fn load_balancer_metric(
        &self,
        dimensions: &[(String, String)],
        metric: &str,
        statistics: &[Statistic],
    ) -> Vec<Datapoint> {
        let query = self.query(
            &self.settings.alb_namespace,
            metric,
            dimensions.to_vec(),
            statistics,
        );
        self.fetch(query).await
    }

    fn query(
        &self,
        namespace: &str,
        metric: &str,
        dimensions: Vec<(String, String)>,
        statistics: &[Statistic],
    ) -> MetricQuery {
        let end = Utc::now();
        let start = end - Duration::days(self.settings.metrics_days);
        MetricQuery {
            namespace: namespace.to_string(),
            metric_name: metric.to_string(),
            dimensions,
            start,
            end,
            period_secs: self.settings.metrics_period_secs,
            statistics: statistics.to_vec(),
        }
    }

    /// A failed fetch degrades to an empty series
    async fn fetch(&self, query: MetricQuery) -> Vec<Datapoint> {
        match self.api.metric_statistics(&query).await {
            Ok(mut points) => {
                points.sort_by_key(|p| p.timestamp);
                points
            }
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    metric = %query.metric_name,
                    dimensions = ?query.dimensions,
                    error = %e,
                    "Metric fetch failed, using empty series"
                );
                Vec::new()
            }
        }
    }

    async fn task_definition(&self, description: &ServiceDescription) -> Option<TaskDefinitionShape> {
        let arn = description.task_definition.as_deref()?;
        match self.api.describe_task_definition(arn).await {
            Ok(shape) => shape,
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    service = %description.name,
                    error = %e,
                    "Failed to describe task definition"
                );
                None
            }
        }
    }

    /// Auto scaling bounds and policies; `None` when unregistered or unreadable
    async fn scaling(&self, cluster: &str, service: &str) -> Option<ScalingConfiguration> {
        let resource_id = scaling_resource_id(cluster, service);
        match self.read_scaling(&resource_id).await {
            Ok(scaling) => scaling,
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    resource_id = %resource_id,
                    error = %e,
                    "Failed to read scaling policies"
                );
                None
            }
        }
    }

    async fn read_scaling(&self, resource_id: &str) -> Result<Option<ScalingConfiguration>> {
        let Some(target) = self.api.describe_scalable_target(resource_id).await? else {
            return Ok(None);
        };
        let policies = self.api.describe_scaling_policies(resource_id).await?;
        Ok(Some(ScalingConfiguration {
            min_capacity: target.min_capacity,
            max_capacity: target.max_capacity,
            role_arn: target.role_arn,
            policies,
        }))
    }

    async fn target_group_metrics(
        &self,
        service: &str,
        target_group_arns: &[String],
    ) -> BTreeMap<String, TargetGroupMetrics> {
        let mut metrics = BTreeMap::new();
        for arn in target_group_arns {
            match self.target_group(arn).await {
                Ok(Some((name, tg_metrics))) => {
                    metrics.insert(name, tg_metrics);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    account_id = %self.account_id,
                    service = %service,
                    target_group_arn = %arn,
                    error = %e,
                    "Failed to read target group metrics"
                ),
            }
        }
        metrics
    }

    /// Metrics for one target group, `None` unless it sits behind an application load balancer
    async fn target_group(&self, arn: &str) -> Result<Option<(String, TargetGroupMetrics)>> {
        let Some(target_group) = self.api.describe_target_group(arn).await? else {
            return Ok(None);
        };
        let Some(lb_arn) = target_group.load_balancer_arns.first() else {
            debug!(target_group = %target_group.name, "Target group has no load balancer");
            return Ok(None);
        };
        let Some(load_balancer) = self.api.describe_load_balancer(lb_arn).await? else {
            return Ok(None);
        };
        if load_balancer.lb_type != "application" {
            debug!(
                target_group = %target_group.name,
                lb_type = %load_balancer.lb_type,
                "Skipping non-application load balancer"
            );
            return Ok(None);
        }

        let target_group_full_name = target_group_dimension(&target_group.arn);
        let load_balancer_full_name = load_balancer_dimension(&load_balancer.arn);
        let dimensions = vec![
            ("TargetGroup".to_string(), target_group_full_name.clone()),
            ("LoadBalancer".to_string(), load_balancer_full_name.clone()),
        ];

        let (healthy, unhealthy, response_time, requests, http_2xx, http_3xx, http_4xx) = tokio::join!(
            self.load_balancer_metric(&dimensions, metric_names::HEALTHY_HOST_COUNT, AVERAGE_AND_MAXIMUM),
            self.load_balancer_metric(&dimensions, metric_names::UNHEALTHY_HOST_COUNT, AVERAGE_AND_MAXIMUM),
            self.load_balancer_metric(&dimensions, metric_names::TARGET_RESPONSE_TIME, AVERAGE_AND_MAXIMUM),
            self.load_balancer_metric(&dimensions, metric_names::REQUEST_COUNT, SUM),
            self.load_balancer_metric(&dimensions, metric_names::HTTP_2XX, SUM),
            self.load_balancer_metric(&dimensions, metric_names::HTTP_3XX, SUM),
            self.load_balancer_metric(&dimensions, metric_names::HTTP_4XX, SUM),
        );

        let total_2xx_count = total_sum(&http_2xx);
        let total_3xx_count = total_sum(&http_3xx);
        let total_4xx_count = total_sum(&http_4xx);

        Ok(Some((
            target_group.name.clone(),
            TargetGroupMetrics {
                target_group_arn: target_group.arn.clone(),
                target_group_full_name,
                load_balancer_name: load_balancer.name.clone(),
                load_balancer_full_name,
                load_balancer_type: load_balancer.lb_type.clone(),
                healthy_hosts: healthy,
                unhealthy_hosts: unhealthy,
                response_time,
                request_count: requests,
                http_2xx_count: http_2xx,
                http_3xx_count: http_3xx,
                http_4xx_count: http_4xx,
                total_2xx_count,
                total_3xx_count,
                total_4xx_count,
                http_error_percentage: http_error_percentage(
                    total_2xx_count,
                    total_3xx_count,
                    total_4xx_count,
                ),
            },
        )))
    }
}

/// `TargetGroup` dimension value: the ARN suffix after the last `:`
pub fn target_group_dimension(arn: &str) -> String {
    arn.rsplit(':').next().unwrap_or(arn).to_string()
}

/// `LoadBalancer` dimension value: the ARN suffix after `loadbalancer/`
pub fn load_balancer_dimension(arn: &str) -> String {
    arn.split_once("loadbalancer/")
        .map(|(_, rest)| rest)
        .unwrap_or(arn)
        .to_string()
}

fn snapshot(description: &ServiceDescription, metrics: &ServiceMetrics) -> ServiceSnapshot {
    let r1 = |v: Option<f64>| round_to(v.unwrap_or(0.0), 1);
    ServiceSnapshot {
        name: description.name.clone(),
        status: description.status.clone(),
        running_count: description.running_count,
        desired_count: description.desired_count,
        cpu_avg: r1(mean_average(&metrics.cpu)),
        cpu_max: r1(max_maximum(&metrics.cpu)),
        memory_avg: r1(mean_average(&metrics.memory)),
        memory_max: r1(max_maximum(&metrics.memory)),
        target_groups: metrics
            .target_groups
            .iter()
            .map(|(name, tg)| (name.clone(), TargetGroupSummary::from(tg)))
            .collect(),
        task_definition: metrics.task_definition.clone(),
    }
}
