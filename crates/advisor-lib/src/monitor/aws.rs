//! AWS SDK implementation of [`FleetApi`]

use super::{
    async_trait, FleetApi, FleetMonitor, LoadBalancerDescription, MetricQuery, MonitorFactory,
    MonitorSettings, Page, ScalableTarget, ServiceDescription, Statistic, TargetGroupDescription,
};
use crate::error::{AdvisorError, Result};
use crate::models::{
    Account, ContainerShape, Datapoint, ScalingPolicy, StepAdjustment, TaskDefinitionShape,
};
use crate::session::{self, CredentialSettings};
use aws_config::SdkConfig;
use aws_sdk_applicationautoscaling::types::ServiceNamespace;
use aws_sdk_cloudwatch::primitives::DateTime as SmithyDateTime;
use aws_sdk_cloudwatch::types::{Dimension, Statistic as CwStatistic};
use aws_sdk_cloudwatchlogs::types::OrderBy;
use std::sync::Arc;
use tracing::debug;

/// Clients for every service the monitor reads from
pub struct AwsFleetApi {
    ecs: aws_sdk_ecs::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    autoscaling: aws_sdk_applicationautoscaling::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
}

impl AwsFleetApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ecs: aws_sdk_ecs::Client::new(config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(config),
            autoscaling: aws_sdk_applicationautoscaling::Client::new(config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(config),
            logs: aws_sdk_cloudwatchlogs::Client::new(config),
        }
    }
}

fn dimension(name: &str, value: &str) -> Dimension {
    Dimension::builder().name(name).value(value).build()
}

fn statistic(stat: Statistic) -> CwStatistic {
    match stat {
        Statistic::Average => CwStatistic::Average,
        Statistic::Maximum => CwStatistic::Maximum,
        Statistic::Sum => CwStatistic::Sum,
    }
}

#[async_trait]
impl FleetApi for AwsFleetApi {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .ecs
            .list_clusters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("ListClusters", e))?;

        Ok(Page {
            items: response.cluster_arns().to_vec(),
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let response = self
            .ecs
            .list_services()
            .cluster(cluster)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("ListServices", e))?;

        Ok(Page {
            items: response.service_arns().to_vec(),
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceDescription>> {
        if services.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .set_services(Some(services.to_vec()))
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeServices", e))?;

        Ok(response
            .services()
            .iter()
            .map(|s| ServiceDescription {
                name: s.service_name().unwrap_or_default().to_string(),
                status: s.status().unwrap_or("UNKNOWN").to_string(),
                running_count: s.running_count(),
                desired_count: s.desired_count(),
                task_definition: s.task_definition().map(str::to_string),
                target_group_arns: s
                    .load_balancers()
                    .iter()
                    .filter_map(|lb| lb.target_group_arn())
                    .map(str::to_string)
                    .collect(),
            })
            .collect())
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Option<TaskDefinitionShape>> {
        let response = self
            .ecs
            .describe_task_definition()
            .task_definition(task_definition)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeTaskDefinition", e))?;

        Ok(response.task_definition().map(|td| TaskDefinitionShape {
            family: td.family().unwrap_or_default().to_string(),
            revision: td.revision(),
            compatibilities: td
                .compatibilities()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            requires_compatibilities: td
                .requires_compatibilities()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            cpu: td.cpu().map(str::to_string),
            memory: td.memory().map(str::to_string),
            containers: td
                .container_definitions()
                .iter()
                .map(|c| ContainerShape {
                    name: c.name().unwrap_or_default().to_string(),
                    cpu: c.cpu(),
                    memory: c.memory(),
                    memory_reservation: c.memory_reservation(),
                })
                .collect(),
        }))
    }

    async fn describe_target_group(&self, arn: &str) -> Result<Option<TargetGroupDescription>> {
        let response = self
            .elb
            .describe_target_groups()
            .target_group_arns(arn)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeTargetGroups", e))?;

        Ok(response.target_groups().first().map(|tg| TargetGroupDescription {
            arn: tg.target_group_arn().unwrap_or(arn).to_string(),
            name: tg.target_group_name().unwrap_or_default().to_string(),
            load_balancer_arns: tg.load_balancer_arns().to_vec(),
        }))
    }

    async fn describe_load_balancer(&self, arn: &str) -> Result<Option<LoadBalancerDescription>> {
        let response = self
            .elb
            .describe_load_balancers()
            .load_balancer_arns(arn)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeLoadBalancers", e))?;

        Ok(response.load_balancers().first().map(|lb| LoadBalancerDescription {
            arn: lb.load_balancer_arn().unwrap_or(arn).to_string(),
            name: lb.load_balancer_name().unwrap_or_default().to_string(),
            lb_type: lb
                .r#type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
        }))
    }

    async fn describe_scalable_target(&self, resource_id: &str) -> Result<Option<ScalableTarget>> {
        let response = self
            .autoscaling
            .describe_scalable_targets()
            .service_namespace(ServiceNamespace::Ecs)
            .resource_ids(resource_id)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeScalableTargets", e))?;

        Ok(response.scalable_targets().first().map(|t| ScalableTarget {
            min_capacity: t.min_capacity(),
            max_capacity: t.max_capacity(),
            role_arn: Some(t.role_arn().to_string()).filter(|arn| !arn.is_empty()),
        }))
    }

    async fn describe_scaling_policies(&self, resource_id: &str) -> Result<Vec<ScalingPolicy>> {
        let mut policies = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .autoscaling
                .describe_scaling_policies()
                .service_namespace(ServiceNamespace::Ecs)
                .resource_id(resource_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AdvisorError::cloud("DescribeScalingPolicies", e))?;

            policies.extend(response.scaling_policies().iter().map(|p| {
                let mut policy = ScalingPolicy {
                    policy_name: p.policy_name().to_string(),
                    policy_type: p.policy_type().as_str().to_string(),
                    scalable_dimension: p.scalable_dimension().as_str().to_string(),
                    ..Default::default()
                };
                if let Some(config) = p.target_tracking_scaling_policy_configuration() {
                    policy.target_value = Some(config.target_value());
                    policy.metric_type = config
                        .predefined_metric_specification()
                        .map(|m| m.predefined_metric_type().as_str().to_string());
                }
                if let Some(config) = p.step_scaling_policy_configuration() {
                    policy.adjustment_type = config.adjustment_type().map(|a| a.as_str().to_string());
                    policy.cooldown = config.cooldown();
                    policy.metric_aggregation_type = config
                        .metric_aggregation_type()
                        .map(|m| m.as_str().to_string());
                    policy.step_adjustments = config
                        .step_adjustments()
                        .iter()
                        .map(|step| StepAdjustment {
                            metric_interval_lower_bound: step.metric_interval_lower_bound(),
                            metric_interval_upper_bound: step.metric_interval_upper_bound(),
                            scaling_adjustment: step.scaling_adjustment(),
                        })
                        .collect();
                }
                policy
            }));
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(policies)
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let response = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .set_dimensions(Some(
                query
                    .dimensions
                    .iter()
                    .map(|(name, value)| dimension(name, value))
                    .collect(),
            ))
            .start_time(SmithyDateTime::from_secs(query.start.timestamp()))
            .end_time(SmithyDateTime::from_secs(query.end.timestamp()))
            .period(query.period_secs)
            .set_statistics(Some(query.statistics.iter().copied().map(statistic).collect()))
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("GetMetricStatistics", e))?;

        debug!(
            metric = %query.metric_name,
            datapoints = response.datapoints().len(),
            "Received datapoints"
        );

        Ok(response
            .datapoints()
            .iter()
            .filter_map(|dp| {
                let timestamp = dp.timestamp()?;
                Some(Datapoint {
                    timestamp: chrono::DateTime::from_timestamp(
                        timestamp.secs(),
                        timestamp.subsec_nanos(),
                    )?,
                    average: dp.average().unwrap_or(0.0),
                    maximum: dp.maximum().unwrap_or(0.0),
                    sum: dp.sum().unwrap_or(0.0),
                    unit: dp.unit().map(|u| u.as_str().to_string()),
                })
            })
            .collect())
    }

    async fn log_groups(&self, prefix: &str) -> Result<Vec<String>> {
        let mut groups = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .logs
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| AdvisorError::cloud("DescribeLogGroups", e))?;

            groups.extend(
                response
                    .log_groups()
                    .iter()
                    .filter_map(|g| g.log_group_name())
                    .map(str::to_string),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(groups)
    }

    async fn latest_log_streams(&self, group: &str, limit: i32) -> Result<Vec<String>> {
        let response = self
            .logs
            .describe_log_streams()
            .log_group_name(group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("DescribeLogStreams", e))?;

        Ok(response
            .log_streams()
            .iter()
            .filter_map(|s| s.log_stream_name())
            .map(str::to_string)
            .collect())
    }

    async fn log_events(
        &self,
        group: &str,
        stream: &str,
        start_time_ms: Option<i64>,
        limit: i32,
    ) -> Result<Vec<String>> {
        let response = self
            .logs
            .get_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_start_time(start_time_ms)
            .limit(limit)
            .start_from_head(false)
            .send()
            .await
            .map_err(|e| AdvisorError::cloud("GetLogEvents", e))?;

        Ok(response
            .events()
            .iter()
            .filter_map(|e| e.message())
            .map(str::to_string)
            .collect())
    }
}

/// Resolves the account session on every call so temporary credentials never go stale
#[derive(Debug, Clone, Default)]
pub struct AwsMonitorFactory {
    credentials: CredentialSettings,
    settings: MonitorSettings,
}

impl AwsMonitorFactory {
    pub fn new(credentials: CredentialSettings, settings: MonitorSettings) -> Self {
        Self {
            credentials,
            settings,
        }
    }
}

#[async_trait]
impl MonitorFactory for AwsMonitorFactory {
    async fn monitor(&self, account: &Account) -> Result<FleetMonitor> {
        let config = session::resolve(account, &self.credentials).await?;
        Ok(FleetMonitor::new(
            account.account_id.clone(),
            Arc::new(AwsFleetApi::new(&config)),
            self.settings.clone(),
        ))
    }
}
