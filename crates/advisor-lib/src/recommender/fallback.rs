//! Rule-based recommendations used when the model is unavailable
//!
//! Both functions return the same shapes the model is asked to produce,
//! so callers never need to tell the two sources apart.

use super::AnalysisPayload;
use crate::models::{
    mean_average, AccountRecommendation, Health, Priority, ScalingAction, ScalingRecommendation,
    ServiceMetrics, ServiceRecommendation, SuggestedCapacity,
};
use crate::summarize::Thresholds;
use serde_json::json;

const MISSING_METRICS_REASON: &str = "Unable to assess service performance due to missing \
    CPU and memory metrics data. The metrics arrays are empty, indicating a potential \
    monitoring issue.";

const MISSING_METRICS_ACTIONS: [&str; 3] = [
    "Verify CloudWatch metrics collection is enabled for this service",
    "Check IAM permissions for CloudWatch:GetMetricStatistics",
    "Ensure ECS service has proper task definition with awslogs driver",
];

/// Account-wide fallback: a scale-up suggestion for every high-CPU service
pub fn account_fallback(payload: &AnalysisPayload) -> AccountRecommendation {
    let scaling_recommendations = payload
        .metrics_summary
        .iter()
        .flat_map(|(cluster, summary)| {
            summary
                .high_cpu_services
                .iter()
                .map(move |service| ScalingRecommendation {
                    cluster: cluster.clone(),
                    service: service.clone(),
                    action: ScalingAction::ScaleUp,
                    reason: "High CPU utilization detected".to_string(),
                    suggested_capacity: Some(SuggestedCapacity {
                        desired_count: json!("increase by 1-2 tasks"),
                        cpu: json!("consider increasing CPU allocation"),
                        memory: json!("monitor memory usage"),
                    }),
                })
        })
        .collect();

    AccountRecommendation {
        overall_health: Health::Warning,
        scaling_recommendations,
        performance_issues: Vec::new(),
        cost_optimization: Vec::new(),
        summary: "Basic analysis completed. Manual review recommended.".to_string(),
        generated_at: payload.timestamp.clone(),
    }
}

/// Single-service fallback from utilization means and the error line count
pub fn service_fallback(
    service: &str,
    metrics: &ServiceMetrics,
    error_lines: usize,
    thresholds: &Thresholds,
) -> ServiceRecommendation {
    if !metrics.has_utilization() {
        return ServiceRecommendation {
            service_health: Health::Warning,
            scaling_action: ScalingAction::NoChange,
            reason: MISSING_METRICS_REASON.to_string(),
            recommendations: MISSING_METRICS_ACTIONS.iter().map(|s| s.to_string()).collect(),
            priority: Priority::Medium,
        };
    }

    let mut health = Health::Good;
    let mut action = ScalingAction::NoChange;
    let mut recommendations = Vec::new();

    if mean_average(&metrics.cpu).is_some_and(|avg| avg > thresholds.cpu_high) {
        health = Health::Warning;
        action = ScalingAction::ScaleUp;
        recommendations.push("High CPU usage detected - consider scaling up".to_string());
    }
    if mean_average(&metrics.memory).is_some_and(|avg| avg > thresholds.memory_high) {
        health = if health == Health::Warning {
            Health::Critical
        } else {
            Health::Warning
        };
        action = ScalingAction::ScaleUp;
        recommendations.push("High memory usage detected - consider scaling up".to_string());
    }
    if error_lines > thresholds.error_log_count {
        health = Health::Warning;
        recommendations
            .push("High error rate in logs - investigate application issues".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Service appears healthy".to_string());
    }

    let priority = match health {
        Health::Critical => Priority::High,
        Health::Warning => Priority::Medium,
        Health::Good => Priority::Low,
    };

    ServiceRecommendation {
        service_health: health,
        scaling_action: action,
        reason: format!("Analysis of {} metrics and logs", service),
        recommendations,
        priority,
    }
}
