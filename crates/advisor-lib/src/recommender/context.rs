//! One-line metric summaries for chat context

use crate::models::{max_maximum, mean_average, mean_sum, ServiceMetrics};

/// Human readable digest of a service's metrics, `; `-separated
pub fn metrics_context(metrics: &ServiceMetrics) -> String {
    let parts = metrics_parts(metrics);
    if parts.is_empty() {
        "No detailed metrics available".to_string()
    } else {
        parts.join("; ")
    }
}

/// One entry per utilization series, per target group with data and for
/// the auto scaling setup
pub fn metrics_parts(metrics: &ServiceMetrics) -> Vec<String> {
    let mut parts = Vec::new();

    if let (Some(avg), Some(max)) = (mean_average(&metrics.cpu), max_maximum(&metrics.cpu)) {
        parts.push(format!("CPU: Average {:.1}%, Maximum {:.1}%", avg, max));
    }
    if let (Some(avg), Some(max)) = (mean_average(&metrics.memory), max_maximum(&metrics.memory)) {
        parts.push(format!("Memory: Average {:.1}%, Maximum {:.1}%", avg, max));
    }

    for (name, tg) in &metrics.target_groups {
        let mut details = Vec::new();
        if let Some(avg) = mean_average(&tg.healthy_hosts) {
            details.push(format!("Healthy Hosts: {:.1}", avg));
        }
        if let Some(avg) = mean_average(&tg.unhealthy_hosts) {
            details.push(format!("Unhealthy Hosts: {:.1}", avg));
        }
        if let Some(avg) = mean_average(&tg.response_time) {
            details.push(format!("Response Time: {:.3}s", avg));
        }
        if let Some(avg) = mean_sum(&tg.request_count) {
            details.push(format!("Requests: {:.0}/period", avg));
        }
        if !details.is_empty() {
            parts.push(format!("Target Group {}: {}", name, details.join(", ")));
        }
    }

    if let Some(scaling) = &metrics.scaling {
        parts.push(format!("Auto Scaling: {}", scaling.describe()));
    }

    parts
}
