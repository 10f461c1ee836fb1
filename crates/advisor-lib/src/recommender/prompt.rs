//! Prompt templates

use super::AnalysisPayload;
use crate::error::Result;
use crate::models::ServiceMetrics;

const ACCOUNT_SCHEMA: &str = r#"{
    "overall_health": "good|warning|critical",
    "scaling_recommendations": [
        {
            "cluster": "cluster-name",
            "service": "service-name",
            "action": "scale_up|scale_down|no_change",
            "reason": "explanation",
            "suggested_capacity": {
                "desired_count": number,
                "cpu": number,
                "memory": number
            }
        }
    ],
    "performance_issues": [
        {
            "cluster": "cluster-name",
            "service": "service-name",
            "issue": "description",
            "severity": "low|medium|high",
            "solution": "recommended action"
        }
    ],
    "cost_optimization": [
        {
            "cluster": "cluster-name",
            "recommendation": "description",
            "potential_savings": "estimated percentage"
        }
    ],
    "summary": "Overall assessment and key actions needed"
}"#;

const SERVICE_SCHEMA: &str = r#"{
    "service_health": "good|warning|critical",
    "scaling_action": "scale_up|scale_down|no_change",
    "reason": "explanation",
    "recommendations": ["recommendation1", "recommendation2", "recommendation3", "recommendation4", "recommendation5", "recommendation6", "recommendation7", "recommendation8", "recommendation9", "recommendation10"],
    "priority": "low|medium|high"
}"#;

/// Account-wide analysis prompt
pub fn analysis_prompt(payload: &AnalysisPayload) -> Result<String> {
    let metrics = serde_json::to_string_pretty(&payload.metrics_summary)?;
    let logs = serde_json::to_string_pretty(&payload.log_analysis)?;

    Ok(format!(
        "You are an AWS ECS infrastructure expert. Analyze the following ECS cluster data and provide specific recommendations:

METRICS SUMMARY:
{metrics}

LOG ANALYSIS:
{logs}

CLUSTERS: {clusters}

Please provide recommendations in the following JSON format:
{ACCOUNT_SCHEMA}

Focus on:
1. Services with CPU > 80% or Memory > 80% need scaling up
2. Services with CPU < 20% and Memory < 20% might be over-provisioned
3. High error rates in logs indicate application issues
4. Provide specific, actionable recommendations
5. Services with higher request count and response time should be prioritized for scaling
",
        clusters = payload.clusters.join(", "),
    ))
}

/// Single-service analysis prompt
pub fn service_prompt(
    cluster: &str,
    service: &str,
    metrics: &ServiceMetrics,
    error_count: usize,
) -> Result<String> {
    let metrics = serde_json::to_string_pretty(metrics)?;

    Ok(format!(
        "Analyze this ECS service and provide specific recommendations:
Metrics contain running_count, desired_count, CPU, Memory, Task Definition (cpu, memory, containers), Service Scaling Policies (min_capacity, max_capacity, policies) and Target Groups (requests, response time, HTTP codes), one datapoint per day for the last 7 days.

SERVICE: {service} in cluster {cluster}
METRICS: {metrics}
ERROR LOGS: {error_count} errors found

Recommendations should focus on: scaling_recommendations, performance_improvements, cost_optimizations, reliability_enhancements, security_best_practices.
Provide JSON response with 5-10 detailed recommendations:
{SERVICE_SCHEMA}

Focus on actionable insights based on the provided metrics and logs.
Ensure the JSON is properly formatted.
Respond only with the JSON object.
Do not include any additional text or explanations outside the JSON.
"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScalingConfiguration;
    use crate::summarize::ClusterSummary;
    use std::collections::BTreeMap;

    #[test]
    fn test_analysis_prompt_sections() {
        let payload = AnalysisPayload {
            timestamp: "2024-05-01T00:00:00Z".into(),
            metrics_summary: BTreeMap::from([(
                "prod".to_string(),
                ClusterSummary {
                    service_count: 2,
                    high_cpu_services: vec!["web".into()],
                    ..Default::default()
                },
            )]),
            log_analysis: BTreeMap::new(),
            clusters: vec!["prod".into(), "staging".into()],
        };

        let prompt = analysis_prompt(&payload).unwrap();
        assert!(prompt.starts_with("You are an AWS ECS infrastructure expert."));
        assert!(prompt.contains("\"high_cpu_services\": [\n      \"web\"\n    ]"));
        assert!(prompt.contains("CLUSTERS: prod, staging"));
        assert!(prompt.contains("\"overall_health\": \"good|warning|critical\""));
        assert!(prompt.contains("5. Services with higher request count"));
    }

    #[test]
    fn test_service_prompt_sections() {
        let prompt = service_prompt("prod", "web", &ServiceMetrics::default(), 4).unwrap();
        assert!(prompt.contains("SERVICE: web in cluster prod"));
        assert!(prompt.contains("ERROR LOGS: 4 errors found"));
        assert!(prompt.contains("\"scaling_action\": \"scale_up|scale_down|no_change\""));
        assert!(prompt.contains("Respond only with the JSON object."));
    }

    #[test]
    fn test_service_prompt_carries_scaling_setup() {
        let metrics = ServiceMetrics {
            scaling: Some(ScalingConfiguration {
                min_capacity: 2,
                max_capacity: 8,
                ..Default::default()
            }),
            ..Default::default()
        };

        let prompt = service_prompt("prod", "web", &metrics, 0).unwrap();
        assert!(prompt.contains("Service Scaling Policies (min_capacity, max_capacity, policies)"));
        assert!(prompt.contains("\"min_capacity\": 2"));
        assert!(prompt.contains("\"max_capacity\": 8"));
    }
}
