//! Model reply parsing

use crate::error::{AdvisorError, Result};
use crate::models::{AccountRecommendation, ServiceRecommendation};
use serde::de::DeserializeOwned;

/// The text between the first `{` and the last `}`, inclusive
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text).ok_or_else(|| {
        AdvisorError::ModelResponse("reply contains no JSON object".to_string())
    })?;
    serde_json::from_str(json).map_err(|e| AdvisorError::ModelResponse(e.to_string()))
}

/// Parse an account-wide reply and stamp it with `generated_at`
pub fn parse_account(text: &str, generated_at: &str) -> Result<AccountRecommendation> {
    let mut recommendation: AccountRecommendation = parse(text)?;
    recommendation.generated_at = generated_at.to_string();
    Ok(recommendation)
}

pub fn parse_service(text: &str) -> Result<ServiceRecommendation> {
    parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Health, Priority, ScalingAction};

    #[test]
    fn test_extract_json() {
        assert_eq!(
            extract_json("Here you go: {\"a\": {\"b\": 1}} done"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json("no json"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_account_reply() {
        let reply = r#"Sure. {
            "overall_health": "critical",
            "scaling_recommendations": [{
                "cluster": "prod", "service": "web", "action": "scale_up",
                "reason": "CPU saturated",
                "suggested_capacity": {"desired_count": 6, "cpu": 1024, "memory": 2048}
            }],
            "performance_issues": [{
                "cluster": "prod", "service": "web", "issue": "latency",
                "severity": "high", "solution": "cache"
            }],
            "cost_optimization": [{
                "cluster": "batch", "recommendation": "right-size", "potential_savings": "30%"
            }],
            "summary": "Scale web"
        }"#;

        let recommendation = parse_account(reply, "2024-05-01T00:00:00Z").unwrap();
        assert_eq!(recommendation.overall_health, Health::Critical);
        assert_eq!(recommendation.scaling_recommendations[0].action, ScalingAction::ScaleUp);
        assert_eq!(
            recommendation.scaling_recommendations[0]
                .suggested_capacity
                .as_ref()
                .unwrap()
                .desired_count,
            serde_json::json!(6)
        );
        assert_eq!(recommendation.cost_optimization[0].potential_savings, "30%");
        assert_eq!(recommendation.generated_at, "2024-05-01T00:00:00Z");
    }

    #[test]
    fn test_parse_service_reply() {
        let reply = r#"{"service_health": "warning", "scaling_action": "no_change", "reason": "ok",
            "recommendations": ["a", "b"], "priority": "medium"}"#;
        let recommendation = parse_service(reply).unwrap();
        assert_eq!(recommendation.priority, Priority::Medium);
        assert_eq!(recommendation.recommendations.len(), 2);
    }

    #[test]
    fn test_parse_service_reply_with_capitalized_values() {
        let reply = r#"{"service_health": "Critical", "scaling_action": "Scale_Up", "reason": "hot",
            "recommendations": ["add tasks"], "priority": "HIGH"}"#;
        let recommendation = parse_service(reply).unwrap();
        assert_eq!(recommendation.service_health, Health::Critical);
        assert_eq!(recommendation.scaling_action, ScalingAction::ScaleUp);
        assert_eq!(recommendation.priority, Priority::High);
    }

    #[test]
    fn test_unparseable_replies() {
        assert!(matches!(
            parse_service("I cannot help with that"),
            Err(AdvisorError::ModelResponse(_))
        ));
        assert!(parse_service(r#"{"service_health": "excellent"}"#).is_err());
        assert!(parse_account("{ not json }", "now").is_err());
    }
}
