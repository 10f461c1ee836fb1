//! Integration tests for the advisor API endpoints

use advisor_lib::{
    advisor::AdvisorSettings,
    health::{components, HealthRegistry},
    monitor::{
        FleetApi, FleetMonitor, LoadBalancerDescription, MetricQuery, MonitorFactory,
        MonitorSettings, Page, ScalableTarget, ServiceDescription, TargetGroupDescription,
    },
    observability::AdvisorMetrics,
    recommender::{LanguageModel, ModelProvider},
    store::{KnowledgeStore, MemoryStore},
    Account, AdvisorError, Datapoint, FleetAdvisor, Result, ScalingPolicy, TaskDefinitionShape,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fleet_advisor::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

/// One cluster with one busy service and one idle service
struct StaticFleet;

#[async_trait]
impl FleetApi for StaticFleet {
    async fn list_clusters(&self, _next_token: Option<String>) -> Result<Page<String>> {
        Ok(Page {
            items: vec!["arn:aws:ecs:ap-south-1:111122223333:cluster/prod".to_string()],
            next_token: None,
        })
    }

    async fn list_services(&self, cluster: &str, _next_token: Option<String>) -> Result<Page<String>> {
        if cluster != "prod" {
            return Err(AdvisorError::Cloud {
                operation: "ListServices".into(),
                message: "ClusterNotFoundException".into(),
            });
        }
        Ok(Page {
            items: vec![
                "arn:aws:ecs:ap-south-1:111122223333:service/prod/web".to_string(),
                "arn:aws:ecs:ap-south-1:111122223333:service/prod/cron".to_string(),
            ],
            next_token: None,
        })
    }

    async fn describe_services(
        &self,
        _cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceDescription>> {
        Ok(services
            .iter()
            .map(|name| ServiceDescription {
                name: name.clone(),
                status: "ACTIVE".into(),
                running_count: 2,
                desired_count: 2,
                ..Default::default()
            })
            .collect())
    }

    async fn describe_task_definition(&self, _: &str) -> Result<Option<TaskDefinitionShape>> {
        Ok(None)
    }

    async fn describe_target_group(&self, _: &str) -> Result<Option<TargetGroupDescription>> {
        Ok(None)
    }

    async fn describe_load_balancer(&self, _: &str) -> Result<Option<LoadBalancerDescription>> {
        Ok(None)
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        if query.dimension("ServiceName") != Some("web") || query.metric_name != "CPUUtilization" {
            return Ok(Vec::new());
        }
        Ok(vec![Datapoint {
            timestamp: chrono::Utc::now(),
            average: 93.0,
            maximum: 99.0,
            sum: 0.0,
            unit: Some("Percent".into()),
        }])
    }

    async fn log_groups(&self, _: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn latest_log_streams(&self, _: &str, _: i32) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn log_events(&self, _: &str, _: &str, _: Option<i64>, _: i32) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn describe_scalable_target(&self, _: &str) -> Result<Option<ScalableTarget>> {
        Ok(None)
    }

    async fn describe_scaling_policies(&self, _: &str) -> Result<Vec<ScalingPolicy>> {
        Ok(Vec::new())
    }
}

struct StaticMonitors;

#[async_trait]
impl MonitorFactory for StaticMonitors {
    async fn monitor(&self, account: &Account) -> Result<FleetMonitor> {
        if account.account_id == "000000000000" {
            return Err(AdvisorError::Credentials("InvalidClientTokenId".into()));
        }
        Ok(FleetMonitor::new(
            account.account_id.clone(),
            Arc::new(StaticFleet),
            MonitorSettings::default(),
        ))
    }
}

/// No model anywhere, so every answer comes from the rules
struct NoModels;

#[async_trait]
impl ModelProvider for NoModels {
    async fn model(&self, _account_id: &str) -> Option<Arc<dyn LanguageModel>> {
        None
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::RECOMMENDER).await;

    let advisor = FleetAdvisor::new(
        Arc::new(MemoryStore::default()),
        Arc::new(StaticMonitors),
        Arc::new(NoModels),
        AdvisorSettings::default(),
    )
    .with_health(health_registry.clone());
    let state = Arc::new(AppState::new(Arc::new(advisor), health_registry, "ap-south-1"));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

async fn add_account(app: &Router, id: &str, name: &str) {
    let (status, body) = send(
        app,
        "POST",
        "/accounts",
        Some(serde_json::json!({ "account_id": id, "account_name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Account added, monitoring started");
}

#[tokio::test]
async fn test_health_is_always_ok() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_healthz_reflects_components() {
    let (app, state) = setup_test_app().await;

    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["components"]["store"].is_object());

    state
        .health_registry
        .set_degraded(components::RECOMMENDER, "model unavailable")
        .await;
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    state
        .health_registry
        .set_unhealthy(components::STORE, "ResourceNotFoundException")
        .await;
    let (status, body) = send(&app, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_initialization() {
    let (app, state) = setup_test_app().await;

    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, body) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;
    let metrics = AdvisorMetrics::new();
    metrics.observe_refresh_latency(0.4);
    metrics.set_accounts_monitored(1);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("fleet_advisor_refresh_latency_seconds_bucket"));
    assert!(text.contains("fleet_advisor_accounts_monitored"));
}

#[tokio::test]
async fn test_add_and_list_accounts() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;
    add_account(&app, "000000000000", "broken").await;

    let (status, body) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    let accounts = body.as_array().unwrap();
    assert_eq!(accounts.len(), 2);

    let broken = accounts.iter().find(|a| a["account_id"] == "000000000000").unwrap();
    assert_eq!(broken["status"], "inactive");
    assert_eq!(broken["last_updated"], "error");
    let prod = accounts.iter().find(|a| a["account_id"] == "111122223333").unwrap();
    assert_eq!(prod["status"], "active");
    assert_eq!(prod["clusters"], serde_json::json!(["prod"]));
}

#[tokio::test]
async fn test_paged_account_listing() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(&app, "GET", "/accounts?page=1&limit=5&status_filter=active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["filters"]["status_filter"], "active");

    let (status, body) = send(&app, "GET", "/accounts?page=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_add_account_defaults_region() {
    let (app, state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let stored = state.advisor.store().account("111122223333").await.unwrap().unwrap();
    assert_eq!(stored.region, "ap-south-1");
}

#[tokio::test]
async fn test_unknown_account_is_404() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = send(&app, "GET", "/recommendations/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["error"], "account 999 not found");
}

#[tokio::test]
async fn test_account_recommendation_falls_back_to_rules() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(&app, "GET", "/recommendations/111122223333", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall_health"], "warning");
    assert_eq!(body["scaling_recommendations"][0]["service"], "web");
    assert_eq!(body["scaling_recommendations"][0]["action"], "scale_up");
}

#[tokio::test]
async fn test_service_recommendation_and_details() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(&app, "GET", "/recommendations/111122223333/prod/web", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scaling_action"], "scale_up");

    let (status, _) = send(&app, "POST", "/accounts/111122223333/refresh", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/service-details/111122223333/prod/web", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running_count"], 2);
    assert_eq!(body["cpu_avg"], 93.0);

    let (status, _) = send(&app, "GET", "/service-details/111122223333/prod/api", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cluster_recommendations_routes() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(&app, "GET", "/cluster-recommendations/111122223333", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_clusters"], 1);
    assert_eq!(body["clusters"]["prod"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/cluster-recommendations/111122223333/prod", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cluster_name"], "prod");
    assert_eq!(body["summary"]["total_services"], 2);

    let (status, body) = send(&app, "GET", "/cluster-recommendations/111122223333/dev", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("available clusters: prod"));
}

#[tokio::test]
async fn test_service_recommendation_filters() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;
    send(&app, "POST", "/trigger-daily-recommendations", None).await;

    let (status, body) = send(
        &app,
        "GET",
        "/service-recommendations/111122223333?health_status=warning",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filter"], "health=warning");
    assert_eq!(body["count"], 2);

    let (status, body) = send(
        &app,
        "GET",
        "/service-recommendations/111122223333?priority=urgent",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_knowledge_counts_records() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;
    send(&app, "GET", "/recommendations/111122223333", None).await;

    let (status, body) = send(&app, "GET", "/knowledge/111122223333", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_id"], "111122223333");
    assert!(body["total_records"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_chat_without_model() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(
        &app,
        "POST",
        "/chat/111122223333",
        Some(serde_json::json!({ "message": "Why scale web?", "reset_chat": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("unavailable"));

    let (status, _) = send(
        &app,
        "POST",
        "/chat/999",
        Some(serde_json::json!({ "message": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_email_without_notifier_is_rejected() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(
        &app,
        "POST",
        "/send-email/111122223333",
        Some(serde_json::json!({ "email": "me@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_jobs_and_rollups() {
    let (app, _state) = setup_test_app().await;
    add_account(&app, "111122223333", "prod").await;

    let (status, body) = send(&app, "POST", "/trigger-weekly-recommendations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Weekly cluster recommendations generated successfully");
    assert_eq!(body["services"], 2);

    let (status, _) = send(&app, "POST", "/trigger-weekly-report", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/all-recommendations", None).await;
    assert_eq!(status, StatusCode::OK);
    let priorities: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(priorities, vec!["medium"]);
    assert_eq!(body["medium"]["warning"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/analytics-data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_accounts"], 1);
    assert_eq!(body["active_accounts"], 1);
    assert_eq!(body["total_tasks"], 4);
    assert_eq!(body["recommendations_summary"]["total"], 2);
}
