//! Orchestration tests against an in-memory fleet, store and model

use super::*;
use crate::chat::{ChatContext, UNAVAILABLE_REPLY};
use crate::health::ComponentStatus;
use crate::models::{ScalingAction, StoredRecommendation};
use crate::monitor::tests::web_fleet;
use crate::monitor::MonitorSettings;
use crate::notify::EmailMessage;
use crate::recommender::{ConverseRequest, LanguageModel};
use crate::store::MemoryStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

const HOT_SERVICE_REPLY: &str = r#"Here you go:
{"service_health": "critical", "scaling_action": "scale_up", "reason": "CPU is pinned",
 "recommendations": ["Add 2 tasks", "Raise the CPU reservation"], "priority": "high"}"#;

/// Every account gets the same two-service fleet unless listed as failing
#[derive(Default)]
struct MockMonitors {
    failing: HashSet<String>,
}

#[async_trait]
impl MonitorFactory for MockMonitors {
    async fn monitor(&self, account: &Account) -> Result<FleetMonitor> {
        if self.failing.contains(&account.account_id) {
            return Err(AdvisorError::Credentials("ExpiredToken".into()));
        }
        Ok(FleetMonitor::new(
            account.account_id.clone(),
            Arc::new(web_fleet()),
            MonitorSettings::default(),
        ))
    }
}

struct CannedModel {
    reply: std::result::Result<String, String>,
}

#[async_trait]
impl LanguageModel for CannedModel {
    fn model_id(&self) -> &str {
        "canned"
    }

    async fn converse(&self, _request: ConverseRequest) -> Result<String> {
        self.reply.clone().map_err(AdvisorError::Model)
    }
}

struct StaticModels(Option<Arc<dyn LanguageModel>>);

impl StaticModels {
    fn none() -> Arc<Self> {
        Arc::new(Self(None))
    }

    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self(Some(Arc::new(CannedModel {
            reply: Ok(text.to_string()),
        }))))
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self(Some(Arc::new(CannedModel {
            reply: Err(message.to_string()),
        }))))
    }
}

#[async_trait]
impl ModelProvider for StaticModels {
    async fn model(&self, _account_id: &str) -> Option<Arc<dyn LanguageModel>> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: EmailMessage) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("msg-{}", sent.len()))
    }
}

/// Memory store whose writes fail, apart from account registration
#[derive(Default)]
struct ReadOnlyStore {
    inner: MemoryStore,
}

fn write_failure() -> AdvisorError {
    AdvisorError::Store("PutItem: ProvisionedThroughputExceededException".into())
}

#[async_trait]
impl KnowledgeStore for ReadOnlyStore {
    async fn put_account(&self, account: &Account) -> Result<()> {
        self.inner.put_account(account).await
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.inner.accounts().await
    }

    async fn account(&self, account_id: &str) -> Result<Option<Account>> {
        self.inner.account(account_id).await
    }

    async fn put_cluster_snapshot(&self, _: &str, _: &ClusterSnapshot) -> Result<()> {
        Err(write_failure())
    }

    async fn cluster_snapshot(&self, account_id: &str) -> Result<Option<ClusterSnapshot>> {
        self.inner.cluster_snapshot(account_id).await
    }

    async fn put_account_recommendation(&self, _: &str, _: &AccountRecommendation) -> Result<()> {
        Err(write_failure())
    }

    async fn account_recommendation(&self, account_id: &str) -> Result<Option<StoredRecommendation>> {
        self.inner.account_recommendation(account_id).await
    }

    async fn put_service_recommendation(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &ServiceRecommendation,
    ) -> Result<()> {
        Err(write_failure())
    }

    async fn service_recommendations(
        &self,
        account_id: &str,
        filter: &RecommendationFilter,
    ) -> Result<Vec<crate::models::ServiceRecommendationRecord>> {
        self.inner.service_recommendations(account_id, filter).await
    }

    async fn knowledge_summary(&self, account_id: &str) -> Result<KnowledgeSummary> {
        self.inner.knowledge_summary(account_id).await
    }
}

fn email_settings() -> AdvisorSettings {
    AdvisorSettings {
        email: EmailSettings {
            source: Some("ops@example.com".into()),
            recipients: vec!["team@example.com".into()],
            cc: Vec::new(),
        },
        ..Default::default()
    }
}

fn advisor_with(
    store: Arc<dyn KnowledgeStore>,
    monitors: MockMonitors,
    models: Arc<StaticModels>,
    settings: AdvisorSettings,
) -> FleetAdvisor {
    FleetAdvisor::new(store, Arc::new(monitors), models, settings)
}

fn advisor(models: Arc<StaticModels>) -> FleetAdvisor {
    advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors::default(),
        models,
        AdvisorSettings::default(),
    )
}

async fn register(advisor: &FleetAdvisor, id: &str, name: &str) {
    advisor
        .register_account(Account::new(id, name, "ap-south-1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_account_stamps_times() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;

    let stored = advisor.store().account("111").await.unwrap().unwrap();
    assert!(stored.created_at.is_some());
    assert!(stored.last_updated.is_some());
}

#[tokio::test]
async fn test_register_account_requires_id_and_region() {
    let advisor = advisor(StaticModels::none());
    let err = advisor
        .register_account(Account::new(" ", "prod", "ap-south-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));

    let err = advisor
        .register_account(Account::new("111", "prod", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_account_statuses_mark_unreachable_inactive() {
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors {
            failing: HashSet::from(["222".to_string()]),
        },
        StaticModels::none(),
        AdvisorSettings::default(),
    );
    register(&advisor, "111", "prod").await;
    register(&advisor, "222", "legacy").await;

    let AccountListing::All(statuses) = advisor.account_statuses(&AccountQuery::default()).await.unwrap()
    else {
        panic!("default query should not page");
    };
    assert_eq!(statuses.len(), 2);

    let prod = statuses.iter().find(|s| s.account_id == "111").unwrap();
    assert_eq!(prod.status, "active");
    assert_eq!(prod.clusters, vec!["prod", "staging", "batch"]);
    assert_eq!(prod.cluster_details["prod"].len(), 2);

    let legacy = statuses.iter().find(|s| s.account_id == "222").unwrap();
    assert_eq!(legacy.status, "inactive");
    assert_eq!(legacy.last_updated, "error");
    assert!(legacy.cluster_details.is_empty());
}

#[tokio::test]
async fn test_account_statuses_search_filter_and_page() {
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors {
            failing: HashSet::from(["333".to_string()]),
        },
        StaticModels::none(),
        AdvisorSettings::default(),
    );
    register(&advisor, "111", "Prod East").await;
    register(&advisor, "222", "Prod West").await;
    register(&advisor, "333", "Sandbox").await;

    let query = AccountQuery {
        limit: 1,
        search: "prod".into(),
        ..Default::default()
    };
    let AccountListing::Page(page) = advisor.account_statuses(&query).await.unwrap() else {
        panic!("non-default query should page");
    };
    assert_eq!(page.accounts.len(), 1);
    assert_eq!(page.pagination.total_count, 2);
    assert_eq!(page.pagination.total_pages, 2);
    assert!(page.pagination.has_next);
    assert!(!page.pagination.has_prev);
    assert_eq!(page.filters.search, "prod");

    let query = AccountQuery {
        status_filter: "inactive".into(),
        ..Default::default()
    };
    let AccountListing::Page(page) = advisor.account_statuses(&query).await.unwrap() else {
        panic!("non-default query should page");
    };
    assert_eq!(page.accounts.len(), 1);
    assert_eq!(page.accounts[0].account_id, "333");
}

#[tokio::test]
async fn test_account_statuses_reject_zero_page() {
    let advisor = advisor(StaticModels::none());
    let query = AccountQuery {
        page: 0,
        ..Default::default()
    };
    let err = advisor.account_statuses(&query).await.unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_account_recommendation_is_stored_and_seeds_chat() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;

    let recommendation = advisor.account_recommendation("111").await.unwrap();
    assert_eq!(
        recommendation.summary,
        "Basic analysis completed. Manual review recommended."
    );

    let stored = advisor
        .store()
        .account_recommendation("111")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.recommendation, recommendation);

    let history = advisor.chat_sessions().history("111");
    assert_eq!(history.len(), 2);
    assert!(history[0].content.contains("account-wide ECS recommendations for account 111"));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let advisor = advisor(StaticModels::none());
    let err = advisor.account_recommendation("999").await.unwrap_err();
    assert!(matches!(err, AdvisorError::NotFound(_)));

    let err = advisor
        .service_recommendation("999", "prod", "web")
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisorError::NotFound(_)));
}

#[tokio::test]
async fn test_service_recommendation_from_model() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;

    let recommendation = advisor
        .service_recommendation("111", "prod", "web")
        .await
        .unwrap();
    assert_eq!(recommendation.service_health, Health::Critical);
    assert_eq!(recommendation.priority, Priority::High);

    let stored = advisor
        .store()
        .service_recommendations("111", &RecommendationFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].service, "web");

    let history = advisor.chat_sessions().history("111");
    assert!(history[1].content.contains("Current Metrics: CPU: Average"));
}

#[tokio::test]
async fn test_service_without_metrics_uses_rules() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;

    let recommendation = advisor
        .service_recommendation("111", "prod", "worker")
        .await
        .unwrap();
    assert_eq!(recommendation.service_health, Health::Warning);
    assert_eq!(recommendation.scaling_action, ScalingAction::NoChange);
    assert_eq!(recommendation.priority, Priority::Medium);
}

#[tokio::test]
async fn test_store_write_failures_do_not_fail_calls() {
    let advisor = advisor_with(
        Arc::new(ReadOnlyStore::default()),
        MockMonitors::default(),
        StaticModels::none(),
        AdvisorSettings::default(),
    );
    register(&advisor, "111", "prod").await;

    assert!(advisor.account_recommendation("111").await.is_ok());
    assert!(advisor.service_recommendation("111", "prod", "web").await.is_ok());
    let refreshed = advisor.refresh("111").await.unwrap();
    assert_eq!(refreshed.cluster_details.len(), 3);
    assert!(advisor
        .store()
        .service_recommendations("111", &RecommendationFilter::default())
        .await
        .unwrap()
        .is_empty());
}

async fn watched_health() -> HealthRegistry {
    let health = HealthRegistry::new();
    health.register(components::STORE).await;
    health.register(components::RECOMMENDER).await;
    health.set_ready(true).await;
    health
}

#[tokio::test]
async fn test_store_write_failure_degrades_until_store_answers() {
    let health = watched_health().await;
    let advisor = advisor_with(
        Arc::new(ReadOnlyStore::default()),
        MockMonitors::default(),
        StaticModels::none(),
        AdvisorSettings::default(),
    )
    .with_health(health.clone());
    register(&advisor, "111", "prod").await;

    advisor.refresh("111").await.unwrap();
    let report = health.health().await;
    assert_eq!(report.status, ComponentStatus::Degraded);
    let store = &report.components[components::STORE];
    assert!(store
        .message
        .as_deref()
        .unwrap()
        .contains("ProvisionedThroughputExceededException"));
    assert!(health.readiness().await.ready);

    advisor
        .chat(
            "111",
            ChatRequest {
                message: "hello".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(health.health().await.status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_model_failure_degrades_recommender() {
    let health = watched_health().await;
    let advisor = advisor(StaticModels::failing("AccessDeniedException")).with_health(health.clone());
    register(&advisor, "111", "prod").await;

    advisor.service_recommendation("111", "prod", "web").await.unwrap();
    let report = health.health().await;
    assert_eq!(report.components[components::STORE].status, ComponentStatus::Healthy);
    let recommender = &report.components[components::RECOMMENDER];
    assert_eq!(recommender.status, ComponentStatus::Degraded);
    assert!(recommender.message.as_deref().unwrap().contains("AccessDeniedException"));
}

#[tokio::test]
async fn test_model_reply_clears_recommender_failure() {
    let health = watched_health().await;
    health
        .record_failure(components::RECOMMENDER, "ThrottlingException")
        .await;
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY)).with_health(health.clone());
    register(&advisor, "111", "prod").await;

    advisor.service_recommendation("111", "prod", "web").await.unwrap();
    assert_eq!(health.health().await.status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_refresh_then_service_details() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;

    let refreshed = advisor.refresh("111").await.unwrap();
    assert_eq!(refreshed.message, "Account data refreshed successfully");

    let details = advisor.service_details("111", "prod", "web").await.unwrap();
    assert_eq!(details.running_count, 3);
    assert_eq!(details.desired_count, 4);
    assert_eq!(details.cluster_name, "prod");

    let err = advisor.service_details("111", "dev", "web").await.unwrap_err();
    assert!(matches!(err, AdvisorError::NotFound(ref what) if what == "cluster dev"));
    let err = advisor.service_details("111", "prod", "api").await.unwrap_err();
    assert!(matches!(err, AdvisorError::NotFound(ref what) if what == "service api"));
}

#[tokio::test]
async fn test_cluster_recommendations_for_fleet() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;

    let ClusterRecommendations::Fleet(fleet) =
        advisor.cluster_recommendations("111", None).await.unwrap()
    else {
        panic!("expected every cluster");
    };
    assert_eq!(fleet.summary.total_clusters, 3);
    assert_eq!(fleet.summary.total_services, 2);
    assert!(fleet.clusters["staging"].is_empty());

    let prod = &fleet.clusters["prod"];
    assert_eq!(prod[0].service_name, "web");
    assert_eq!(prod[0].source, RecommendationSource::Model);
    assert_eq!(prod[1].service_name, "worker");
    assert_eq!(prod[1].source, RecommendationSource::Fallback);
    assert_eq!(fleet.summary.health_summary.health_distribution["critical"], 1);
    assert_eq!(fleet.summary.health_summary.health_distribution["good"], 0);
}

#[tokio::test]
async fn test_cluster_recommendations_for_one_cluster() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;

    let ClusterRecommendations::Cluster(cluster) = advisor
        .cluster_recommendations("111", Some("prod"))
        .await
        .unwrap()
    else {
        panic!("expected one cluster");
    };
    assert_eq!(cluster.cluster_name, "prod");
    assert_eq!(cluster.summary.total_services, 2);
    assert_eq!(cluster.summary.distributions.priority_distribution["medium"], 2);

    let err = advisor
        .cluster_recommendations("111", Some("dev"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cluster 'dev' (available clusters: batch, prod, staging) not found"
    );
}

#[tokio::test]
async fn test_filtered_service_recommendations() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;
    advisor.cluster_recommendations("111", Some("prod")).await.unwrap();

    let filter = RecommendationFilter {
        priority: Some(Priority::High),
        ..Default::default()
    };
    let filtered = advisor
        .filtered_service_recommendations("111", &filter)
        .await
        .unwrap();
    assert_eq!(filtered.filter, "priority=high");
    assert_eq!(filtered.count, 1);
    assert_eq!(filtered.recommendations[0].service, "web");
}

#[tokio::test]
async fn test_chat_without_model() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;

    let reply = advisor
        .chat(
            "111",
            ChatRequest {
                message: "How is web doing?".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reply.response, UNAVAILABLE_REPLY);
    assert_eq!(advisor.chat_sessions().history("111").len(), 2);
}

#[tokio::test]
async fn test_chat_records_model_reply_with_context() {
    let advisor = advisor(StaticModels::replying("Scale web to 6 tasks."));
    register(&advisor, "111", "prod").await;
    advisor.service_recommendation("111", "prod", "web").await.unwrap();

    let request = ChatRequest {
        message: "Which service?".into(),
        context: Some(ChatContext {
            service_name: Some("web".into()),
            cluster_name: Some("prod".into()),
            priority: Some("high".into()),
            ..Default::default()
        }),
        reset_chat: false,
    };
    let reply = advisor.chat("111", request).await.unwrap();
    assert_eq!(reply.response, "Scale web to 6 tasks.");

    let history = advisor.chat_sessions().history("111");
    assert_eq!(history.len(), 4);
    assert!(history[0].content.contains("IMPORTANT CONTEXT"));
    assert!(history[0].content.contains("Current Metrics: CPU: Average"));
    assert_eq!(history[3].content, "Scale web to 6 tasks.");
}

#[tokio::test]
async fn test_chat_model_failure_becomes_reply() {
    let advisor = advisor(StaticModels::failing("ThrottlingException"));
    register(&advisor, "111", "prod").await;

    let reply = advisor
        .chat(
            "111",
            ChatRequest {
                message: "hello".into(),
                reset_chat: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(reply.response.starts_with("I'm having trouble processing your request right now."));
    assert!(reply.response.contains("ThrottlingException"));
}

#[tokio::test]
async fn test_chat_rejects_unknown_account_and_empty_message() {
    let advisor = advisor(StaticModels::none());
    let request = ChatRequest {
        message: "hello".into(),
        ..Default::default()
    };
    let err = advisor.chat("999", request).await.unwrap_err();
    assert!(matches!(err, AdvisorError::NotFound(_)));

    register(&advisor, "111", "prod").await;
    let err = advisor.chat("111", ChatRequest::default()).await.unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_send_account_email() {
    let notifier = Arc::new(RecordingNotifier::default());
    let advisor = advisor(StaticModels::none()).with_notifier(notifier.clone());
    register(&advisor, "111", "prod").await;

    let err = advisor.send_account_email("111", "not-an-address").await.unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));

    let outcome = advisor
        .send_account_email("111", "me@example.com")
        .await
        .unwrap();
    assert_eq!(outcome.message, "Email sent successfully");
    assert_eq!(outcome.message_id, "msg-1");

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[0].to, vec!["me@example.com"]);
    assert!(sent[0].subject.starts_with("ECS Recommendations - prod"));
}

#[tokio::test]
async fn test_send_account_email_needs_notifier() {
    let advisor = advisor(StaticModels::none());
    register(&advisor, "111", "prod").await;
    let err = advisor
        .send_account_email("111", "me@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_recommendation_job_skips_failing_accounts() {
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors {
            failing: HashSet::from(["222".to_string()]),
        },
        StaticModels::none(),
        AdvisorSettings::default(),
    );
    register(&advisor, "111", "prod").await;
    register(&advisor, "222", "legacy").await;

    let outcome = advisor.run_recommendation_job(JobKind::Daily).await.unwrap();
    assert_eq!(outcome.message, "Daily cluster recommendations generated successfully");
    assert_eq!(outcome.accounts, 1);
    assert_eq!(outcome.services, 2);
    assert!(advisor.store().cluster_snapshot("111").await.unwrap().is_some());
}

#[tokio::test]
async fn test_daily_report_sends_high_priority_only() {
    let notifier = Arc::new(RecordingNotifier::default());
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors::default(),
        StaticModels::replying(HOT_SERVICE_REPLY),
        email_settings(),
    )
    .with_notifier(notifier.clone());
    register(&advisor, "111", "prod").await;
    register(&advisor, "222", "idle").await;
    advisor.cluster_recommendations("111", None).await.unwrap();

    let outcome = advisor.run_report_job(JobKind::Daily).await.unwrap();
    assert_eq!(outcome.message, "Daily high-priority reports sent successfully");
    assert_eq!(outcome.accounts, 1);
    assert_eq!(outcome.services, 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Daily High-Priority ECS Report - prod (1 services)");
    assert_eq!(sent[0].to, vec!["team@example.com"]);
}

#[tokio::test]
async fn test_weekly_report_sends_everything() {
    let notifier = Arc::new(RecordingNotifier::default());
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors::default(),
        StaticModels::replying(HOT_SERVICE_REPLY),
        email_settings(),
    )
    .with_notifier(notifier.clone());
    register(&advisor, "111", "prod").await;
    advisor.run_recommendation_job(JobKind::Weekly).await.unwrap();

    let outcome = advisor.run_report_job(JobKind::Weekly).await.unwrap();
    assert_eq!(outcome.services, 2);
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "Weekly ECS Comprehensive Report - prod (2 services)");
}

#[tokio::test]
async fn test_report_job_needs_email_setup() {
    let advisor = advisor(StaticModels::none()).with_notifier(Arc::new(RecordingNotifier::default()));
    let err = advisor.run_report_job(JobKind::Daily).await.unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));

    let mut settings = email_settings();
    settings.email.recipients.clear();
    let advisor = advisor_with(
        Arc::new(MemoryStore::default()),
        MockMonitors::default(),
        StaticModels::none(),
        settings,
    )
    .with_notifier(Arc::new(RecordingNotifier::default()));
    let err = advisor.run_report_job(JobKind::Weekly).await.unwrap_err();
    assert!(matches!(err, AdvisorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_all_recommendations_grouped() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;
    advisor.run_recommendation_job(JobKind::Daily).await.unwrap();

    let grouped = advisor.all_recommendations().await.unwrap();
    assert_eq!(grouped.priorities(), vec![Priority::High, Priority::Medium]);
    let hot = grouped.get(Priority::High, Health::Critical);
    assert_eq!(hot.len(), 1);
    assert_eq!(hot[0].account_name, "prod");
    assert_eq!(grouped.get(Priority::Medium, Health::Warning)[0].record.service, "worker");
}

#[tokio::test]
async fn test_analytics_rollup() {
    let advisor = advisor(StaticModels::replying(HOT_SERVICE_REPLY));
    register(&advisor, "111", "prod").await;
    register(&advisor, "222", "idle").await;
    advisor.refresh("111").await.unwrap();
    advisor.cluster_recommendations("111", Some("prod")).await.unwrap();

    let analytics = advisor.analytics().await.unwrap();
    assert_eq!(analytics.total_accounts, 2);
    assert_eq!(analytics.active_accounts, 1);
    assert_eq!(analytics.total_clusters, 3);
    assert_eq!(analytics.total_services, 2);
    assert_eq!(analytics.total_tasks, 4);
    assert_eq!(analytics.recommendations_summary.total, 2);
    assert_eq!(analytics.recent_recommendations[0].record.priority, Priority::High);

    let idle = analytics.accounts.iter().find(|a| a.account_id == "222").unwrap();
    assert_eq!(idle.status, "inactive");
    assert_eq!(idle.tasks, 0);
}
