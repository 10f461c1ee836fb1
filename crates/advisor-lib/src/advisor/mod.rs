//! Multi-account orchestration
//!
//! [`FleetAdvisor`] ties the pieces together: it looks accounts up in the
//! knowledge store, builds a fresh monitor per call, runs the recommender,
//! stores what it produced and keeps the chat sessions in step.
//!
//! Writes to the store are best effort. A failed write is logged, counted and
//! otherwise ignored so the caller still gets the freshly computed answer;
//! a failed snapshot read is treated as a cache miss.
//!
//! Store, model and email outcomes are fed into the [`HealthRegistry`] so a
//! failing dependency shows up as degraded on `/healthz`.

mod views;

#[cfg(test)]
mod tests;

pub use views::*;

use crate::chat::{self, ChatReply, ChatRequest, ChatSessions, ChatSettings};
use crate::error::{AdvisorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{
    Account, AccountRecommendation, ClusterSnapshot, Health, Priority, ServiceMetrics,
    ServiceRecommendation, ServiceSnapshot,
};
use crate::monitor::{FleetMonitor, MonitorFactory};
use crate::notify::{report, EmailSettings, Notifier};
use crate::observability::{AdvisorMetrics, RecommendationSource, StructuredLogger};
use crate::recommender::context::{metrics_context, metrics_parts};
use crate::recommender::{Generated, ModelProvider, ModelSettings, Recommender};
use crate::store::{KnowledgeStore, KnowledgeSummary, RecommendationFilter};
use crate::summarize::Thresholds;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Settings the advisor passes down to recommenders, chat and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorSettings {
    pub instance_name: String,
    pub thresholds: Thresholds,
    pub model: ModelSettings,
    pub chat: ChatSettings,
    pub email: EmailSettings,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            instance_name: "fleet-advisor".to_string(),
            thresholds: Thresholds::default(),
            model: ModelSettings::default(),
            chat: ChatSettings::default(),
            email: EmailSettings::default(),
        }
    }
}

/// Outcome of analyzing one service
struct ServiceOutcome {
    recommendation: ServiceRecommendation,
    source: RecommendationSource,
    metrics: ServiceMetrics,
}

pub struct FleetAdvisor {
    store: Arc<dyn KnowledgeStore>,
    monitors: Arc<dyn MonitorFactory>,
    models: Arc<dyn ModelProvider>,
    notifier: Option<Arc<dyn Notifier>>,
    chat: ChatSessions,
    settings: AdvisorSettings,
    metrics: AdvisorMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl FleetAdvisor {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        monitors: Arc<dyn MonitorFactory>,
        models: Arc<dyn ModelProvider>,
        settings: AdvisorSettings,
    ) -> Self {
        Self {
            store,
            monitors,
            models,
            notifier: None,
            chat: ChatSessions::new(&settings.chat),
            logger: StructuredLogger::new(settings.instance_name.clone()),
            metrics: AdvisorMetrics::new(),
            health: HealthRegistry::new(),
            settings,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Report runtime failures into the service's health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn chat_sessions(&self) -> &ChatSessions {
        &self.chat
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    async fn account(&self, account_id: &str) -> Result<Account> {
        let found = self.store.account(account_id).await;
        self.observe(components::STORE, &found).await;
        found?.ok_or_else(|| AdvisorError::NotFound(format!("account {}", account_id)))
    }

    async fn observe<T>(&self, component: &str, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.health.record_success(component).await,
            Err(e) => self.health.record_failure(component, e.to_string()).await,
        }
    }

    /// Fresh monitor for a stored account
    async fn monitor(&self, account_id: &str) -> Result<(Account, FleetMonitor)> {
        let account = self.account(account_id).await?;
        let monitor = self.monitors.monitor(&account).await?;
        Ok((account, monitor))
    }

    async fn recommender(&self, account_id: &str) -> Recommender {
        Recommender::new(
            self.models.model(account_id).await,
            self.settings.model.clone(),
            self.settings.thresholds.clone(),
        )
    }

    /// Run a store write, logging and counting a failure instead of returning it
    async fn persist<F>(&self, account_id: &str, record: &str, write: F)
    where
        F: Future<Output = Result<()>>,
    {
        let written = write.await;
        self.observe(components::STORE, &written).await;
        if let Err(e) = written {
            self.metrics.inc_store_write_failures();
            self.logger
                .log_store_write_failed(account_id, record, &e.to_string());
        }
    }

    async fn track<T>(
        &self,
        account_id: &str,
        target: &str,
        health: Health,
        scope: &str,
        generated: &Generated<T>,
    ) {
        if generated.model_failed {
            let reason = generated.fallback_reason.as_deref().unwrap_or("model call failed");
            self.health.record_failure(components::RECOMMENDER, reason).await;
        } else if generated.source == RecommendationSource::Model {
            self.health.record_success(components::RECOMMENDER).await;
        }
        self.metrics.inc_recommendation(generated.source, scope);
        self.logger
            .log_recommendation(account_id, target, health.as_str(), generated.source);
        if let Some(reason) = &generated.fallback_reason {
            self.logger.log_fallback(target, reason);
        }
    }

    /// Store a new account, or replace the one with the same id
    pub async fn register_account(&self, mut account: Account) -> Result<()> {
        if account.account_id.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("account_id is required".to_string()));
        }
        if account.region.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("region is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        account.created_at.get_or_insert_with(|| now.clone());
        account.last_updated = Some(now);
        self.store.put_account(&account).await?;

        self.logger.log_account_registered(
            &account.account_id,
            &account.region,
            account.credential_source().kind(),
        );
        match self.store.accounts().await {
            Ok(accounts) => self.metrics.set_accounts_monitored(accounts.len() as i64),
            Err(e) => warn!(error = %e, "Could not count monitored accounts"),
        }
        Ok(())
    }

    /// Status of every stored account, with search, status filter and paging
    pub async fn account_statuses(&self, query: &AccountQuery) -> Result<AccountListing> {
        if query.page == 0 || query.limit == 0 {
            return Err(AdvisorError::InvalidInput(
                "page and limit must be at least 1".to_string(),
            ));
        }

        let accounts = self.store.accounts().await?;
        self.metrics.set_accounts_monitored(accounts.len() as i64);
        let mut statuses = join_all(accounts.iter().map(|account| self.account_status(account))).await;

        if !query.search.is_empty() {
            let needle = query.search.to_lowercase();
            statuses.retain(|s| {
                s.account_name.to_lowercase().contains(&needle)
                    || s.account_id.to_lowercase().contains(&needle)
            });
        }
        if !query.status_filter.is_empty() {
            statuses.retain(|s| s.status == query.status_filter);
        }

        if query.is_plain() {
            return Ok(AccountListing::All(statuses));
        }

        let total_count = statuses.len();
        let start = (query.page - 1).saturating_mul(query.limit);
        let end = start.saturating_add(query.limit);
        let accounts = statuses
            .into_iter()
            .skip(start)
            .take(query.limit)
            .collect();

        Ok(AccountListing::Page(AccountPage {
            accounts,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total_count,
                total_pages: total_count.div_ceil(query.limit),
                has_next: end < total_count,
                has_prev: query.page > 1,
            },
            filters: AccountFilters {
                search: query.search.clone(),
                status_filter: query.status_filter.clone(),
            },
        }))
    }

    async fn account_status(&self, account: &Account) -> AccountStatus {
        match self.live_status(account).await {
            Ok(status) => status,
            Err(e) => {
                warn!(account_id = %account.account_id, error = %e, "Account unreachable, reporting inactive");
                AccountStatus {
                    account_id: account.account_id.clone(),
                    account_name: account.account_name.clone(),
                    status: "inactive".to_string(),
                    clusters: Vec::new(),
                    cluster_details: ClusterSnapshot::new(),
                    last_updated: "error".to_string(),
                }
            }
        }
    }

    async fn live_status(&self, account: &Account) -> Result<AccountStatus> {
        let monitor = self.monitors.monitor(account).await?;
        monitor.discover_clusters().await?;
        let status = monitor.status().await;
        let cluster_details = self.snapshot(&account.account_id, &monitor).await?;

        Ok(AccountStatus {
            account_id: account.account_id.clone(),
            account_name: account.account_name.clone(),
            status: status.status,
            clusters: status.clusters,
            cluster_details,
            last_updated: status.last_updated,
        })
    }

    /// Cached snapshot, or a fresh one that is then cached
    async fn snapshot(&self, account_id: &str, monitor: &FleetMonitor) -> Result<ClusterSnapshot> {
        match self.store.cluster_snapshot(account_id).await {
            Ok(Some(snapshot)) => return Ok(snapshot),
            Ok(None) => {}
            Err(e) => warn!(account_id = %account_id, error = %e, "Snapshot read failed, rebuilding"),
        }

        if monitor.clusters().await.is_empty() {
            monitor.discover_clusters().await?;
        }
        let snapshot = monitor.cluster_details().await;
        self.persist(account_id, "cluster_data", self.store.put_cluster_snapshot(account_id, &snapshot))
            .await;
        Ok(snapshot)
    }

    /// Account-wide recommendation from fresh metrics and logs; reseeds the chat
    pub async fn account_recommendation(&self, account_id: &str) -> Result<AccountRecommendation> {
        let (_, monitor) = self.monitor(account_id).await?;
        let recommendation = self.generate_account_recommendation(account_id, &monitor).await?;

        let json = serde_json::to_string_pretty(&recommendation)?;
        self.chat.seed(
            account_id,
            chat::account_system(account_id),
            chat::account_intro(&json),
        );
        Ok(recommendation)
    }

    async fn generate_account_recommendation(
        &self,
        account_id: &str,
        monitor: &FleetMonitor,
    ) -> Result<AccountRecommendation> {
        monitor.discover_clusters().await?;
        let metrics = monitor.cluster_metrics().await;
        let logs = monitor.recent_logs().await;
        debug!(
            account_id = %account_id,
            clusters = metrics.len(),
            log_lines = logs.values().map(Vec::len).sum::<usize>(),
            "Collected fleet data"
        );

        let generated = self
            .recommender(account_id)
            .await
            .account_recommendation(&metrics, &logs)
            .await;
        let health = generated.value.overall_health;
        self.track(account_id, account_id, health, "account", &generated).await;
        self.persist(
            account_id,
            "recommendations",
            self.store.put_account_recommendation(account_id, &generated.value),
        )
        .await;
        Ok(generated.value)
    }

    /// Recommendation for one service; reseeds the chat with its metrics
    pub async fn service_recommendation(
        &self,
        account_id: &str,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceRecommendation> {
        let (_, monitor) = self.monitor(account_id).await?;
        let recommender = self.recommender(account_id).await;
        let outcome = self
            .analyze_service(account_id, &recommender, &monitor, cluster, service)
            .await?;

        let json = serde_json::to_string_pretty(&outcome.recommendation)?;
        self.chat.seed(
            account_id,
            chat::service_system(account_id, cluster, service),
            chat::service_intro(cluster, service, &metrics_context(&outcome.metrics), &json),
        );
        Ok(outcome.recommendation)
    }

    async fn analyze_service(
        &self,
        account_id: &str,
        recommender: &Recommender,
        monitor: &FleetMonitor,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceOutcome> {
        let metrics = monitor.service_metrics(cluster, service).await?;
        let logs = monitor.service_logs(cluster, service).await;
        let generated = recommender
            .service_recommendation(cluster, service, &metrics, &logs)
            .await;

        let target = format!("{}/{}", cluster, service);
        let health = generated.value.service_health;
        self.track(account_id, &target, health, "service", &generated).await;
        self.persist(
            account_id,
            "service_recommendation",
            self.store
                .put_service_recommendation(account_id, cluster, service, &generated.value),
        )
        .await;

        Ok(ServiceOutcome {
            recommendation: generated.value,
            source: generated.source,
            metrics,
        })
    }

    /// Analyze every service of a cluster concurrently; failures are left out
    async fn analyze_cluster(
        &self,
        account_id: &str,
        recommender: &Recommender,
        monitor: &FleetMonitor,
        cluster: &str,
        services: &[ServiceSnapshot],
    ) -> Vec<ServiceAnalysis> {
        let results = join_all(services.iter().map(|snapshot| async move {
            match self
                .analyze_service(account_id, recommender, monitor, cluster, &snapshot.name)
                .await
            {
                Ok(outcome) => Some(ServiceAnalysis::new(
                    cluster,
                    snapshot,
                    outcome.recommendation,
                    outcome.source,
                )),
                Err(e) => {
                    self.metrics.inc_service_analysis_failures();
                    error!(
                        account_id = %account_id,
                        cluster = %cluster,
                        service = %snapshot.name,
                        error = %e,
                        "Service analysis failed"
                    );
                    None
                }
            }
        }))
        .await;

        let mut analyses: Vec<ServiceAnalysis> = results.into_iter().flatten().collect();
        sort_analyses(&mut analyses);
        analyses
    }

    /// Rediscover clusters and replace the cached snapshot
    pub async fn refresh(&self, account_id: &str) -> Result<RefreshOutcome> {
        let start = Instant::now();
        let (_, monitor) = self.monitor(account_id).await?;
        monitor.discover_clusters().await?;
        let cluster_details = monitor.cluster_details().await;
        self.persist(
            account_id,
            "cluster_data",
            self.store.put_cluster_snapshot(account_id, &cluster_details),
        )
        .await;

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.observe_refresh_latency(elapsed);
        self.logger.log_fleet_refreshed(
            account_id,
            cluster_details.len(),
            cluster_details.values().map(Vec::len).sum(),
            elapsed,
        );

        Ok(RefreshOutcome {
            status: "success".to_string(),
            message: "Account data refreshed successfully".to_string(),
            cluster_details,
            refreshed_at: Utc::now().to_rfc3339(),
        })
    }

    /// One service out of the cached snapshot
    pub async fn service_details(
        &self,
        account_id: &str,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceDetails> {
        let snapshot = self.store.cluster_snapshot(account_id).await?;
        let services = snapshot
            .as_ref()
            .and_then(|s| s.get(cluster))
            .ok_or_else(|| AdvisorError::NotFound(format!("cluster {}", cluster)))?;
        let info = services
            .iter()
            .find(|s| s.name == service)
            .ok_or_else(|| AdvisorError::NotFound(format!("service {}", service)))?;

        Ok(ServiceDetails {
            service_name: info.name.clone(),
            cluster_name: cluster.to_string(),
            status: info.status.clone(),
            running_count: info.running_count,
            desired_count: info.desired_count,
            cpu_avg: info.cpu_avg,
            cpu_max: info.cpu_max,
            memory_avg: info.memory_avg,
            memory_max: info.memory_max,
            target_groups: info.target_groups.clone(),
            last_updated: Utc::now().to_rfc3339(),
        })
    }

    /// Per-service recommendations for every cluster, or for one cluster
    pub async fn cluster_recommendations(
        &self,
        account_id: &str,
        cluster: Option<&str>,
    ) -> Result<ClusterRecommendations> {
        let (_, monitor) = self.monitor(account_id).await?;
        let snapshot = self.snapshot(account_id, &monitor).await?;
        let recommender = self.recommender(account_id).await;
        let timestamp = Utc::now().to_rfc3339();

        if let Some(name) = cluster {
            let services = snapshot.get(name).ok_or_else(|| {
                let available: Vec<&str> = snapshot.keys().map(String::as_str).collect();
                AdvisorError::NotFound(format!(
                    "cluster '{}' (available clusters: {})",
                    name,
                    available.join(", ")
                ))
            })?;
            let services = self
                .analyze_cluster(account_id, &recommender, &monitor, name, services)
                .await;

            return Ok(ClusterRecommendations::Cluster(SingleClusterRecommendations {
                account_id: account_id.to_string(),
                cluster_name: name.to_string(),
                timestamp,
                summary: ClusterRecommendationSummary {
                    total_services: services.len(),
                    distributions: Distributions::from_analyses(&services),
                },
                services,
            }));
        }

        let per_cluster = join_all(snapshot.iter().map(|(name, services)| {
            self.analyze_cluster(account_id, &recommender, &monitor, name, services)
        }))
        .await;
        let clusters: BTreeMap<String, Vec<ServiceAnalysis>> =
            snapshot.keys().cloned().zip(per_cluster).collect();

        Ok(ClusterRecommendations::Fleet(FleetRecommendations {
            account_id: account_id.to_string(),
            timestamp,
            summary: FleetRecommendationSummary {
                total_clusters: clusters.len(),
                total_services: clusters.values().map(Vec::len).sum(),
                health_summary: Distributions::from_analyses(clusters.values().flatten()),
            },
            clusters,
        }))
    }

    /// Stored service recommendations matching the filter
    pub async fn filtered_service_recommendations(
        &self,
        account_id: &str,
        filter: &RecommendationFilter,
    ) -> Result<FilteredRecommendations> {
        let recommendations = self.store.service_recommendations(account_id, filter).await?;
        Ok(FilteredRecommendations {
            account_id: account_id.to_string(),
            filter: filter.describe(),
            count: recommendations.len(),
            recommendations,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    pub async fn knowledge_summary(&self, account_id: &str) -> Result<KnowledgeSummary> {
        self.store.knowledge_summary(account_id).await
    }

    /// One chat turn. Model failures become the reply text, not an error.
    pub async fn chat(&self, account_id: &str, request: ChatRequest) -> Result<ChatReply> {
        if request.message.trim().is_empty() {
            return Err(AdvisorError::InvalidInput("message must not be empty".to_string()));
        }
        self.account(account_id).await?;

        if request.reset_chat {
            self.chat.reset(account_id);
        }
        if let Some(context) = request.context.as_ref().filter(|c| !c.is_empty()) {
            if self.chat.is_seeded(account_id) {
                let metrics_line = match context.service() {
                    Some((cluster, service)) => self.context_metrics(account_id, cluster, service).await,
                    None => None,
                };
                self.chat
                    .apply_context(account_id, context, metrics_line.as_deref());
            }
        }
        self.chat.push_user(account_id, &request.message);
        self.metrics.inc_chat_turns();

        let response = match self.models.model(account_id).await {
            None => chat::UNAVAILABLE_REPLY.to_string(),
            Some(model) => {
                let converse = self.chat.request_for(account_id, &self.settings.model.chat);
                let answered = model.converse(converse).await;
                self.observe(components::RECOMMENDER, &answered).await;
                match answered {
                    Ok(reply) => {
                        self.chat.record_reply(account_id, &reply);
                        reply
                    }
                    Err(e) => {
                        warn!(account_id = %account_id, error = %e, "Chat turn failed");
                        chat::trouble_reply(&e.to_string())
                    }
                }
            }
        };

        Ok(ChatReply {
            response,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    async fn context_metrics(&self, account_id: &str, cluster: &str, service: &str) -> Option<String> {
        let result: Result<ServiceMetrics> = async {
            let (_, monitor) = self.monitor(account_id).await?;
            monitor.service_metrics(cluster, service).await
        }
        .await;

        match result {
            Ok(metrics) => {
                let parts = metrics_parts(&metrics);
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            Err(e) => {
                warn!(account_id = %account_id, cluster = %cluster, service = %service, error = %e, "No metrics for chat context");
                None
            }
        }
    }

    /// Email the stored account recommendation, generating one when none is stored
    pub async fn send_account_email(&self, account_id: &str, to: &str) -> Result<EmailOutcome> {
        let to = to.trim();
        if !to.contains('@') {
            return Err(AdvisorError::InvalidInput(format!("invalid email address '{}'", to)));
        }
        let notifier = self.notifier.as_ref().ok_or_else(|| {
            AdvisorError::InvalidInput("email notifications are not configured".to_string())
        })?;
        let account = self.account(account_id).await?;

        let stored = match self.store.account_recommendation(account_id).await {
            Ok(stored) => stored.map(|s| s.recommendation),
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Stored recommendation unreadable, regenerating");
                None
            }
        };
        let recommendation = match stored {
            Some(recommendation) => recommendation,
            None => {
                let monitor = self.monitors.monitor(&account).await?;
                self.generate_account_recommendation(account_id, &monitor).await?
            }
        };

        let message = report::account_report(&account, &recommendation, to, &self.settings.email);
        let subject = message.subject.clone();
        let recipients = message.to.len() + message.cc.len();
        let sent = notifier.send(message).await;
        self.observe(components::NOTIFIER, &sent).await;
        let message_id = sent?;
        self.metrics.inc_reports_sent();
        self.logger.log_report_sent(account_id, &subject, recipients);

        Ok(EmailOutcome {
            status: "success".to_string(),
            message: "Email sent successfully".to_string(),
            message_id,
        })
    }

    /// Refresh every account and store a recommendation per service
    pub async fn run_recommendation_job(&self, kind: JobKind) -> Result<JobOutcome> {
        info!(job = kind.label(), "Starting cluster recommendations");
        let accounts = self.store.accounts().await?;

        let mut processed = 0;
        let mut services = 0;
        for account in &accounts {
            match self.recommend_account_services(account).await {
                Ok(count) => {
                    processed += 1;
                    services += count;
                    info!(account_id = %account.account_id, services = count, "Generated service recommendations");
                }
                Err(e) => {
                    error!(account_id = %account.account_id, error = %e, "Recommendation job failed for account");
                }
            }
        }

        Ok(JobOutcome {
            status: "success".to_string(),
            message: format!("{} cluster recommendations generated successfully", kind.label()),
            accounts: processed,
            services,
        })
    }

    async fn recommend_account_services(&self, account: &Account) -> Result<usize> {
        let account_id = account.account_id.as_str();
        let monitor = self.monitors.monitor(account).await?;
        monitor.discover_clusters().await?;
        let snapshot = monitor.cluster_details().await;
        self.persist(account_id, "cluster_data", self.store.put_cluster_snapshot(account_id, &snapshot))
            .await;

        let recommender = self.recommender(account_id).await;
        let per_cluster = join_all(snapshot.iter().map(|(cluster, services)| {
            self.analyze_cluster(account_id, &recommender, &monitor, cluster, services)
        }))
        .await;
        Ok(per_cluster.iter().map(Vec::len).sum())
    }

    /// Email stored recommendations to the configured recipients.
    ///
    /// The daily report carries high priority services only, the weekly one
    /// carries everything. Accounts without matching records are skipped.
    pub async fn run_report_job(&self, kind: JobKind) -> Result<JobOutcome> {
        let notifier = self
            .notifier
            .as_ref()
            .filter(|_| self.settings.email.enabled())
            .ok_or_else(|| {
                AdvisorError::InvalidInput("email notifications are not configured".to_string())
            })?;
        if self.settings.email.recipients.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "no report recipients configured".to_string(),
            ));
        }

        let filter = match kind {
            JobKind::Daily => RecommendationFilter {
                priority: Some(Priority::High),
                ..Default::default()
            },
            JobKind::Weekly => RecommendationFilter::default(),
        };

        let mut sent = 0;
        let mut services = 0;
        for account in self.store.accounts().await? {
            let account_id = account.account_id.as_str();
            let records = match self.store.service_recommendations(account_id, &filter).await {
                Ok(records) => records,
                Err(e) => {
                    error!(account_id = %account_id, error = %e, "Could not read recommendations for report");
                    continue;
                }
            };
            if records.is_empty() {
                info!(account_id = %account_id, job = kind.label(), "Nothing to report");
                continue;
            }

            let message = match kind {
                JobKind::Daily => report::high_priority_report(&account, &records, &self.settings.email),
                JobKind::Weekly => report::weekly_report(&account, &records, &self.settings.email),
            };
            let subject = message.subject.clone();
            let recipients = message.to.len() + message.cc.len();
            let delivered = notifier.send(message).await;
            self.observe(components::NOTIFIER, &delivered).await;
            match delivered {
                Ok(_) => {
                    sent += 1;
                    services += records.len();
                    self.metrics.inc_reports_sent();
                    self.logger.log_report_sent(account_id, &subject, recipients);
                }
                Err(e) => error!(account_id = %account_id, error = %e, "Report email failed"),
            }
        }

        let message = match kind {
            JobKind::Daily => "Daily high-priority reports sent successfully",
            JobKind::Weekly => "Weekly comprehensive reports sent successfully",
        };
        Ok(JobOutcome {
            status: "success".to_string(),
            message: message.to_string(),
            accounts: sent,
            services,
        })
    }

    async fn tagged_recommendations(&self, account: &Account) -> Vec<AccountServiceRecommendation> {
        match self
            .store
            .service_recommendations(&account.account_id, &RecommendationFilter::default())
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|record| AccountServiceRecommendation {
                    record,
                    account_name: account.account_name.clone(),
                })
                .collect(),
            Err(e) => {
                warn!(account_id = %account.account_id, error = %e, "Skipping account recommendations");
                Vec::new()
            }
        }
    }

    /// Stored recommendations of every account, grouped by priority then health
    pub async fn all_recommendations(&self) -> Result<GroupedRecommendations> {
        let mut all = Vec::new();
        for account in self.store.accounts().await? {
            all.extend(self.tagged_recommendations(&account).await);
        }
        Ok(GroupedRecommendations::new(all))
    }

    /// Fleet rollup from cached snapshots and stored recommendations only
    pub async fn analytics(&self) -> Result<Analytics> {
        let accounts = self.store.accounts().await?;
        let mut rows = Vec::with_capacity(accounts.len());
        let mut all = Vec::new();

        for account in &accounts {
            let snapshot = match self.store.cluster_snapshot(&account.account_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(account_id = %account.account_id, error = %e, "Snapshot read failed");
                    None
                }
            };
            let (clusters, services, tasks) = snapshot.as_ref().map_or((0, 0, 0), |s| {
                (
                    s.len(),
                    s.values().map(Vec::len).sum(),
                    s.values()
                        .flatten()
                        .map(|service| i64::from(service.running_count))
                        .sum(),
                )
            });

            rows.push(AccountAnalytics {
                account_id: account.account_id.clone(),
                account_name: account.account_name.clone(),
                region: account.region.clone(),
                status: if snapshot.as_ref().is_some_and(|s| !s.is_empty()) {
                    "active"
                } else {
                    "inactive"
                }
                .to_string(),
                clusters,
                services,
                tasks,
                last_updated: account.last_updated.clone().unwrap_or_else(|| "Never".to_string()),
            });
            all.extend(self.tagged_recommendations(account).await);
        }

        let summary = RecommendationsSummary::from(&record_distributions(&all));
        all.sort_by(|a, b| {
            a.record
                .priority
                .rank()
                .cmp(&b.record.priority.rank())
                .then_with(|| b.record.timestamp.cmp(&a.record.timestamp))
        });
        all.truncate(50);

        Ok(Analytics {
            total_accounts: accounts.len(),
            active_accounts: rows.iter().filter(|r| r.status == "active").count(),
            total_clusters: rows.iter().map(|r| r.clusters).sum(),
            total_services: rows.iter().map(|r| r.services).sum(),
            total_tasks: rows.iter().map(|r| r.tasks).sum(),
            accounts: rows,
            recommendations_summary: summary,
            recent_recommendations: all,
        })
    }
}
