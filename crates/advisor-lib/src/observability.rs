//! Observability infrastructure for the fleet advisor
//!
//! Provides:
//! - Prometheus metrics (refresh and model latency, recommendation sources, store failures)
//! - Structured JSON logging of domain events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cloud and model round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AdvisorMetricsInner> = OnceLock::new();

struct AdvisorMetricsInner {
    refresh_latency_seconds: Histogram,
    model_latency_seconds: Histogram,
    recommendations: IntCounterVec,
    service_analysis_failures: IntCounter,
    store_write_failures: IntCounter,
    accounts_monitored: IntGauge,
    chat_turns: IntCounter,
    reports_sent: IntCounter,
}

impl AdvisorMetricsInner {
    fn new() -> Self {
        Self {
            refresh_latency_seconds: register_histogram!(
                "fleet_advisor_refresh_latency_seconds",
                "Time spent walking an account's clusters and services",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register refresh_latency_seconds"),

            model_latency_seconds: register_histogram!(
                "fleet_advisor_model_latency_seconds",
                "Time spent waiting for the language model",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_latency_seconds"),

            recommendations: register_int_counter_vec!(
                "fleet_advisor_recommendations_total",
                "Recommendations produced, by source and scope",
                &["source", "scope"]
            )
            .expect("Failed to register recommendations"),

            service_analysis_failures: register_int_counter!(
                "fleet_advisor_service_analysis_failures_total",
                "Services whose analysis failed during a cluster or job run"
            )
            .expect("Failed to register service_analysis_failures"),

            store_write_failures: register_int_counter!(
                "fleet_advisor_store_write_failures_total",
                "Knowledge store writes that failed and were skipped"
            )
            .expect("Failed to register store_write_failures"),

            accounts_monitored: register_int_gauge!(
                "fleet_advisor_accounts_monitored",
                "Number of registered accounts"
            )
            .expect("Failed to register accounts_monitored"),

            chat_turns: register_int_counter!(
                "fleet_advisor_chat_turns_total",
                "Chat messages answered"
            )
            .expect("Failed to register chat_turns"),

            reports_sent: register_int_counter!(
                "fleet_advisor_reports_sent_total",
                "Recommendation emails sent"
            )
            .expect("Failed to register reports_sent"),
        }
    }
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Model,
    Fallback,
}

impl RecommendationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

/// Advisor metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct AdvisorMetrics {
    _private: (),
}

impl Default for AdvisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdvisorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdvisorMetricsInner {
        GLOBAL_METRICS.get_or_init(AdvisorMetricsInner::new)
    }

    pub fn observe_refresh_latency(&self, duration_secs: f64) {
        self.inner().refresh_latency_seconds.observe(duration_secs);
    }

    pub fn observe_model_latency(&self, duration_secs: f64) {
        self.inner().model_latency_seconds.observe(duration_secs);
    }

    /// Count a recommendation; `scope` is `account` or `service`
    pub fn inc_recommendation(&self, source: RecommendationSource, scope: &str) {
        self.inner()
            .recommendations
            .with_label_values(&[source.as_str(), scope])
            .inc();
    }

    pub fn inc_service_analysis_failures(&self) {
        self.inner().service_analysis_failures.inc();
    }

    pub fn inc_store_write_failures(&self) {
        self.inner().store_write_failures.inc();
    }

    pub fn set_accounts_monitored(&self, count: i64) {
        self.inner().accounts_monitored.set(count);
    }

    pub fn inc_chat_turns(&self) {
        self.inner().chat_turns.inc();
    }

    pub fn inc_reports_sent(&self) {
        self.inner().reports_sent.inc();
    }
}

/// Structured logger for advisor events
///
/// Emits one JSON line per significant domain event, tagged with the
/// instance name.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_account_registered(&self, account_id: &str, region: &str, credential_kind: &str) {
        info!(
            event = "account_registered",
            instance = %self.instance,
            account_id = %account_id,
            region = %region,
            credentials = %credential_kind,
            "Account registered"
        );
    }

    pub fn log_fleet_refreshed(&self, account_id: &str, clusters: usize, services: usize, duration_secs: f64) {
        info!(
            event = "fleet_refreshed",
            instance = %self.instance,
            account_id = %account_id,
            clusters = clusters,
            services = services,
            duration_secs = duration_secs,
            "Fleet data refreshed"
        );
    }

    /// Log a generated recommendation; `target` is the account or `cluster/service`
    pub fn log_recommendation(
        &self,
        account_id: &str,
        target: &str,
        health: &str,
        source: RecommendationSource,
    ) {
        info!(
            event = "recommendation_generated",
            instance = %self.instance,
            account_id = %account_id,
            target = %target,
            health = %health,
            source = source.as_str(),
            "Recommendation generated"
        );
    }

    pub fn log_fallback(&self, target: &str, reason: &str) {
        warn!(
            event = "fallback_used",
            instance = %self.instance,
            target = %target,
            reason = %reason,
            "Using rule-based recommendations"
        );
    }

    pub fn log_store_write_failed(&self, account_id: &str, record: &str, error: &str) {
        warn!(
            event = "store_write_failed",
            instance = %self.instance,
            account_id = %account_id,
            record = %record,
            error = %error,
            "Knowledge store write failed, continuing without it"
        );
    }

    pub fn log_report_sent(&self, account_id: &str, subject: &str, recipients: usize) {
        info!(
            event = "report_sent",
            instance = %self.instance,
            account_id = %account_id,
            subject = %subject,
            recipients = recipients,
            "Recommendation email sent"
        );
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            port = port,
            "Fleet advisor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Fleet advisor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisor_metrics_creation() {
        // Handles share one global registration, so repeated creation is fine
        let metrics = AdvisorMetrics::new();
        let again = AdvisorMetrics::new();

        metrics.observe_refresh_latency(1.5);
        metrics.observe_model_latency(12.0);
        metrics.inc_recommendation(RecommendationSource::Model, "account");
        again.inc_recommendation(RecommendationSource::Fallback, "service");
        metrics.inc_store_write_failures();
        metrics.set_accounts_monitored(3);
        metrics.inc_chat_turns();
        metrics.inc_reports_sent();
    }

    #[test]
    fn test_metrics_are_gathered() {
        let metrics = AdvisorMetrics::new();
        metrics.inc_recommendation(RecommendationSource::Fallback, "account");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"fleet_advisor_recommendations_total".to_string()));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
        logger.log_fallback("prod/web", "model unavailable");
    }
}
