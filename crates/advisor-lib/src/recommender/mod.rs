//! Recommendation generation
//!
//! Turns fleet metrics and logs into recommendations. The model is asked
//! first; when it is missing, fails, or answers with something that does not
//! parse, the rule-based [`fallback`] answers instead. Callers always get a
//! recommendation, tagged with where it came from.

pub mod context;
pub mod fallback;
mod model;
pub mod parse;
pub mod prompt;

pub use model::{
    BedrockModel, BedrockModelProvider, ConverseRequest, InferenceSettings, LanguageModel,
    ModelProvider, ModelSettings,
};

use crate::error::{AdvisorError, Result};
use crate::models::{AccountRecommendation, ServiceMetrics, ServiceRecommendation, ServiceSample};
use crate::observability::{AdvisorMetrics, RecommendationSource};
use crate::summarize::{analyze_logs, error_log_lines, summarize_metrics, ClusterSummary, LogAnalysis, Thresholds};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything the account-wide prompt is rendered from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub timestamp: String,
    pub metrics_summary: BTreeMap<String, ClusterSummary>,
    pub log_analysis: BTreeMap<String, LogAnalysis>,
    pub clusters: Vec<String>,
}

impl AnalysisPayload {
    pub fn new(
        metrics: &BTreeMap<String, Vec<ServiceSample>>,
        logs: &BTreeMap<String, Vec<String>>,
        thresholds: &Thresholds,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            metrics_summary: summarize_metrics(metrics, thresholds),
            log_analysis: analyze_logs(logs),
            clusters: metrics.keys().cloned().collect(),
        }
    }
}

/// A recommendation and its source
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub source: RecommendationSource,
    /// Why the fallback answered, if it did
    pub fallback_reason: Option<String>,
    /// The model was asked and the call or its reply failed
    pub model_failed: bool,
}

impl<T> Generated<T> {
    fn model(value: T) -> Self {
        Self {
            value,
            source: RecommendationSource::Model,
            fallback_reason: None,
            model_failed: false,
        }
    }

    fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            source: RecommendationSource::Fallback,
            fallback_reason: Some(reason.into()),
            model_failed: false,
        }
    }

    fn failed(value: T, error: &AdvisorError) -> Self {
        Self {
            model_failed: true,
            ..Self::fallback(value, error.to_string())
        }
    }
}

pub struct Recommender {
    model: Option<Arc<dyn LanguageModel>>,
    settings: ModelSettings,
    thresholds: Thresholds,
    metrics: AdvisorMetrics,
}

impl Recommender {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        settings: ModelSettings,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            model,
            settings,
            thresholds,
            metrics: AdvisorMetrics::new(),
        }
    }

    pub fn model(&self) -> Option<&Arc<dyn LanguageModel>> {
        self.model.as_ref()
    }

    /// Account-wide recommendation from every cluster's metrics and logs
    pub async fn account_recommendation(
        &self,
        metrics: &BTreeMap<String, Vec<ServiceSample>>,
        logs: &BTreeMap<String, Vec<String>>,
    ) -> Generated<AccountRecommendation> {
        let payload = AnalysisPayload::new(metrics, logs, &self.thresholds);

        let Some(model) = &self.model else {
            return Generated::fallback(fallback::account_fallback(&payload), "model unavailable");
        };
        debug!(model_id = %model.model_id(), clusters = ?payload.clusters, "Requesting account analysis");

        match self.ask_account(model.as_ref(), &payload).await {
            Ok(recommendation) => Generated::model(recommendation),
            Err(e) => {
                warn!(error = %e, "Account analysis failed, using fallback");
                Generated::failed(fallback::account_fallback(&payload), &e)
            }
        }
    }

    async fn ask_account(
        &self,
        model: &dyn LanguageModel,
        payload: &AnalysisPayload,
    ) -> Result<AccountRecommendation> {
        let prompt = prompt::analysis_prompt(payload)?;
        let reply = self
            .timed(model.converse(ConverseRequest::prompt(prompt, &self.settings.analysis)))
            .await?;
        parse::parse_account(&reply, &payload.timestamp)
    }

    /// Recommendation for one service from its metrics and recent log lines
    pub async fn service_recommendation(
        &self,
        cluster: &str,
        service: &str,
        metrics: &ServiceMetrics,
        logs: &[String],
    ) -> Generated<ServiceRecommendation> {
        let error_lines = error_log_lines(logs).len();
        let rules = || fallback::service_fallback(service, metrics, error_lines, &self.thresholds);

        if !metrics.has_utilization() {
            warn!(cluster = %cluster, service = %service, "No metrics data available, using fallback");
            return Generated::fallback(rules(), "no utilization metrics");
        }
        let Some(model) = &self.model else {
            return Generated::fallback(rules(), "model unavailable");
        };

        match self
            .ask_service(model.as_ref(), cluster, service, metrics, error_lines)
            .await
        {
            Ok(recommendation) => Generated::model(recommendation),
            Err(e) => {
                warn!(cluster = %cluster, service = %service, error = %e, "Service analysis failed, using fallback");
                Generated::failed(rules(), &e)
            }
        }
    }

    async fn ask_service(
        &self,
        model: &dyn LanguageModel,
        cluster: &str,
        service: &str,
        metrics: &ServiceMetrics,
        error_lines: usize,
    ) -> Result<ServiceRecommendation> {
        let prompt = prompt::service_prompt(cluster, service, metrics, error_lines)?;
        let reply = self
            .timed(model.converse(ConverseRequest::prompt(prompt, &self.settings.service)))
            .await?;
        parse::parse_service(&reply)
    }

    async fn timed<F: std::future::Future<Output = Result<String>>>(&self, call: F) -> Result<String> {
        let start = Instant::now();
        let reply = call.await;
        self.metrics.observe_model_latency(start.elapsed().as_secs_f64());
        reply
    }
}
