//! HTTP API: account management, recommendations, chat, jobs and health checks

use advisor_lib::advisor::{
    AccountListing, AccountQuery, Analytics, ClusterRecommendations, EmailOutcome,
    FilteredRecommendations, GroupedRecommendations, JobKind, JobOutcome, RefreshOutcome,
    ServiceDetails,
};
use advisor_lib::chat::{ChatReply, ChatRequest};
use advisor_lib::health::{ComponentStatus, HealthRegistry};
use advisor_lib::store::{KnowledgeSummary, RecommendationFilter};
use advisor_lib::{
    Account, AccountRecommendation, AdvisorError, FleetAdvisor, Health, Priority,
    ServiceRecommendation,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<FleetAdvisor>,
    pub health_registry: HealthRegistry,
    /// Region given to accounts registered without one
    pub default_region: String,
}

impl AppState {
    pub fn new(
        advisor: Arc<FleetAdvisor>,
        health_registry: HealthRegistry,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            advisor,
            health_registry,
            default_region: default_region.into(),
        }
    }
}

/// An [`AdvisorError`] rendered as a JSON error response
#[derive(Debug)]
pub struct ApiError(AdvisorError);

impl From<AdvisorError> for ApiError {
    fn from(err: AdvisorError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AdvisorError::NotFound(_) => StatusCode::NOT_FOUND,
            AdvisorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AdvisorError::Credentials(_)
            | AdvisorError::Cloud { .. }
            | AdvisorError::Model(_)
            | AdvisorError::ModelResponse(_)
            | AdvisorError::Email(_) => StatusCode::BAD_GATEWAY,
            AdvisorError::Store(_) | AdvisorError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Registration body; region and credentials are optional
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub account_id: String,
    pub account_name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
}

impl AccountRequest {
    fn into_account(self, default_region: &str) -> Account {
        let region = self
            .region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| default_region.to_string());
        let mut account = Account::new(self.account_id, self.account_name, region);
        account.access_key = self.access_key;
        account.secret_key = self.secret_key;
        account.session_token = self.session_token;
        account.profile_name = self.profile_name;
        account.role_arn = self.role_arn;
        account
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub health_status: Option<String>,
    pub priority: Option<String>,
}

impl FilterParams {
    fn into_filter(self) -> Result<RecommendationFilter, ApiError> {
        let parse = |value: Option<String>| value.filter(|v| !v.is_empty());
        let health = parse(self.health_status)
            .map(|v| v.parse::<Health>())
            .transpose()
            .map_err(AdvisorError::InvalidInput)?;
        let priority = parse(self.priority)
            .map(|v| v.parse::<Priority>())
            .transpose()
            .map_err(AdvisorError::InvalidInput)?;
        Ok(RecommendationFilter { health, priority })
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// 200 while operational, 503 once any component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn add_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AccountRequest>,
) -> ApiResult<serde_json::Value> {
    let account = request.into_account(&state.default_region);
    state.advisor.register_account(account).await?;
    Ok(Json(json!({ "status": "Account added, monitoring started" })))
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
) -> ApiResult<AccountListing> {
    Ok(Json(state.advisor.account_statuses(&query).await?))
}

async fn refresh_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<RefreshOutcome> {
    Ok(Json(state.advisor.refresh(&account_id).await?))
}

async fn account_recommendation(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<AccountRecommendation> {
    Ok(Json(state.advisor.account_recommendation(&account_id).await?))
}

async fn service_recommendation(
    State(state): State<Arc<AppState>>,
    Path((account_id, cluster, service)): Path<(String, String, String)>,
) -> ApiResult<ServiceRecommendation> {
    let recommendation = state
        .advisor
        .service_recommendation(&account_id, &cluster, &service)
        .await?;
    Ok(Json(recommendation))
}

async fn service_details(
    State(state): State<Arc<AppState>>,
    Path((account_id, cluster, service)): Path<(String, String, String)>,
) -> ApiResult<ServiceDetails> {
    let details = state
        .advisor
        .service_details(&account_id, &cluster, &service)
        .await?;
    Ok(Json(details))
}

async fn fleet_recommendations(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<ClusterRecommendations> {
    Ok(Json(
        state.advisor.cluster_recommendations(&account_id, None).await?,
    ))
}

async fn cluster_recommendations(
    State(state): State<Arc<AppState>>,
    Path((account_id, cluster)): Path<(String, String)>,
) -> ApiResult<ClusterRecommendations> {
    Ok(Json(
        state
            .advisor
            .cluster_recommendations(&account_id, Some(&cluster))
            .await?,
    ))
}

async fn filtered_recommendations(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(params): Query<FilterParams>,
) -> ApiResult<FilteredRecommendations> {
    let filter = params.into_filter()?;
    Ok(Json(
        state
            .advisor
            .filtered_service_recommendations(&account_id, &filter)
            .await?,
    ))
}

async fn knowledge(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<KnowledgeSummary> {
    Ok(Json(state.advisor.knowledge_summary(&account_id).await?))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    Ok(Json(state.advisor.chat(&account_id, request).await?))
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<EmailOutcome> {
    Ok(Json(
        state
            .advisor
            .send_account_email(&account_id, &request.email)
            .await?,
    ))
}

async fn daily_recommendations(State(state): State<Arc<AppState>>) -> ApiResult<JobOutcome> {
    Ok(Json(state.advisor.run_recommendation_job(JobKind::Daily).await?))
}

async fn weekly_recommendations(State(state): State<Arc<AppState>>) -> ApiResult<JobOutcome> {
    Ok(Json(state.advisor.run_recommendation_job(JobKind::Weekly).await?))
}

async fn daily_report(State(state): State<Arc<AppState>>) -> ApiResult<JobOutcome> {
    Ok(Json(state.advisor.run_report_job(JobKind::Daily).await?))
}

async fn weekly_report(State(state): State<Arc<AppState>>) -> ApiResult<JobOutcome> {
    Ok(Json(state.advisor.run_report_job(JobKind::Weekly).await?))
}

async fn all_recommendations(State(state): State<Arc<AppState>>) -> ApiResult<GroupedRecommendations> {
    Ok(Json(state.advisor.all_recommendations().await?))
}

async fn analytics(State(state): State<Arc<AppState>>) -> ApiResult<Analytics> {
    Ok(Json(state.advisor.analytics().await?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/accounts", post(add_account).get(list_accounts))
        .route("/accounts/:account_id/refresh", post(refresh_account))
        .route("/recommendations/:account_id", get(account_recommendation))
        .route(
            "/recommendations/:account_id/:cluster/:service",
            get(service_recommendation),
        )
        .route(
            "/service-details/:account_id/:cluster/:service",
            get(service_details),
        )
        .route("/cluster-recommendations/:account_id", get(fleet_recommendations))
        .route(
            "/cluster-recommendations/:account_id/:cluster",
            get(cluster_recommendations),
        )
        .route(
            "/service-recommendations/:account_id",
            get(filtered_recommendations),
        )
        .route("/knowledge/:account_id", get(knowledge))
        .route("/chat/:account_id", post(chat))
        .route("/send-email/:account_id", post(send_email))
        .route("/trigger-daily-recommendations", post(daily_recommendations))
        .route("/trigger-daily-report", post(daily_report))
        .route("/trigger-weekly-recommendations", post(weekly_recommendations))
        .route("/trigger-weekly-report", post(weekly_report))
        .route("/all-recommendations", get(all_recommendations))
        .route("/analytics-data", get(analytics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
