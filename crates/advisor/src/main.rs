//! Fleet advisor - ECS recommendations across AWS accounts
//!
//! Serves the HTTP API, backed by DynamoDB (or an in-memory store for local
//! runs), Bedrock for recommendations and SES for report emails.

use advisor_lib::{
    health::{components, HealthRegistry},
    monitor::AwsMonitorFactory,
    notify::{Notifier, SesNotifier},
    observability::{AdvisorMetrics, StructuredLogger},
    recommender::BedrockModelProvider,
    session,
    store::{DynamoStore, KnowledgeStore, MemoryStore, StoreBackend},
    FleetAdvisor,
};
use anyhow::Result;
use fleet_advisor::{api, config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ADVISOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-advisor");

    let config = config::AdvisorConfig::load()?;
    info!(
        instance = %config.instance_name,
        region = %config.default_region,
        store = ?config.store.backend,
        "Advisor configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MONITOR).await;
    health_registry.register(components::RECOMMENDER).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = AdvisorMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);
    let sdk_config = session::default_config(&config.default_region).await;

    let store: Arc<dyn KnowledgeStore> = match config.store.backend {
        StoreBackend::Dynamodb => Arc::new(DynamoStore::new(&sdk_config, &config.store)),
        StoreBackend::Memory => {
            health_registry
                .set_degraded(components::STORE, "in-memory store, nothing is persisted")
                .await;
            Arc::new(MemoryStore::new(config.store.ttl()))
        }
    };
    match store.accounts().await {
        Ok(accounts) => {
            metrics.set_accounts_monitored(accounts.len() as i64);
            info!(accounts = accounts.len(), "Knowledge store reachable");
        }
        Err(e) => {
            warn!(error = %e, "Knowledge store unreachable");
            health_registry
                .set_unhealthy(components::STORE, e.to_string())
                .await;
        }
    }

    let notifier: Option<Arc<dyn Notifier>> = match config.email.source.as_deref() {
        Some(source) if config.email.enabled() => {
            Some(Arc::new(SesNotifier::new(&sdk_config, source)))
        }
        _ => {
            health_registry
                .set_degraded(components::NOTIFIER, "no email source configured")
                .await;
            None
        }
    };

    let models = Arc::new(BedrockModelProvider::new(
        config.default_region.clone(),
        config.model.clone(),
    ));
    let monitors = Arc::new(AwsMonitorFactory::new(
        config.credentials.clone(),
        config.monitor.clone(),
    ));

    let mut advisor = FleetAdvisor::new(store, monitors, models, config.advisor_settings())
        .with_health(health_registry.clone());
    if let Some(notifier) = notifier {
        advisor = advisor.with_notifier(notifier);
    }

    let app_state = Arc::new(api::AppState::new(
        Arc::new(advisor),
        health_registry.clone(),
        config.default_region.clone(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(ADVISOR_VERSION, config.api_port);

    let shutdown_logger = logger.clone();
    api::serve(config.api_port, app_state, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await
            }
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
