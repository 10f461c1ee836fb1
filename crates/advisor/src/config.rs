//! Service configuration
//!
//! Loaded from an optional `fleet-advisor.{toml,yaml,json}` file, then from
//! `FLEET_ADVISOR__*` environment variables with `__` between nesting levels,
//! e.g. `FLEET_ADVISOR__THRESHOLDS__CPU_HIGH=85`.

use advisor_lib::chat::ChatSettings;
use advisor_lib::monitor::MonitorSettings;
use advisor_lib::notify::EmailSettings;
use advisor_lib::recommender::ModelSettings;
use advisor_lib::session::CredentialSettings;
use advisor_lib::store::StoreSettings;
use advisor_lib::summarize::Thresholds;
use advisor_lib::AdvisorSettings;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

const CONFIG_FILE: &str = "fleet-advisor";
const ENV_PREFIX: &str = "FLEET_ADVISOR";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Tag on structured log events
    pub instance_name: String,

    /// Port of the HTTP API
    pub api_port: u16,

    /// Region for Bedrock, DynamoDB and SES, and for accounts registered without one
    pub default_region: String,

    pub credentials: CredentialSettings,
    pub monitor: MonitorSettings,
    pub thresholds: Thresholds,
    pub model: ModelSettings,
    pub store: StoreSettings,
    pub chat: ChatSettings,
    pub email: EmailSettings,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            instance_name: "fleet-advisor".to_string(),
            api_port: 8000,
            default_region: "ap-south-1".to_string(),
            credentials: CredentialSettings::default(),
            monitor: MonitorSettings::default(),
            thresholds: Thresholds::default(),
            model: ModelSettings::default(),
            store: StoreSettings::default(),
            chat: ChatSettings::default(),
            email: EmailSettings::default(),
        }
    }
}

impl AdvisorConfig {
    /// Load `.env`, the optional config file and the process environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::build(Some(CONFIG_FILE), None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(None, Some(vars))
    }

    fn build(file: Option<&str>, vars: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid fleet advisor configuration")
    }

    /// Settings handed to the orchestration layer
    pub fn advisor_settings(&self) -> AdvisorSettings {
        AdvisorSettings {
            instance_name: self.instance_name.clone(),
            thresholds: self.thresholds.clone(),
            model: self.model.clone(),
            chat: self.chat.clone(),
            email: self.email.clone(),
        }
    }
}
