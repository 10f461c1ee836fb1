//! Session construction for monitored accounts
//!
//! Turns an [`Account`] into an `SdkConfig` using the first credential
//! source it carries: named profile, assumed role, static keys with a
//! session token, static keys, or the ambient default chain.

use crate::error::{AdvisorError, Result};
use crate::models::{Account, CredentialSource};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_smithy_types::error::display::DisplayErrorContext;
use serde::Deserialize;
use std::time::SystemTime;
use tracing::{debug, error, info};

const STATIC_PROVIDER_NAME: &str = "fleet-advisor-static";
const ASSUMED_PROVIDER_NAME: &str = "fleet-advisor-assume-role";

/// Parameters used when assuming a role into a monitored account
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub role_session_name: String,
    pub role_session_duration_secs: i32,
    pub role_external_id: Option<String>,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            role_session_name: "AssumedRoleSession".to_string(),
            role_session_duration_secs: 14400,
            role_external_id: Some("ecs-monitoring-app".to_string()),
        }
    }
}

/// Build an SDK configuration for the account's region and credentials
pub async fn resolve(account: &Account, settings: &CredentialSettings) -> Result<SdkConfig> {
    let region = Region::new(account.region.clone());
    let source = account.credential_source();
    debug!(
        account_id = %account.account_id,
        region = %account.region,
        source = source.kind(),
        "Resolving account session"
    );

    let loader = aws_config::defaults(BehaviorVersion::latest()).region(region.clone());

    let config = match source {
        CredentialSource::Profile(profile) => loader.profile_name(profile).load().await,
        CredentialSource::AssumeRole(role_arn) => {
            let base = default_config(&account.region).await;
            let credentials = assume_role(&base, &role_arn, settings)
                .await
                .inspect_err(|e| {
                    error!(
                        account_id = %account.account_id,
                        role_arn = %role_arn,
                        error = %e,
                        "Failed to assume role"
                    );
                })?;
            info!(account_id = %account.account_id, role_arn = %role_arn, "Assumed role");
            loader.credentials_provider(credentials).load().await
        }
        CredentialSource::SessionToken {
            access_key,
            secret_key,
            session_token,
        } => {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                Some(session_token),
                None,
                STATIC_PROVIDER_NAME,
            );
            loader.credentials_provider(credentials).load().await
        }
        CredentialSource::StaticKeys {
            access_key,
            secret_key,
        } => {
            let credentials =
                Credentials::new(access_key, secret_key, None, None, STATIC_PROVIDER_NAME);
            loader.credentials_provider(credentials).load().await
        }
        CredentialSource::DefaultChain => loader.load().await,
    };

    Ok(config)
}

/// SDK configuration for the advisor's own identity in `region`
pub async fn default_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

async fn assume_role(
    base: &SdkConfig,
    role_arn: &str,
    settings: &CredentialSettings,
) -> Result<Credentials> {
    let sts = aws_sdk_sts::Client::new(base);
    let mut request = sts
        .assume_role()
        .role_arn(role_arn)
        .role_session_name(&settings.role_session_name)
        .duration_seconds(settings.role_session_duration_secs);
    if let Some(external_id) = settings
        .role_external_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        request = request.external_id(external_id);
    }

    let output = request.send().await.map_err(|e| {
        AdvisorError::Credentials(format!("AssumeRole {}: {}", role_arn, DisplayErrorContext(&e)))
    })?;
    let credentials = output.credentials().ok_or_else(|| {
        AdvisorError::Credentials(format!("AssumeRole {} returned no credentials", role_arn))
    })?;
    let expiry = SystemTime::try_from(*credentials.expiration()).ok();

    Ok(Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        expiry,
        ASSUMED_PROVIDER_NAME,
    ))
}

/// Account id of the identity behind `config`
pub async fn caller_account(config: &SdkConfig) -> Result<String> {
    let output = aws_sdk_sts::Client::new(config)
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| AdvisorError::cloud("GetCallerIdentity", e))?;
    output
        .account()
        .map(str::to_string)
        .ok_or_else(|| AdvisorError::Credentials("caller identity has no account".to_string()))
}

/// Bedrock inference profile ARN for a cross-region model name
pub fn inference_profile_arn(region: &str, account_id: &str, model_name: &str) -> String {
    format!(
        "arn:aws:bedrock:{}:{}:inference-profile/{}",
        region, account_id, model_name
    )
}
