//! Language model access over Bedrock Converse

use crate::error::{AdvisorError, Result};
use crate::models::{ChatMessage, ChatRole};
use crate::session;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message, SystemContentBlock,
};
use aws_smithy_types::error::display::DisplayErrorContext;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token and sampling limits for one kind of call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub max_tokens: i32,
    pub temperature: f32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            max_tokens: 5000,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Cross-region inference profile name
    pub model_name: String,
    /// Explicit model id or ARN; derived from `model_name` when unset
    pub model_id: Option<String>,
    /// Account-wide analysis
    pub analysis: InferenceSettings,
    /// Single-service analysis
    pub service: InferenceSettings,
    pub chat: InferenceSettings,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_name: "apac.anthropic.claude-3-7-sonnet-20250219-v1:0".to_string(),
            model_id: None,
            analysis: InferenceSettings::default(),
            service: InferenceSettings::default(),
            chat: InferenceSettings::default(),
        }
    }
}

/// A single Converse call
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseRequest {
    pub system: Option<String>,
    /// User and assistant turns, oldest first
    pub messages: Vec<ChatMessage>,
    pub max_tokens: i32,
    pub temperature: f32,
}

impl ConverseRequest {
    /// One user prompt without a system message
    pub fn prompt(text: impl Into<String>, inference: &InferenceSettings) -> Self {
        Self {
            system: None,
            messages: vec![ChatMessage::user(text)],
            max_tokens: inference.max_tokens,
            temperature: inference.temperature,
        }
    }
}

/// A hosted model that answers a conversation with text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn converse(&self, request: ConverseRequest) -> Result<String>;
}

pub struct BedrockModel {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockModel {
    pub fn new(config: &SdkConfig, model_id: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_bedrockruntime::Client::new(config),
            model_id: model_id.into(),
        }
    }
}

fn bedrock_message(message: &ChatMessage) -> Result<Option<Message>> {
    let role = match message.role {
        ChatRole::User => ConversationRole::User,
        ChatRole::Assistant => ConversationRole::Assistant,
        ChatRole::System => return Ok(None),
    };
    Message::builder()
        .role(role)
        .content(ContentBlock::Text(message.content.clone()))
        .build()
        .map(Some)
        .map_err(|e| AdvisorError::Model(e.to_string()))
}

#[async_trait]
impl LanguageModel for BedrockModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn converse(&self, request: ConverseRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            if let Some(message) = bedrock_message(message)? {
                messages.push(message);
            }
        }
        let system = request
            .system
            .map(|text| vec![SystemContentBlock::Text(text)]);
        let inference = InferenceConfiguration::builder()
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build();

        debug!(model_id = %self.model_id, messages = messages.len(), "Calling Converse");
        let response = self
            .client
            .converse()
            .model_id(&self.model_id)
            .set_system(system)
            .set_messages(Some(messages))
            .inference_config(inference)
            .send()
            .await
            .map_err(|e| AdvisorError::Model(DisplayErrorContext(&e).to_string()))?;

        let text: String = response
            .output()
            .and_then(|output| output.as_message().ok())
            .map(|message| {
                message
                    .content()
                    .iter()
                    .filter_map(|block| block.as_text().ok())
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AdvisorError::ModelResponse(
                "Converse returned no text content".to_string(),
            ));
        }
        debug!(model_id = %self.model_id, length = text.len(), "Received model reply");
        Ok(text)
    }
}

/// Hands out a model per account, or `None` when no model can be reached
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn model(&self, account_id: &str) -> Option<Arc<dyn LanguageModel>>;
}

/// Bedrock models in the advisor's own region, cached per account
pub struct BedrockModelProvider {
    region: String,
    settings: ModelSettings,
    cache: DashMap<String, Arc<dyn LanguageModel>>,
}

impl BedrockModelProvider {
    pub fn new(region: impl Into<String>, settings: ModelSettings) -> Self {
        Self {
            region: region.into(),
            settings,
            cache: DashMap::new(),
        }
    }

    async fn build(&self) -> Result<Arc<dyn LanguageModel>> {
        let config = session::default_config(&self.region).await;
        let model_id = match &self.settings.model_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                let caller = session::caller_account(&config).await?;
                session::inference_profile_arn(&self.region, &caller, &self.settings.model_name)
            }
        };
        info!(model_id = %model_id, region = %self.region, "Bedrock model ready");
        Ok(Arc::new(BedrockModel::new(&config, model_id)))
    }
}

#[async_trait]
impl ModelProvider for BedrockModelProvider {
    async fn model(&self, account_id: &str) -> Option<Arc<dyn LanguageModel>> {
        if let Some(model) = self.cache.get(account_id) {
            return Some(model.clone());
        }

        match self.build().await {
            Ok(model) => {
                self.cache.insert(account_id.to_string(), model.clone());
                Some(model)
            }
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Could not initialize Bedrock client");
                None
            }
        }
    }
}
