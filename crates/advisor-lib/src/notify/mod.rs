//! Email notifications over SES v2

pub mod report;

use crate::error::{AdvisorError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_smithy_types::error::display::DisplayErrorContext;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

/// Sender and default recipients of report emails
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Verified sender; reports are disabled when unset
    pub source: Option<String>,
    /// Accepts a list or a comma-separated string
    #[serde(deserialize_with = "comma_list")]
    pub recipients: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub cc: Vec<String>,
}

impl EmailSettings {
    pub fn enabled(&self) -> bool {
        self.source.as_deref().is_some_and(|s| !s.is_empty())
    }
}

fn comma_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Addresses {
        Joined(String),
        List(Vec<String>),
    }

    let addresses = match Addresses::deserialize(deserializer)? {
        Addresses::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        Addresses::List(list) => list,
    };
    Ok(addresses
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

/// A rendered email ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivers rendered emails
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the message, returning the provider's message id
    async fn send(&self, message: EmailMessage) -> Result<String>;
}

pub struct SesNotifier {
    client: aws_sdk_sesv2::Client,
    source: String,
}

impl SesNotifier {
    pub fn new(config: &SdkConfig, source: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sesv2::Client::new(config),
            source: source.into(),
        }
    }
}

fn content(data: String) -> Result<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| AdvisorError::Email(e.to_string()))
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, message: EmailMessage) -> Result<String> {
        if message.to.is_empty() {
            return Err(AdvisorError::InvalidInput("email has no recipients".to_string()));
        }
        debug!(subject = %message.subject, to = message.to.len(), cc = message.cc.len(), "Sending email");

        let destination = Destination::builder()
            .set_to_addresses(Some(message.to))
            .set_cc_addresses((!message.cc.is_empty()).then_some(message.cc))
            .build();
        let body = Body::builder()
            .html(content(message.html)?)
            .text(content(message.text)?)
            .build();
        let email = Message::builder()
            .subject(content(message.subject)?)
            .body(body)
            .build();

        let output = self
            .client
            .send_email()
            .from_email_address(&self.source)
            .destination(destination)
            .content(EmailContent::builder().simple(email).build())
            .send()
            .await
            .map_err(|e| AdvisorError::Email(DisplayErrorContext(&e).to_string()))?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        info!(message_id = %message_id, "Email sent");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_separated_recipients() {
        let settings: EmailSettings = serde_json::from_str(
            r#"{"source": "ops@example.com", "recipients": "a@example.com, b@example.com,", "cc": ["c@example.com", " "]}"#,
        )
        .unwrap();
        assert_eq!(settings.recipients, vec!["a@example.com", "b@example.com"]);
        assert_eq!(settings.cc, vec!["c@example.com"]);
        assert!(settings.enabled());
    }

    #[test]
    fn test_disabled_without_source() {
        assert!(!EmailSettings::default().enabled());
        let settings = EmailSettings {
            source: Some(String::new()),
            ..Default::default()
        };
        assert!(!settings.enabled());
    }
}
