//! Per-account chat sessions
//!
//! Each account keeps one conversation in memory: a system message followed
//! by user and assistant turns. Generating a recommendation reseeds the
//! session so follow-up questions are about that recommendation. Sessions
//! are not persisted.

use crate::models::{ChatMessage, ChatRole};
use crate::recommender::{ConverseRequest, InferenceSettings};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

const ASSISTANT_INTRO: &str = "You are an AWS ECS expert assistant.";
const DEFAULT_SYSTEM: &str =
    "You are an AWS ECS expert assistant. Help users with ECS recommendations and scenarios.";

/// Reply when no model is reachable for the account
pub const UNAVAILABLE_REPLY: &str =
    "AI chat is currently unavailable. Please check your Bedrock configuration.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Conversation messages kept besides the system message
    pub history_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self { history_limit: 10 }
    }
}

/// What the caller is currently looking at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatContext {
    pub service_name: Option<String>,
    pub cluster_name: Option<String>,
    pub service_health: Option<String>,
    pub scaling_action: Option<String>,
    pub priority: Option<String>,
    pub reason: Option<String>,
    pub recommendations: Vec<String>,
}

impl ChatContext {
    /// Cluster and service, when both are named
    pub fn service(&self) -> Option<(&str, &str)> {
        match (self.cluster_name.as_deref(), self.service_name.as_deref()) {
            (Some(cluster), Some(service)) if !cluster.is_empty() && !service.is_empty() => {
                Some((cluster, service))
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn details(&self, metrics_line: Option<&str>) -> Vec<String> {
        let mut details = Vec::new();
        if let Some((cluster, service)) = self.service() {
            details.push(format!(
                "We are discussing ECS service '{}' in cluster '{}'",
                service, cluster
            ));
        }
        let labelled = [
            ("Service health status", &self.service_health),
            ("Recommended scaling action", &self.scaling_action),
            ("Priority level", &self.priority),
            ("Initial analysis", &self.reason),
        ];
        for (label, value) in labelled {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                details.push(format!("{}: {}", label, value));
            }
        }
        if !self.recommendations.is_empty() {
            let first: Vec<&str> = self.recommendations.iter().take(3).map(String::as_str).collect();
            details.push(format!("Initial recommendations: {}", first.join("; ")));
        }
        if let Some(line) = metrics_line {
            details.push(format!("Current Metrics: {}", line));
        }
        details
    }
}

/// Body of a chat call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
    #[serde(default)]
    pub reset_chat: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub timestamp: String,
}

/// Reply when the model call fails
pub fn trouble_reply(error: &str) -> String {
    format!(
        "I'm having trouble processing your request right now. Error: {}",
        error
    )
}

/// System message for a conversation about the account-wide recommendation
pub fn account_system(account_id: &str) -> String {
    format!(
        "{} We are discussing account-wide ECS recommendations for account {}.",
        ASSISTANT_INTRO, account_id
    )
}

pub fn account_intro(recommendation_json: &str) -> String {
    format!(
        "I have analyzed your ECS infrastructure and provided these account-wide recommendations: {}",
        recommendation_json
    )
}

/// System message for a conversation about one service
pub fn service_system(account_id: &str, cluster: &str, service: &str) -> String {
    format!(
        "{} We are discussing ECS service '{}' in cluster '{}' for account {}.",
        ASSISTANT_INTRO, service, cluster, account_id
    )
}

pub fn service_intro(cluster: &str, service: &str, metrics: &str, recommendation_json: &str) -> String {
    format!(
        "I have analyzed service '{}' in cluster '{}'. Current Metrics: {}. Recommendations: {}",
        service, cluster, metrics, recommendation_json
    )
}

/// In-memory conversations keyed by account id
pub struct ChatSessions {
    sessions: DashMap<String, Vec<ChatMessage>>,
    history_limit: usize,
}

impl Default for ChatSessions {
    fn default() -> Self {
        Self::new(&ChatSettings::default())
    }
}

impl ChatSessions {
    pub fn new(settings: &ChatSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            history_limit: settings.history_limit,
        }
    }

    /// Replace the session with a system message and an assistant opener
    pub fn seed(&self, account_id: &str, system: String, assistant: String) {
        self.sessions.insert(
            account_id.to_string(),
            vec![ChatMessage::system(system), ChatMessage::assistant(assistant)],
        );
    }

    pub fn reset(&self, account_id: &str) {
        self.sessions.remove(account_id);
    }

    /// Rewrite the system message from the caller's context.
    ///
    /// Only seeded sessions (at least two messages) are rewritten. Returns
    /// whether the system message changed.
    pub fn apply_context(&self, account_id: &str, context: &ChatContext, metrics_line: Option<&str>) -> bool {
        if !self.is_seeded(account_id) {
            return false;
        }
        let Some(mut session) = self.sessions.get_mut(account_id) else {
            return false;
        };
        let details = context.details(metrics_line);
        if details.is_empty() {
            return false;
        }

        let system = format!(
            "{} IMPORTANT CONTEXT: {}. When users ask about 'which service' or 'what recommendations', \
             refer to this context. Always remember this is the service/recommendations we are discussing.",
            ASSISTANT_INTRO,
            details.join(". ")
        );
        session[0] = ChatMessage::system(system);
        true
    }

    /// True once the session holds a system message and at least one turn
    pub fn is_seeded(&self, account_id: &str) -> bool {
        self.sessions
            .get(account_id)
            .is_some_and(|session| session.len() >= 2)
    }

    /// Append a user turn, starting a default session when none exists
    pub fn push_user(&self, account_id: &str, message: &str) {
        self.sessions
            .entry(account_id.to_string())
            .or_insert_with(|| vec![ChatMessage::system(DEFAULT_SYSTEM)])
            .push(ChatMessage::user(message));
    }

    /// Append the assistant reply and trim to the system message plus the
    /// last `history_limit` messages
    pub fn record_reply(&self, account_id: &str, reply: &str) {
        let mut session = self.sessions.entry(account_id.to_string()).or_default();
        session.push(ChatMessage::assistant(reply));

        if session.len() > self.history_limit + 1 {
            let keep_from = session.len() - self.history_limit;
            let system = session[0].clone();
            let mut trimmed = Vec::with_capacity(self.history_limit + 1);
            trimmed.push(system);
            trimmed.extend(session.drain(keep_from..));
            *session = trimmed;
        }
    }

    /// Converse request for the current session, system message split out.
    ///
    /// Converse wants the conversation to open with a user turn and to
    /// alternate roles. Assistant turns ahead of the first user turn (the
    /// seeded opener) are folded into the system prompt, and consecutive
    /// turns of the same role are joined.
    pub fn request_for(&self, account_id: &str, inference: &InferenceSettings) -> ConverseRequest {
        let history = self.history(account_id);
        let mut system: Option<String> = None;
        let mut messages: Vec<ChatMessage> = Vec::with_capacity(history.len());
        for message in history {
            match message.role {
                ChatRole::System => system = Some(message.content),
                ChatRole::Assistant if messages.is_empty() => {
                    let prompt = system.get_or_insert_with(|| DEFAULT_SYSTEM.to_string());
                    prompt.push_str("\n\nYour previous analysis: ");
                    prompt.push_str(&message.content);
                }
                _ => match messages.last_mut() {
                    Some(last) if last.role == message.role => {
                        last.content.push_str("\n\n");
                        last.content.push_str(&message.content);
                    }
                    _ => messages.push(message),
                },
            }
        }

        ConverseRequest {
            system,
            messages,
            max_tokens: inference.max_tokens,
            temperature: inference.temperature,
        }
    }

    pub fn history(&self, account_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .get(account_id)
            .map(|session| session.clone())
            .unwrap_or_default()
    }
}
