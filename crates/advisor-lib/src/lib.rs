//! Fleet advisor library for Amazon ECS
//!
//! This crate provides the core functionality for:
//! - Walking ECS clusters and services across AWS accounts
//! - Summarizing CloudWatch metrics and service logs
//! - Bedrock recommendations with rule-based fallbacks
//! - The knowledge store, chat sessions and report emails
//! - Health checks and observability

pub mod advisor;
pub mod chat;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod recommender;
pub mod session;
pub mod store;
pub mod summarize;

pub use advisor::{AdvisorSettings, FleetAdvisor};
pub use error::{AdvisorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AdvisorMetrics, StructuredLogger};
