//! Chat, report emails and scheduled job triggers

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;

use crate::client::{
    ApiClient, ChatContext, ChatReply, ChatRequest, EmailOutcome, EmailRequest, JobOutcome,
};
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Jobs the scheduler normally runs
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum Job {
    DailyRecommendations,
    DailyReport,
    WeeklyRecommendations,
    WeeklyReport,
}

impl Job {
    pub fn path(&self) -> &'static str {
        match self {
            Self::DailyRecommendations => "trigger-daily-recommendations",
            Self::DailyReport => "trigger-daily-report",
            Self::WeeklyRecommendations => "trigger-weekly-recommendations",
            Self::WeeklyReport => "trigger-weekly-report",
        }
    }
}

/// One chat turn, optionally about a specific service
pub async fn chat(
    client: &ApiClient,
    account_id: &str,
    message: String,
    cluster: Option<String>,
    service: Option<String>,
    reset: bool,
    format: OutputFormat,
) -> Result<()> {
    let context = match (cluster, service) {
        (None, None) => None,
        (cluster_name, service_name) => Some(ChatContext {
            cluster_name,
            service_name,
        }),
    };
    let request = ChatRequest {
        message,
        context,
        reset_chat: reset,
    };

    let reply: ChatReply = client.post(&format!("chat/{}", account_id), &request).await?;

    match format {
        OutputFormat::Json => print_json(&reply)?,
        OutputFormat::Table => println!("{} {}", "advisor>".cyan().bold(), reply.response),
    }

    Ok(())
}

pub async fn send_email(
    client: &ApiClient,
    account_id: &str,
    email: &str,
    format: OutputFormat,
) -> Result<()> {
    let request = EmailRequest {
        email: email.to_string(),
    };
    let result: EmailOutcome = client
        .post(&format!("send-email/{}", account_id), &request)
        .await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&result.message);
            println!("Message ID: {}", result.message_id);
        }
    }

    Ok(())
}

pub async fn trigger(client: &ApiClient, job: Job, format: OutputFormat) -> Result<()> {
    print_info(&format!("Running {}...", job.path().trim_start_matches("trigger-")));
    let result: JobOutcome = client.post_empty(job.path()).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&result.message);
            println!("Accounts: {}  Services: {}", result.accounts, result.services);
        }
    }

    Ok(())
}
