//! Fleet Advisor CLI
//!
//! A command-line tool for registering AWS accounts, reading ECS
//! recommendations and talking to the fleet advisor service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{AccountQuery, AccountRequest, ApiClient, FilterQuery};
use commands::{accounts, assist, recommendations};
use output::OutputFormat;

/// Fleet Advisor CLI
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about = "CLI for Fleet Advisor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FLEETCTL_API_URL or `fleetctl config set-url`)
    #[arg(long, env = "FLEETCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the saved format, then table)
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register, list and refresh AWS accounts
    #[command(subcommand)]
    Accounts(AccountsCommands),

    /// Get recommendations and service details
    #[command(subcommand)]
    Get(GetCommands),

    /// Ask the advisor about an account
    Chat {
        account_id: String,

        /// Question for the advisor
        message: String,

        /// Cluster the question is about
        #[arg(long)]
        cluster: Option<String>,

        /// Service the question is about
        #[arg(long)]
        service: Option<String>,

        /// Start a fresh conversation
        #[arg(long)]
        reset: bool,
    },

    /// Run a scheduled job now
    Trigger {
        #[arg(value_enum)]
        job: assist::Job,
    },

    /// Email an account's recommendation report
    Email {
        account_id: String,

        /// Recipient address
        #[arg(long)]
        to: String,
    },

    /// Manage the saved CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Register an account and start monitoring it
    Add {
        account_id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// AWS region (the advisor's default if not specified)
        #[arg(long)]
        region: Option<String>,

        /// Named profile from the advisor host's AWS config
        #[arg(long)]
        profile: Option<String>,

        /// Role to assume in the account
        #[arg(long)]
        role_arn: Option<String>,
    },

    /// List accounts with their live status
    List {
        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        limit: Option<usize>,

        /// Match on account name or id
        #[arg(long)]
        search: Option<String>,

        /// Filter by status (active, inactive)
        #[arg(long)]
        status: Option<String>,
    },

    /// Rebuild an account's cached cluster snapshot
    Refresh { account_id: String },
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Account-wide recommendation
    Recommendations { account_id: String },

    /// Recommendation for one service
    Service {
        account_id: String,
        cluster: String,
        service: String,
    },

    /// Per-service recommendations for every cluster, or one cluster
    Clusters {
        account_id: String,

        /// Only this cluster
        #[arg(long, short)]
        cluster: Option<String>,
    },

    /// Stored service recommendations
    Services {
        account_id: String,

        /// Filter by health (good, warning, critical)
        #[arg(long)]
        health: Option<String>,

        /// Filter by priority (high, medium, low)
        #[arg(long)]
        priority: Option<String>,
    },

    /// Cached details of one service
    Details {
        account_id: String,
        cluster: String,
        service: String,
    },

    /// Stored knowledge for an account
    Knowledge { account_id: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save the API URL used when neither --api-url nor FLEETCTL_API_URL is set
    SetUrl { url: String },

    /// Show the saved configuration and the effective API URL
    Show,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let saved = config::Config::load()?;

    let format = cli
        .format
        .or_else(|| saved.default_format.as_deref().and_then(OutputFormat::from_name))
        .unwrap_or_default();
    let api_url = saved.resolve_api_url(cli.api_url.as_deref());

    // Config commands work without a reachable or even valid API URL
    let client = match cli.command {
        Commands::Config(config_cmd) => return run_config(config_cmd, saved, &api_url, format),
        _ => ApiClient::new(&api_url)?,
    };

    // Execute command
    match cli.command {
        Commands::Accounts(accounts_cmd) => match accounts_cmd {
            AccountsCommands::Add {
                account_id,
                name,
                region,
                profile,
                role_arn,
            } => {
                let request = AccountRequest {
                    account_id,
                    account_name: name,
                    region,
                    profile_name: profile,
                    role_arn,
                };
                accounts::add_account(&client, request, format).await?;
            }
            AccountsCommands::List {
                page,
                limit,
                search,
                status,
            } => {
                let query = AccountQuery {
                    page,
                    limit,
                    search,
                    status_filter: status,
                };
                accounts::list_accounts(&client, query, format).await?;
            }
            AccountsCommands::Refresh { account_id } => {
                accounts::refresh_account(&client, &account_id, format).await?;
            }
        },
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::Recommendations { account_id } => {
                recommendations::get_recommendations(&client, &account_id, format).await?;
            }
            GetCommands::Service {
                account_id,
                cluster,
                service,
            } => {
                recommendations::get_service(&client, &account_id, &cluster, &service, format)
                    .await?;
            }
            GetCommands::Clusters {
                account_id,
                cluster,
            } => {
                recommendations::get_clusters(&client, &account_id, cluster.as_deref(), format)
                    .await?;
            }
            GetCommands::Services {
                account_id,
                health,
                priority,
            } => {
                let query = FilterQuery {
                    health_status: health,
                    priority,
                };
                recommendations::get_services(&client, &account_id, query, format).await?;
            }
            GetCommands::Details {
                account_id,
                cluster,
                service,
            } => {
                recommendations::get_details(&client, &account_id, &cluster, &service, format)
                    .await?;
            }
            GetCommands::Knowledge { account_id } => {
                recommendations::get_knowledge(&client, &account_id, format).await?;
            }
        },
        Commands::Chat {
            account_id,
            message,
            cluster,
            service,
            reset,
        } => {
            assist::chat(&client, &account_id, message, cluster, service, reset, format).await?;
        }
        Commands::Trigger { job } => {
            assist::trigger(&client, job, format).await?;
        }
        Commands::Email { account_id, to } => {
            assist::send_email(&client, &account_id, &to, format).await?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

fn run_config(
    command: ConfigCommands,
    mut saved: config::Config,
    api_url: &str,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ConfigCommands::SetUrl { url } => {
            url::Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("Invalid API URL '{}': {}", url, e))?;
            saved.api_url = Some(url.clone());
            let path = saved.save()?;
            output::print_success(&format!("API URL set to {} ({})", url, path.display()));
        }
        ConfigCommands::Show => match format {
            OutputFormat::Json => output::print_json(&serde_json::json!({
                "saved": saved,
                "effective_api_url": api_url,
            }))?,
            OutputFormat::Table => {
                let path = config::Config::config_path()?;
                println!("Config file:  {}", path.display());
                println!(
                    "Saved URL:    {}",
                    saved.api_url.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "Format:       {}",
                    saved.default_format.as_deref().unwrap_or("(not set)")
                );
                println!("Effective URL: {}", api_url);
            }
        },
    }

    Ok(())
}
