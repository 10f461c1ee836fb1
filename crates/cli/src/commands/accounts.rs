//! Account registration and listing

use anyhow::Result;
use tabled::Tabled;

use crate::client::{
    AccountListing, AccountQuery, AccountRequest, ApiClient, RefreshOutcome, StatusMessage,
};
use crate::output::{
    color_health, format_timestamp, print_info, print_json, print_rows, print_success,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Account ID")]
    account_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Clusters")]
    clusters: String,
    #[tabled(rename = "Last Updated")]
    last_updated: String,
}

pub async fn add_account(
    client: &ApiClient,
    request: AccountRequest,
    format: OutputFormat,
) -> Result<()> {
    let result: StatusMessage = client.post("accounts", &request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&format!("{} ({})", result.status, request.account_id))
        }
    }

    Ok(())
}

pub async fn list_accounts(
    client: &ApiClient,
    query: AccountQuery,
    format: OutputFormat,
) -> Result<()> {
    let listing: AccountListing = client.get_with_query("accounts", &query).await?;

    match format {
        OutputFormat::Json => print_json(&listing)?,
        OutputFormat::Table => {
            let accounts = listing.accounts();
            if accounts.is_empty() {
                print_warning("No accounts found");
                return Ok(());
            }

            let rows: Vec<AccountRow> = accounts
                .iter()
                .map(|a| AccountRow {
                    account_id: a.account_id.clone(),
                    name: a.account_name.clone(),
                    status: color_health(&a.status),
                    clusters: if a.clusters.is_empty() {
                        "-".to_string()
                    } else {
                        a.clusters.join(", ")
                    },
                    last_updated: format_timestamp(&a.last_updated),
                })
                .collect();
            print_rows(rows);

            match listing.pagination() {
                Some(p) => println!(
                    "\nPage {} of {} ({} accounts)",
                    p.page,
                    p.total_pages.max(1),
                    p.total_count
                ),
                None => println!("\nTotal: {} accounts", accounts.len()),
            }
        }
    }

    Ok(())
}

pub async fn refresh_account(client: &ApiClient, account_id: &str, format: OutputFormat) -> Result<()> {
    print_info(&format!("Refreshing account {}...", account_id));
    let result: RefreshOutcome = client
        .post_empty(&format!("accounts/{}/refresh", account_id))
        .await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&result.message);
            println!("Refreshed at: {}", format_timestamp(&result.refreshed_at));
        }
    }

    Ok(())
}
