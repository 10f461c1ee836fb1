//! Recommendation-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{
    AccountRecommendation, ApiClient, ClusterRecommendations, FilterQuery,
    FilteredRecommendations, KnowledgeSummary, ServiceDetails, ServiceRecommendation,
};
use crate::output::{
    color_action, color_health, color_priority, format_percent, format_timestamp, print_header,
    print_json, print_rows, print_warning, truncate, OutputFormat,
};

/// Utilization above this is shown in red
const HOT_PERCENT: f64 = 80.0;

/// Row for the scaling table of an account recommendation
#[derive(Tabled)]
struct ScalingRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Issue")]
    issue: String,
    #[tabled(rename = "Solution")]
    solution: String,
}

#[derive(Tabled)]
struct CostRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
    #[tabled(rename = "Savings")]
    savings: String,
}

/// Row for per-service analyses and stored records
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Account-wide recommendation
pub async fn get_recommendations(
    client: &ApiClient,
    account_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let result: AccountRecommendation = client
        .get(&format!("recommendations/{}", account_id))
        .await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    println!(
        "Account {}: {}",
        account_id.bold(),
        color_health(&result.overall_health)
    );
    if !result.summary.is_empty() {
        println!("{}", result.summary);
    }

    if !result.scaling_recommendations.is_empty() {
        print_header("Scaling");
        print_rows(
            result
                .scaling_recommendations
                .iter()
                .map(|r| ScalingRow {
                    cluster: r.cluster.clone(),
                    service: r.service.clone(),
                    action: color_action(&r.action),
                    reason: truncate(&r.reason, 60),
                })
                .collect(),
        );
    }

    if !result.performance_issues.is_empty() {
        print_header("Performance issues");
        print_rows(
            result
                .performance_issues
                .iter()
                .map(|i| IssueRow {
                    cluster: i.cluster.clone(),
                    service: i.service.clone(),
                    severity: color_priority(&i.severity),
                    issue: truncate(&i.issue, 40),
                    solution: truncate(&i.solution, 40),
                })
                .collect(),
        );
    }

    if !result.cost_optimization.is_empty() {
        print_header("Cost optimization");
        print_rows(
            result
                .cost_optimization
                .iter()
                .map(|c| CostRow {
                    cluster: c.cluster.clone(),
                    recommendation: truncate(&c.recommendation, 60),
                    savings: match &c.potential_savings {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Null => "-".to_string(),
                        other => other.to_string(),
                    },
                })
                .collect(),
        );
    }

    if !result.generated_at.is_empty() {
        println!("\nGenerated at: {}", format_timestamp(&result.generated_at));
    }

    Ok(())
}

/// Recommendation for one service
pub async fn get_service(
    client: &ApiClient,
    account_id: &str,
    cluster: &str,
    service: &str,
    format: OutputFormat,
) -> Result<()> {
    let result: ServiceRecommendation = client
        .get(&format!("recommendations/{}/{}/{}", account_id, cluster, service))
        .await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    println!("Service:  {}/{}", cluster, service.bold());
    println!("Health:   {}", color_health(&result.service_health));
    println!("Action:   {}", color_action(&result.scaling_action));
    println!("Priority: {}", color_priority(&result.priority));
    if !result.reason.is_empty() {
        println!("\n{}", result.reason);
    }
    for item in &result.recommendations {
        println!("  - {}", item);
    }

    Ok(())
}

/// Per-service recommendations for all clusters, or for one cluster
pub async fn get_clusters(
    client: &ApiClient,
    account_id: &str,
    cluster: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let path = match cluster {
        Some(name) => format!("cluster-recommendations/{}/{}", account_id, name),
        None => format!("cluster-recommendations/{}", account_id),
    };
    let result: ClusterRecommendations = client.get(&path).await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    let analyses = result.analyses();
    if analyses.is_empty() {
        print_warning("No services found");
        return Ok(());
    }

    print_rows(
        analyses
            .iter()
            .map(|a| ServiceRow {
                cluster: a.cluster_name.clone(),
                service: a.service_name.clone(),
                health: color_health(&a.service_health),
                action: color_action(&a.scaling_action),
                priority: color_priority(&a.priority),
                detail: truncate(&a.reason, 50),
            })
            .collect(),
    );

    match &result {
        ClusterRecommendations::Fleet(fleet) => println!(
            "\nTotal: {} services in {} clusters",
            fleet.summary.total_services, fleet.summary.total_clusters
        ),
        ClusterRecommendations::Cluster(single) => println!(
            "\nTotal: {} services in {}",
            single.summary.total_services, single.cluster_name
        ),
    }

    Ok(())
}

/// Stored service recommendations, optionally filtered
pub async fn get_services(
    client: &ApiClient,
    account_id: &str,
    query: FilterQuery,
    format: OutputFormat,
) -> Result<()> {
    let result: FilteredRecommendations = client
        .get_with_query(&format!("service-recommendations/{}", account_id), &query)
        .await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    if result.recommendations.is_empty() {
        print_warning(&format!("No stored recommendations ({})", result.filter));
        return Ok(());
    }

    print_rows(
        result
            .recommendations
            .iter()
            .map(|r| ServiceRow {
                cluster: r.cluster.clone(),
                service: r.service.clone(),
                health: color_health(&r.service_health),
                action: color_action(&r.scaling_action),
                priority: color_priority(&r.priority),
                detail: format_timestamp(&r.timestamp),
            })
            .collect(),
    );
    println!("\nTotal: {} recommendations ({})", result.count, result.filter);

    Ok(())
}

/// Cached details of one service
pub async fn get_details(
    client: &ApiClient,
    account_id: &str,
    cluster: &str,
    service: &str,
    format: OutputFormat,
) -> Result<()> {
    let result: ServiceDetails = client
        .get(&format!("service-details/{}/{}/{}", account_id, cluster, service))
        .await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    println!("Service:  {}/{}", result.cluster_name, result.service_name.bold());
    println!("Status:   {}", result.status);
    println!("Tasks:    {} running / {} desired", result.running_count, result.desired_count);
    println!(
        "CPU:      {} avg, {} max",
        format_percent(result.cpu_avg, HOT_PERCENT),
        format_percent(result.cpu_max, HOT_PERCENT)
    );
    println!(
        "Memory:   {} avg, {} max",
        format_percent(result.memory_avg, HOT_PERCENT),
        format_percent(result.memory_max, HOT_PERCENT)
    );

    Ok(())
}

/// How much the advisor has stored for an account
pub async fn get_knowledge(client: &ApiClient, account_id: &str, format: OutputFormat) -> Result<()> {
    let result: KnowledgeSummary = client.get(&format!("knowledge/{}", account_id)).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("Account:  {}", result.account_id);
            println!("Records:  {}", result.total_records);
            println!("Status:   {}", color_health(&result.status));
            println!("Updated:  {}", format_timestamp(&result.last_updated));
        }
    }

    Ok(())
}
