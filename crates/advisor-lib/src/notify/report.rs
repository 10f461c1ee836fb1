//! Report emails built from stored recommendations

use super::{EmailMessage, EmailSettings};
use crate::models::{
    Account, AccountRecommendation, Health, Priority, ScalingAction, ServiceRecommendationRecord,
};
use std::fmt::Write;

/// Daily email listing the high priority services of an account
pub fn high_priority_report(
    account: &Account,
    records: &[ServiceRecommendationRecord],
    email: &EmailSettings,
) -> EmailMessage {
    let subject = format!(
        "Daily High-Priority ECS Report - {} ({} services)",
        account.account_name,
        records.len()
    );
    let critical = records.iter().filter(|r| r.service_health == Health::Critical).count();
    let warning = records.iter().filter(|r| r.service_health == Health::Warning).count();
    let scale_up = records.iter().filter(|r| r.scaling_action == ScalingAction::ScaleUp).count();
    let overview = format!(
        "High priority services: {} | Critical: {} | Warning: {} | Scale up: {}",
        records.len(),
        critical,
        warning,
        scale_up
    );

    let mut text = format!("{}\nAccount: {} ({})\n{}\n", subject, account.account_name, account.account_id, overview);
    let mut html = format!(
        "<html><body><h2>{}</h2><p>Account: {} ({})</p><p>{}</p>",
        escape(&subject),
        escape(&account.account_name),
        escape(&account.account_id),
        escape(&overview)
    );
    for record in records {
        write_service(&mut text, &mut html, record);
    }
    html.push_str("</body></html>");

    EmailMessage {
        to: email.recipients.clone(),
        cc: email.cc.clone(),
        subject,
        text,
        html,
    }
}

/// Weekly email with every stored recommendation, grouped by priority
pub fn weekly_report(
    account: &Account,
    records: &[ServiceRecommendationRecord],
    email: &EmailSettings,
) -> EmailMessage {
    let subject = format!(
        "Weekly ECS Comprehensive Report - {} ({} services)",
        account.account_name,
        records.len()
    );
    let count_health = |h: Health| records.iter().filter(|r| r.service_health == h).count();
    let count_action = |a: ScalingAction| records.iter().filter(|r| r.scaling_action == a).count();
    let health_line = format!(
        "Health Distribution: Critical: {} | Warning: {} | Good: {}",
        count_health(Health::Critical),
        count_health(Health::Warning),
        count_health(Health::Good)
    );
    let scaling_line = format!(
        "Scaling Actions: Scale Up: {} | Scale Down: {} | No Change: {}",
        count_action(ScalingAction::ScaleUp),
        count_action(ScalingAction::ScaleDown),
        count_action(ScalingAction::NoChange)
    );

    let mut text = format!(
        "Weekly Summary for {}\nAccount ID: {}\nTotal Services Analyzed: {}\n{}\n{}\n",
        account.account_name,
        account.account_id,
        records.len(),
        health_line,
        scaling_line
    );
    let mut html = format!(
        "<html><body><h2>{}</h2><p>Account ID: {}</p><p>Total Services Analyzed: {}</p><p>{}</p><p>{}</p>",
        escape(&subject),
        escape(&account.account_id),
        records.len(),
        escape(&health_line),
        escape(&scaling_line)
    );

    for priority in [Priority::High, Priority::Medium, Priority::Low] {
        let group: Vec<&ServiceRecommendationRecord> =
            records.iter().filter(|r| r.priority == priority).collect();
        if group.is_empty() {
            continue;
        }
        let heading = format!("{} Priority ({} services)", priority.as_str().to_uppercase(), group.len());
        let _ = writeln!(text, "\n{}", heading);
        let _ = write!(html, "<h3>{}</h3>", escape(&heading));
        for record in group {
            write_service(&mut text, &mut html, record);
        }
    }
    html.push_str("</body></html>");

    EmailMessage {
        to: email.recipients.clone(),
        cc: email.cc.clone(),
        subject,
        text,
        html,
    }
}

/// Account-wide recommendation sent to one address on request
pub fn account_report(
    account: &Account,
    recommendation: &AccountRecommendation,
    to: &str,
    email: &EmailSettings,
) -> EmailMessage {
    let health = recommendation.overall_health.as_str();
    let subject = format!(
        "ECS Recommendations - {} ({})",
        account.account_name,
        health.to_uppercase()
    );
    let summary = if recommendation.summary.is_empty() {
        "No summary available"
    } else {
        recommendation.summary.as_str()
    };

    let mut lines = Vec::new();
    for rec in &recommendation.scaling_recommendations {
        lines.push(format!(
            "Scaling: {} ({}) {}: {}",
            rec.service,
            rec.cluster,
            rec.action.as_str().replace('_', " "),
            rec.reason
        ));
    }
    for issue in &recommendation.performance_issues {
        lines.push(format!(
            "Performance [{}]: {} {}: {} Solution: {}",
            issue.severity, issue.service, issue.cluster, issue.issue, issue.solution
        ));
    }
    for cost in &recommendation.cost_optimization {
        lines.push(format!("Cost ({}): {}", cost.cluster, cost.recommendation));
    }
    if lines.is_empty() {
        lines.push("No scaling recommendations at this time.".to_string());
    }

    let text = format!(
        "ECS Recommendations for {}\n\nHealth: {}\n\nSummary: {}\n\nRecommendations:\n{}",
        account.account_name,
        health,
        summary,
        lines.join("\n")
    );
    let items: String = lines.iter().map(|l| format!("<li>{}</li>", escape(l))).collect();
    let html = format!(
        "<html><body><h2>ECS Recommendations for {}</h2><p>Health: {}</p><p>Summary: {}</p><ul>{}</ul></body></html>",
        escape(&account.account_name),
        health,
        escape(summary),
        items
    );

    EmailMessage {
        to: vec![to.to_string()],
        cc: email.cc.clone(),
        subject,
        text,
        html,
    }
}

fn write_service(text: &mut String, html: &mut String, record: &ServiceRecommendationRecord) {
    let recommendation = &record.full_recommendation;
    let _ = writeln!(
        text,
        "\n{} ({}) health: {}, action: {}, priority: {}\n  {}",
        record.service,
        record.cluster,
        record.service_health.as_str(),
        record.scaling_action.as_str(),
        record.priority.as_str(),
        recommendation.reason
    );
    for line in &recommendation.recommendations {
        let _ = writeln!(text, "  - {}", line);
    }

    let _ = write!(
        html,
        "<div><h4>{} ({})</h4><p>Health: {} | Action: {} | Priority: {}</p><p>{}</p><ul>",
        escape(&record.service),
        escape(&record.cluster),
        record.service_health.as_str(),
        record.scaling_action.as_str(),
        record.priority.as_str(),
        escape(&recommendation.reason)
    );
    for line in &recommendation.recommendations {
        let _ = write!(html, "<li>{}</li>", escape(line));
    }
    html.push_str("</ul></div>");
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
