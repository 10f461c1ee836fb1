//! Recent log tailing for clusters and services
//!
//! ECS tasks using the awslogs driver write to groups named `/ecs/{cluster}...`;
//! both readers rely on that convention.

use super::FleetMonitor;
use crate::error::Result;
use chrono::{Duration, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, warn};

impl FleetMonitor {
    /// Recent log lines for every discovered cluster
    ///
    /// A cluster whose logs cannot be listed maps to an empty list.
    pub async fn recent_logs(&self) -> BTreeMap<String, Vec<String>> {
        let clusters = self.clusters().await;
        let per_cluster = join_all(clusters.iter().map(|cluster| async move {
            match self.cluster_logs(cluster).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(
                        account_id = %self.account_id(),
                        cluster = %cluster,
                        error = %e,
                        "Failed to read cluster logs"
                    );
                    Vec::new()
                }
            }
        }))
        .await;

        clusters.into_iter().zip(per_cluster).collect()
    }

    async fn cluster_logs(&self, cluster: &str) -> Result<Vec<String>> {
        let settings = self.settings();
        let start_ms = (Utc::now() - Duration::seconds(settings.recent_logs_window_secs))
            .timestamp_millis();
        let groups = self.api().log_groups(&format!("/ecs/{}", cluster)).await?;

        let mut lines = Vec::new();
        'groups: for group in groups.iter().take(settings.log_groups_limit) {
            let streams = match self
                .api()
                .latest_log_streams(group, settings.log_streams_limit)
                .await
            {
                Ok(streams) => streams,
                Err(e) => {
                    debug!(group = %group, error = %e, "Failed to list log streams");
                    continue;
                }
            };

            for stream in &streams {
                match self
                    .api()
                    .log_events(group, stream, Some(start_ms), settings.log_events_limit)
                    .await
                {
                    Ok(events) => lines.extend(events),
                    Err(e) => debug!(group = %group, stream = %stream, error = %e, "Failed to read log events"),
                }
                if lines.len() >= settings.total_logs_limit {
                    break 'groups;
                }
            }
        }

        lines.truncate(settings.total_logs_limit);
        Ok(lines)
    }

    /// Latest log lines of one service, empty when nothing can be read
    pub async fn service_logs(&self, cluster: &str, service: &str) -> Vec<String> {
        let settings = self.settings();
        let groups = match self.api().log_groups(&format!("/ecs/{}", cluster)).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(
                    account_id = %self.account_id(),
                    cluster = %cluster,
                    service = %service,
                    error = %e,
                    "Failed to list service log groups"
                );
                return Vec::new();
            }
        };

        let mut lines = Vec::new();
        for group in groups.iter().filter(|g| g.contains(service)) {
            let stream = match self.api().latest_log_streams(group, 1).await {
                Ok(streams) => streams.into_iter().next(),
                Err(e) => {
                    debug!(group = %group, error = %e, "Failed to list log streams");
                    continue;
                }
            };
            let Some(stream) = stream else { continue };

            match self
                .api()
                .log_events(group, &stream, None, settings.log_events_limit)
                .await
            {
                Ok(events) => lines.extend(events),
                Err(e) => debug!(group = %group, stream = %stream, error = %e, "Failed to read log events"),
            }
        }

        lines.truncate(settings.total_logs_limit);
        lines
    }
}
