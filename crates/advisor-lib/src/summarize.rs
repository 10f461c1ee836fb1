//! Metric and log summarization
//!
//! Reduces per-service time series into a per-cluster [`ClusterSummary`]
//! and raw log lines into a per-cluster [`LogAnalysis`]. Both feed the
//! account-wide analysis prompt and the rule-based fallback.

use crate::models::{mean_average, mean_sum, ServiceSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Substrings marking a log line as an error
const ERROR_KEYWORDS: &[&str] = &["error", "exception", "failed"];

/// Error classes counted within error lines
const ERROR_CLASSES: &[&str] = &["outofmemory", "connection", "timeout", "permission"];

const WARNING_KEYWORDS: &[&str] = &["warning", "warn"];

/// Thresholds used by the summarizer and the fallback rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Mean CPU utilization above which a service runs hot (percent)
    pub cpu_high: f64,
    pub memory_high: f64,
    /// Below both low marks a service may be over-provisioned
    pub cpu_low: f64,
    pub memory_low: f64,
    /// Mean target response time in seconds
    pub response_time_secs: f64,
    /// Mean requests per metric period
    pub request_volume: f64,
    /// Error lines tolerated before a service is flagged
    pub error_log_count: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_high: 80.0,
            memory_high: 80.0,
            cpu_low: 20.0,
            memory_low: 20.0,
            response_time_secs: 2.0,
            request_volume: 1000.0,
            error_log_count: 10,
        }
    }
}

/// Aggregate view of one cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub service_count: usize,
    pub high_cpu_services: Vec<String>,
    pub high_memory_services: Vec<String>,
    /// Entries are `service(target-group)`
    pub high_response_time_services: Vec<String>,
    pub unhealthy_target_services: Vec<String>,
    pub high_traffic_services: Vec<String>,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub avg_response_time: f64,
    pub total_requests: f64,
}

/// Running mean that ignores missing samples
#[derive(Default)]
struct Accumulator {
    total: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Summarize every cluster's services against `thresholds`
pub fn summarize_metrics(
    metrics: &BTreeMap<String, Vec<ServiceSample>>,
    thresholds: &Thresholds,
) -> BTreeMap<String, ClusterSummary> {
    metrics
        .iter()
        .map(|(cluster, services)| (cluster.clone(), summarize_cluster(services, thresholds)))
        .collect()
}

fn summarize_cluster(services: &[ServiceSample], thresholds: &Thresholds) -> ClusterSummary {
    let mut summary = ClusterSummary {
        service_count: services.len(),
        ..Default::default()
    };
    let mut cpu = Accumulator::default();
    let mut memory = Accumulator::default();
    let mut response_time = Accumulator::default();

    for sample in services {
        let name = &sample.service;
        let metrics = &sample.metrics;

        if let Some(avg) = mean_average(&metrics.cpu) {
            cpu.add(avg);
            if avg > thresholds.cpu_high {
                summary.high_cpu_services.push(name.clone());
            }
        }
        if let Some(avg) = mean_average(&metrics.memory) {
            memory.add(avg);
            if avg > thresholds.memory_high {
                summary.high_memory_services.push(name.clone());
            }
        }

        for (tg_name, tg) in &metrics.target_groups {
            let label = format!("{}({})", name, tg_name);

            if let Some(avg) = mean_average(&tg.response_time) {
                response_time.add(avg);
                if avg > thresholds.response_time_secs {
                    summary.high_response_time_services.push(label.clone());
                }
            }

            let no_healthy = mean_average(&tg.healthy_hosts).is_some_and(|avg| avg == 0.0);
            let some_unhealthy = mean_average(&tg.unhealthy_hosts).is_some_and(|avg| avg > 0.0);
            if no_healthy || some_unhealthy {
                summary.unhealthy_target_services.push(label.clone());
            }

            if let Some(avg) = mean_sum(&tg.request_count) {
                summary.total_requests += avg;
                if avg > thresholds.request_volume {
                    summary.high_traffic_services.push(label);
                }
            }
        }
    }

    summary.avg_cpu = cpu.mean();
    summary.avg_memory = memory.mean();
    summary.avg_response_time = response_time.mean();
    summary
}

/// Keyword counts over one cluster's log lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysis {
    pub total_logs: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub common_errors: BTreeMap<String, usize>,
    pub error_rate: f64,
}

pub fn analyze_logs(logs: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, LogAnalysis> {
    logs.iter()
        .map(|(cluster, lines)| (cluster.clone(), analyze_lines(lines)))
        .collect()
}

fn analyze_lines(lines: &[String]) -> LogAnalysis {
    let mut analysis = LogAnalysis {
        total_logs: lines.len(),
        ..Default::default()
    };

    for line in lines {
        let lower = line.to_lowercase();
        if contains_any(&lower, ERROR_KEYWORDS) {
            analysis.error_count += 1;
            for class in ERROR_CLASSES.iter().filter(|c| lower.contains(*c)) {
                *analysis.common_errors.entry(class.to_string()).or_default() += 1;
            }
        }
        if contains_any(&lower, WARNING_KEYWORDS) {
            analysis.warning_count += 1;
        }
    }

    if !lines.is_empty() {
        analysis.error_rate = analysis.error_count as f64 / lines.len() as f64;
    }
    analysis
}

/// Lines that look like errors
pub fn error_log_lines(logs: &[String]) -> Vec<&str> {
    logs.iter()
        .map(String::as_str)
        .filter(|line| contains_any(&line.to_lowercase(), ERROR_KEYWORDS))
        .collect()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Datapoint, ServiceMetrics, TargetGroupMetrics};
    use chrono::Utc;

    fn series(values: &[f64]) -> Vec<Datapoint> {
        values
            .iter()
            .map(|v| Datapoint {
                timestamp: Utc::now(),
                average: *v,
                maximum: *v,
                sum: *v,
                unit: None,
            })
            .collect()
    }

    fn sample(name: &str, cpu: &[f64], memory: &[f64]) -> ServiceSample {
        ServiceSample {
            service: name.to_string(),
            metrics: ServiceMetrics {
                cpu: series(cpu),
                memory: series(memory),
                ..Default::default()
            },
        }
    }

    fn one_cluster(services: Vec<ServiceSample>) -> ClusterSummary {
        let metrics = BTreeMap::from([("prod".to_string(), services)]);
        summarize_metrics(&metrics, &Thresholds::default()).remove("prod").unwrap()
    }

    #[test]
    fn test_high_cpu_is_strict() {
        let summary = one_cluster(vec![
            sample("hot", &[90.0], &[10.0]),
            sample("cool", &[30.0], &[10.0]),
            sample("edge", &[80.0], &[80.0]),
        ]);
        assert_eq!(summary.service_count, 3);
        assert_eq!(summary.high_cpu_services, vec!["hot"]);
        assert!(summary.high_memory_services.is_empty());
    }

    #[test]
    fn test_empty_series_left_out_of_averages() {
        let summary = one_cluster(vec![
            sample("a", &[40.0, 60.0], &[]),
            sample("b", &[], &[30.0]),
            sample("c", &[], &[]),
        ]);
        assert_eq!(summary.service_count, 3);
        assert_eq!(summary.avg_cpu, 50.0);
        assert_eq!(summary.avg_memory, 30.0);
    }

    #[test]
    fn test_target_group_flags() {
        let mut svc = sample("web", &[50.0], &[50.0]);
        svc.metrics.target_groups.insert(
            "web-tg".into(),
            TargetGroupMetrics {
                healthy_hosts: series(&[0.0, 0.0]),
                unhealthy_hosts: series(&[0.0]),
                response_time: series(&[2.5, 3.5]),
                request_count: series(&[1500.0, 700.0]),
                ..Default::default()
            },
        );
        let mut api = sample("api", &[50.0], &[50.0]);
        api.metrics.target_groups.insert(
            "api-tg".into(),
            TargetGroupMetrics {
                healthy_hosts: series(&[2.0]),
                unhealthy_hosts: series(&[0.0, 1.0]),
                response_time: series(&[1.0]),
                request_count: series(&[100.0]),
                ..Default::default()
            },
        );

        let summary = one_cluster(vec![svc, api]);
        assert_eq!(summary.high_response_time_services, vec!["web(web-tg)"]);
        assert_eq!(
            summary.unhealthy_target_services,
            vec!["web(web-tg)", "api(api-tg)"]
        );
        assert_eq!(summary.high_traffic_services, vec!["web(web-tg)"]);
        assert_eq!(summary.avg_response_time, 2.0);
        assert_eq!(summary.total_requests, 1200.0);
    }

    #[test]
    fn test_missing_host_series_is_not_unhealthy() {
        let mut svc = sample("web", &[50.0], &[50.0]);
        svc.metrics
            .target_groups
            .insert("web-tg".into(), TargetGroupMetrics::default());
        let summary = one_cluster(vec![svc]);
        assert!(summary.unhealthy_target_services.is_empty());
        assert_eq!(summary.avg_response_time, 0.0);
    }

    #[test]
    fn test_analyze_logs() {
        let logs = BTreeMap::from([
            (
                "prod".to_string(),
                vec![
                    "ERROR connection refused".to_string(),
                    "java.lang.OutOfMemoryError".to_string(),
                    "request failed: timeout".to_string(),
                    "WARN slow query".to_string(),
                    "GET /health 200".to_string(),
                ],
            ),
            ("empty".to_string(), Vec::new()),
        ]);

        let analysis = analyze_logs(&logs);
        let prod = &analysis["prod"];
        assert_eq!(prod.total_logs, 5);
        assert_eq!(prod.error_count, 3);
        assert_eq!(prod.warning_count, 1);
        assert_eq!(prod.common_errors["connection"], 1);
        assert_eq!(prod.common_errors["outofmemory"], 1);
        assert_eq!(prod.common_errors["timeout"], 1);
        assert!(!prod.common_errors.contains_key("permission"));
        assert_eq!(prod.error_rate, 0.6);

        assert_eq!(analysis["empty"].error_rate, 0.0);
    }

    #[test]
    fn test_error_log_lines() {
        let logs = vec![
            "Exception in thread main".to_string(),
            "all good".to_string(),
            "Task FAILED".to_string(),
        ];
        assert_eq!(error_log_lines(&logs).len(), 2);
    }
}
