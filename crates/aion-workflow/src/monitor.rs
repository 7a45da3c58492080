use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub execution_time_secs: f64,
    pub error_rate: f64,
    pub response_time_secs: f64,
    pub memory_usage: f64,
    pub cpu_usage: f64,
}

#[derive(Debug, Clone)]
pub struct Bottleneck {
    pub kind: String,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub alert_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

/// Supplies the metrics the monitor polls every 30s. Implemented outside
/// this crate by whatever aggregates real execution/error/resource figures.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> MetricsSnapshot;
}

/// Resource-usage thresholds mirror the error-rate/execution-time pair the
/// contract spells out explicitly; 85% is the obvious "analogous" choice
/// for memory and CPU saturation, not a value the spec pins down.
const RESOURCE_USAGE_THRESHOLD: f64 = 0.85;

/// Evaluates bottleneck thresholds and raises alerts from a metrics
/// snapshot. Each alert is unique by `(alert_type, minute bucket)` and
/// persists until explicitly resolved.
pub struct Monitor {
    alerts: RwLock<HashMap<(String, i64), Alert>>,
}

impl Monitor {
    pub fn new() -> Self {
        Self { alerts: RwLock::new(HashMap::new()) }
    }

    pub fn detect_bottlenecks(&self, snapshot: &MetricsSnapshot) -> Vec<Bottleneck> {
        let now = Utc::now();
        let mut bottlenecks = Vec::new();

        if snapshot.execution_time_secs > 30.0 {
            bottlenecks.push(Bottleneck {
                kind: "execution_time".to_string(),
                severity: Severity::High,
                value: snapshot.execution_time_secs,
                threshold: 30.0,
                detected_at: now,
            });
        }
        if snapshot.error_rate > 0.05 {
            bottlenecks.push(Bottleneck {
                kind: "error_rate".to_string(),
                severity: Severity::Critical,
                value: snapshot.error_rate,
                threshold: 0.05,
                detected_at: now,
            });
        }
        if snapshot.memory_usage > RESOURCE_USAGE_THRESHOLD {
            bottlenecks.push(Bottleneck {
                kind: "memory_usage".to_string(),
                severity: Severity::Medium,
                value: snapshot.memory_usage,
                threshold: RESOURCE_USAGE_THRESHOLD,
                detected_at: now,
            });
        }
        if snapshot.cpu_usage > RESOURCE_USAGE_THRESHOLD {
            bottlenecks.push(Bottleneck {
                kind: "cpu_usage".to_string(),
                severity: Severity::Medium,
                value: snapshot.cpu_usage,
                threshold: RESOURCE_USAGE_THRESHOLD,
                detected_at: now,
            });
        }

        bottlenecks
    }

    pub async fn raise_alerts(&self, snapshot: &MetricsSnapshot) {
        if snapshot.error_rate > 0.10 {
            self.raise("error_rate", format!("error rate {:.1}% exceeds 10%", snapshot.error_rate * 100.0)).await;
        }
        if snapshot.response_time_secs > 60.0 {
            self.raise("response_time", format!("response time {:.1}s exceeds 60s", snapshot.response_time_secs)).await;
        }
    }

    async fn raise(&self, alert_type: &str, message: String) {
        let bucket = Utc::now().timestamp() / 60;
        let mut alerts = self.alerts.write().await;
        alerts.entry((alert_type.to_string(), bucket)).or_insert_with(|| {
            warn!(alert_type, "alert raised");
            Alert { alert_type: alert_type.to_string(), message, created_at: Utc::now(), resolved: false }
        });
    }

    pub async fn resolve(&self, alert_type: &str) {
        let mut alerts = self.alerts.write().await;
        for alert in alerts.values_mut().filter(|a| a.alert_type == alert_type) {
            alert.resolved = true;
        }
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.values().filter(|a| !a.resolved).cloned().collect()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn spawn_monitor_loop(monitor: Arc<Monitor>, source: Arc<dyn MetricsSource>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot = source.snapshot().await;
            monitor.detect_bottlenecks(&snapshot);
            monitor.raise_alerts(&snapshot).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_execution_time_is_flagged_high_severity() {
        let monitor = Monitor::new();
        let snapshot = MetricsSnapshot { execution_time_secs: 45.0, ..Default::default() };
        let bottlenecks = monitor.detect_bottlenecks(&snapshot);
        assert_eq!(bottlenecks.len(), 1);
        assert_eq!(bottlenecks[0].kind, "execution_time");
        assert_eq!(bottlenecks[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn alert_persists_until_explicitly_resolved() {
        let monitor = Monitor::new();
        let snapshot = MetricsSnapshot { error_rate: 0.2, ..Default::default() };
        monitor.raise_alerts(&snapshot).await;
        assert_eq!(monitor.active_alerts().await.len(), 1);

        monitor.resolve("error_rate").await;
        assert_eq!(monitor.active_alerts().await.len(), 0);
    }
}
