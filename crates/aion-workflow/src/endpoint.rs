use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub status: EndpointStatus,
    pub response_time_ms: u64,
    pub error_rate: f64,
    pub active_connections: u64,
    pub last_check: DateTime<Utc>,
}

impl EndpointHealth {
    fn new(endpoint: String) -> Self {
        Self { endpoint, status: EndpointStatus::Unknown, response_time_ms: 0, error_rate: 0.0, active_connections: 0, last_check: Utc::now() }
    }
}

/// Round-robins over endpoints currently marked healthy. A background task
/// (`spawn_probe_loop`) keeps health current by polling `<endpoint>/health`
/// every 30s with a 5s timeout.
pub struct LoadBalancer {
    endpoints: RwLock<Vec<EndpointHealth>>,
    cursor: AtomicUsize,
    http: reqwest::Client,
}

impl LoadBalancer {
    pub fn new(endpoints: Vec<String>) -> Self {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap_or_default();
        Self {
            endpoints: RwLock::new(endpoints.into_iter().map(EndpointHealth::new).collect()),
            cursor: AtomicUsize::new(0),
            http,
        }
    }

    pub async fn select(&self) -> Option<String> {
        let endpoints = self.endpoints.read().await;
        let healthy: Vec<&EndpointHealth> = endpoints.iter().filter(|e| e.status == EndpointStatus::Healthy).collect();
        if healthy.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Some(healthy[idx].endpoint.clone())
    }

    pub async fn snapshot(&self) -> Vec<EndpointHealth> {
        self.endpoints.read().await.clone()
    }

    pub async fn probe_once(&self) {
        let targets: Vec<String> = self.endpoints.read().await.iter().map(|e| e.endpoint.clone()).collect();
        for target in targets {
            let url = format!("{target}/health");
            let started = std::time::Instant::now();
            let result = self.http.get(&url).send().await;
            let response_time_ms = started.elapsed().as_millis() as u64;

            let status = match result {
                Ok(resp) if resp.status().as_u16() < 400 => EndpointStatus::Healthy,
                Ok(resp) => {
                    warn!(target = %target, status = %resp.status(), "endpoint health check returned an error status");
                    EndpointStatus::Unhealthy
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "endpoint health check failed");
                    EndpointStatus::Unhealthy
                }
            };

            let mut endpoints = self.endpoints.write().await;
            if let Some(entry) = endpoints.iter_mut().find(|e| e.endpoint == target) {
                entry.status = status;
                entry.response_time_ms = response_time_ms;
                entry.last_check = Utc::now();
            }
        }
    }

    pub async fn mark_status(&self, endpoint: &str, status: EndpointStatus) {
        let mut endpoints = self.endpoints.write().await;
        if let Some(entry) = endpoints.iter_mut().find(|e| e.endpoint == endpoint) {
            entry.status = status;
            entry.last_check = Utc::now();
        }
    }
}

pub fn spawn_probe_loop(balancer: Arc<LoadBalancer>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            balancer.probe_once().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_robin_skips_unhealthy_endpoints() {
        let balancer = LoadBalancer::new(vec!["http://e1".into(), "http://e2".into()]);
        balancer.mark_status("http://e1", EndpointStatus::Unhealthy).await;
        balancer.mark_status("http://e2", EndpointStatus::Healthy).await;

        for _ in 0..5 {
            assert_eq!(balancer.select().await, Some("http://e2".to_string()));
        }
    }

    #[tokio::test]
    async fn no_healthy_endpoint_returns_none() {
        let balancer = LoadBalancer::new(vec!["http://e1".into()]);
        assert_eq!(balancer.select().await, None);
    }
}
