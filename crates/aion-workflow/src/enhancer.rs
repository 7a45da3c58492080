use std::collections::HashMap;
use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aion_core::{Event, EventSink, WorkflowEngine};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::batch::{group_into_batches, WorkflowRequest};
use crate::endpoint::LoadBalancer;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::monitor::{Monitor, MetricsSnapshot};

#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub cache_ttl: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub compression_threshold_bytes: usize,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
            compression_threshold_bytes: 1024,
        }
    }
}

struct CacheEntry {
    body: Value,
    expires_at: DateTime<Utc>,
}

/// Dispatches workflow requests through a cache, gzip compression for large
/// payloads, round-robin endpoint selection, retry with exponential backoff,
/// and bottleneck/alert monitoring — the request-side counterpart to
/// `aion_ai_optimizer::AiCallOptimizer`.
pub struct WorkflowEnhancer {
    balancer: Arc<LoadBalancer>,
    engine: Arc<dyn WorkflowEngine>,
    event_sink: Arc<dyn EventSink>,
    monitor: Arc<Monitor>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    config: EnhancerConfig,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
}

impl WorkflowEnhancer {
    pub fn new(
        balancer: Arc<LoadBalancer>,
        engine: Arc<dyn WorkflowEngine>,
        event_sink: Arc<dyn EventSink>,
        monitor: Arc<Monitor>,
        config: EnhancerConfig,
    ) -> Self {
        Self {
            balancer,
            engine,
            event_sink,
            monitor,
            cache: RwLock::new(HashMap::new()),
            config,
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    fn cache_key(request_type: &str, payload: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request_type.as_bytes());
        hasher.update(payload.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn maybe_compress(&self, payload: &Value) -> (Value, HashMap<String, String>) {
        let serialized = serde_json::to_vec(payload).unwrap_or_default();
        if serialized.len() <= self.config.compression_threshold_bytes {
            return (payload.clone(), HashMap::new());
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&serialized).is_err() {
            return (payload.clone(), HashMap::new());
        }
        let compressed = match encoder.finish() {
            Ok(bytes) => bytes,
            Err(_) => return (payload.clone(), HashMap::new()),
        };

        let mut headers = HashMap::new();
        headers.insert("Content-Encoding".to_string(), "gzip".to_string());
        (serde_json::json!({ "gzip_payload": compressed }), headers)
    }

    /// Executes a single request through the full pipeline: cache, optional
    /// compression, endpoint selection, retried dispatch, and metrics.
    pub async fn execute(&self, request_type: &str, payload: Value) -> WorkflowResult<Value> {
        let key = Self::cache_key(request_type, &payload);

        if let Some(entry) = self.cache.read().await.get(&key) {
            if entry.expires_at > Utc::now() {
                return Ok(entry.body.clone());
            }
        }

        let (body, headers) = self.maybe_compress(&payload);
        let started = Instant::now();
        let result = self.dispatch_with_retry(&body, headers).await;
        let elapsed = started.elapsed();

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.record_metrics(elapsed, self.total_errors.load(Ordering::Relaxed) as f64
            / self.total_requests.load(Ordering::Relaxed).max(1) as f64)
            .await;

        let parsed = result?;
        self.cache.write().await.insert(
            key,
            CacheEntry { body: parsed.clone(), expires_at: Utc::now() + chrono::Duration::from_std(self.config.cache_ttl).unwrap_or_default() },
        );
        Ok(parsed)
    }

    async fn dispatch_with_retry(&self, body: &Value, headers: HashMap<String, String>) -> WorkflowResult<Value> {
        let mut attempt = 0;
        loop {
            let endpoint = self.balancer.select().await.ok_or(WorkflowError::NoEndpoint)?;
            match self.engine.post(&endpoint, body.clone(), headers.clone()).await {
                Ok(resp) if resp.status < 500 => {
                    let parsed = serde_json::from_str(&resp.body).unwrap_or(Value::String(resp.body));
                    return Ok(parsed);
                }
                Ok(resp) => {
                    warn!(endpoint = %endpoint, status = resp.status, attempt, "workflow engine returned a server error");
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, attempt, "workflow engine call failed");
                }
            }

            if attempt >= self.config.max_retries {
                return Err(WorkflowError::CapabilityError(format!("exhausted {attempt} retries against {endpoint}")));
            }
            attempt += 1;
            tokio::time::sleep(self.config.retry_base_delay * attempt).await;
        }
    }

    async fn record_metrics(&self, elapsed: Duration, error_rate: f64) {
        let snapshot = MetricsSnapshot {
            execution_time_secs: elapsed.as_secs_f64(),
            response_time_secs: elapsed.as_secs_f64(),
            error_rate,
            memory_usage: 0.0,
            cpu_usage: 0.0,
        };
        for bottleneck in self.monitor.detect_bottlenecks(&snapshot) {
            self.event_sink.emit(Event::Custom {
                event_type: format!("bottleneck.{}", bottleneck.kind),
                data: serde_json::json!({ "value": bottleneck.value, "threshold": bottleneck.threshold }),
                timestamp: Utc::now(),
            });
        }
        self.monitor.raise_alerts(&snapshot).await;
    }

    /// Groups requests by type, dispatches each batch concurrently, and
    /// collects results keyed by request id. One batch failing does not
    /// cancel the others; their errors are folded into a composite error.
    pub async fn execute_batch(self: &Arc<Self>, requests: Vec<WorkflowRequest>) -> WorkflowResult<Vec<(String, Value)>> {
        let batches = group_into_batches(requests);
        info!(batch_count = batches.len(), "dispatching workflow batches");

        let mut handles = Vec::new();
        for batch in batches {
            let enhancer = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let mut batch_results = Vec::new();
                for request in batch.requests {
                    let outcome = enhancer.execute(&batch.request_type, request.payload).await;
                    batch_results.push((request.id, outcome));
                }
                batch_results
            }));
        }

        let mut ok_results = Vec::new();
        let mut failures = Vec::new();
        for handle in handles {
            let batch_results = handle.await.map_err(|e| WorkflowError::CapabilityError(e.to_string()))?;
            for (id, outcome) in batch_results {
                match outcome {
                    Ok(value) => ok_results.push((id, value)),
                    Err(e) => failures.push(format!("{id}: {e}")),
                }
            }
        }

        if !failures.is_empty() {
            return Err(WorkflowError::BatchFailures(failures.len(), failures.join("; ")));
        }
        Ok(ok_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_core::{InMemoryEventSink, WorkflowResponse};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64 as TestCounter;

    struct EchoEngine {
        calls: TestCounter,
    }

    #[async_trait]
    impl WorkflowEngine for EchoEngine {
        async fn post(&self, _endpoint: &str, json_body: Value, _headers: HashMap<String, String>) -> anyhow::Result<WorkflowResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(WorkflowResponse { status: 200, body: json_body.to_string() })
        }
    }

    fn test_enhancer(engine: Arc<dyn WorkflowEngine>) -> WorkflowEnhancer {
        let balancer = Arc::new(LoadBalancer::new(vec!["http://e1".into()]));
        WorkflowEnhancer::new(
            balancer,
            engine,
            Arc::new(InMemoryEventSink::new()),
            Arc::new(Monitor::new()),
            EnhancerConfig::default(),
        )
    }

    #[tokio::test]
    async fn fails_with_no_endpoint_when_none_are_healthy() {
        let engine = Arc::new(EchoEngine { calls: TestCounter::new(0) });
        let enhancer = test_enhancer(engine);
        let result = enhancer.execute("ingest", serde_json::json!({"a": 1})).await;
        assert!(matches!(result, Err(WorkflowError::CapabilityError(_)) | Err(WorkflowError::NoEndpoint)));
    }

    #[tokio::test]
    async fn repeated_identical_request_hits_the_cache() {
        let engine = Arc::new(EchoEngine { calls: TestCounter::new(0) });
        let balancer = Arc::new(LoadBalancer::new(vec!["http://e1".into()]));
        balancer.mark_status("http://e1", crate::endpoint::EndpointStatus::Healthy).await;
        let enhancer = WorkflowEnhancer::new(
            balancer,
            engine.clone(),
            Arc::new(InMemoryEventSink::new()),
            Arc::new(Monitor::new()),
            EnhancerConfig::default(),
        );

        let payload = serde_json::json!({"doc": "x"});
        enhancer.execute("classify", payload.clone()).await.unwrap();
        enhancer.execute("classify", payload.clone()).await.unwrap();

        assert_eq!(engine.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn batch_dispatch_collects_results_from_every_request() {
        let engine = Arc::new(EchoEngine { calls: TestCounter::new(0) });
        let balancer = Arc::new(LoadBalancer::new(vec!["http://e1".into()]));
        balancer.mark_status("http://e1", crate::endpoint::EndpointStatus::Healthy).await;
        let enhancer = Arc::new(WorkflowEnhancer::new(
            balancer,
            engine,
            Arc::new(InMemoryEventSink::new()),
            Arc::new(Monitor::new()),
            EnhancerConfig::default(),
        ));

        let requests = vec![
            WorkflowRequest { id: "r1".into(), request_type: "ingest".into(), payload: serde_json::json!({"n": 1}) },
            WorkflowRequest { id: "r2".into(), request_type: "ingest".into(), payload: serde_json::json!({"n": 2}) },
        ];
        let results = enhancer.execute_batch(requests).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
