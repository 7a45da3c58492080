use std::sync::Arc;
use std::time::{Duration, Instant};

use aion_core::AIProvider;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cache::{spawn_sweep_loop, ResponseCache};
use crate::dedup::{Deduplicator, Role};
use crate::errors::{OptimizerError, OptimizerResult};
use crate::metrics::{DerivedMetrics, OptimizerMetrics};
use crate::prompt_optimizer::PromptOptimizer;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub caching_enabled: bool,
    pub deduplication_enabled: bool,
    pub prompt_optimization_enabled: bool,
    pub default_ttl: Duration,
    pub similarity_threshold: f64,
    pub per_call_cost: f64,
    pub cache_sweep_interval: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            deduplication_enabled: true,
            prompt_optimization_enabled: true,
            default_ttl: Duration::from_secs(3600),
            similarity_threshold: 0.9,
            per_call_cost: 0.002,
            cache_sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Composes the cache, de-duplicator, prompt optimiser and metrics
/// aggregator behind the single `optimise` entry point.
pub struct AiCallOptimizer {
    cache: Arc<ResponseCache>,
    dedup: Arc<Deduplicator>,
    prompt_optimizer: PromptOptimizer,
    metrics: OptimizerMetrics,
    provider: Arc<dyn AIProvider>,
    config: OptimizerConfig,
}

impl AiCallOptimizer {
    pub fn new(provider: Arc<dyn AIProvider>, compression_rules: Vec<crate::prompt_optimizer::CompressionRule>, config: OptimizerConfig) -> Self {
        let cache = Arc::new(ResponseCache::new(10_000, config.default_ttl));
        spawn_sweep_loop(cache.clone(), config.cache_sweep_interval);
        Self {
            cache,
            dedup: Arc::new(Deduplicator::new(config.similarity_threshold)),
            prompt_optimizer: PromptOptimizer::new(compression_rules),
            metrics: OptimizerMetrics::new(config.per_call_cost),
            provider,
            config,
        }
    }

    pub fn cache_key(request_type: &str, content: &str, params: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request_type.as_bytes());
        hasher.update(content.as_bytes());
        hasher.update(canonical_json(params).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn optimise(&self, request_type: &str, content: &str, params: &Value) -> OptimizerResult<String> {
        let key = Self::cache_key(request_type, content, params);

        if self.config.caching_enabled {
            if let Some(value) = self.cache.get(&key).await {
                self.metrics.record_cache_hit().await;
                return Ok(value);
            }
        }

        let role = if self.config.deduplication_enabled {
            Some(self.dedup.register_or_join(&key, request_type, content).await)
        } else {
            None
        };

        if let Some(Role::Follower(rx)) = role {
            self.metrics.record_dedup_hit().await;
            return rx
                .await
                .map_err(|_| OptimizerError::ProviderFailed("dedup leader dropped before completion".to_string()))?
                .map_err(OptimizerError::ProviderFailed);
        }

        let optimized_content = if self.config.prompt_optimization_enabled {
            self.prompt_optimizer.compress(content).await.0
        } else {
            content.to_string()
        };

        let started = Instant::now();
        let outcome = self.provider.invoke(request_type, &optimized_content, params).await.map_err(|e| e.to_string());
        let latency_ms = started.elapsed().as_millis() as f64;
        self.metrics.record_api_call(latency_ms).await;

        if let Ok(value) = &outcome {
            if self.config.caching_enabled {
                self.cache.set_with_ttl(key.clone(), value.clone(), self.config.default_ttl).await;
            }
        }

        if let Some(Role::Leader(leader_key)) = role {
            self.dedup.complete_request(leader_key, outcome.clone()).await;
        }

        outcome.map_err(OptimizerError::ProviderFailed)
    }

    pub async fn metrics_snapshot(&self) -> DerivedMetrics {
        let token_savings = self.prompt_optimizer.total_token_savings().await;
        self.metrics.snapshot(token_savings, 0.0).await
    }
}

/// Deterministic key = field order is fixed, not dependent on a JSON
/// library's own key ordering.
fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted: Vec<(String, Value)> = map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct CountingProvider {
        calls: AtomicUsize,
    }
    #[async_trait]
    impl AIProvider for CountingProvider {
        async fn invoke(&self, _request_type: &str, _content: &str, _params: &Value) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            Ok("X".to_string())
        }
    }

    #[tokio::test]
    async fn repeated_calls_with_identical_input_hit_the_cache() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let optimizer = AiCallOptimizer::new(provider.clone(), vec![], OptimizerConfig::default());

        let first = optimizer.optimise("classify", "abc", &json!({})).await.unwrap();
        let second = optimizer.optimise("classify", "abc", &json!({})).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_deduplicate_to_one_provider_call() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let optimizer = Arc::new(AiCallOptimizer::new(provider.clone(), vec![], OptimizerConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let optimizer = optimizer.clone();
            handles.push(tokio::spawn(async move { optimizer.optimise("classify", "abc", &json!({})).await.unwrap() }));
        }
        let results: Vec<String> = futures_results(handles).await;

        assert_eq!(results.len(), 50);
        assert!(results.iter().all(|r| r == "X"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    async fn futures_results(handles: Vec<tokio::task::JoinHandle<String>>) -> Vec<String> {
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }
}
