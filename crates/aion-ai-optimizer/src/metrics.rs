use tokio::sync::RwLock;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_api_calls: u64,
    cache_hits: u64,
    dedup_hits: u64,
    total_requests: u64,
    cumulative_latency_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DerivedMetrics {
    pub cache_hit_rate: f64,
    pub deduplication_rate: f64,
    pub cost_savings: f64,
    pub token_savings: u64,
    pub performance_gain: f64,
    pub average_latency_ms: f64,
}

/// Raw counters plus the formulas from the optimiser's contract, recomputed
/// on every read rather than maintained incrementally.
pub struct OptimizerMetrics {
    counters: RwLock<Counters>,
    per_call_cost: f64,
}

impl OptimizerMetrics {
    pub fn new(per_call_cost: f64) -> Self {
        Self { counters: RwLock::new(Counters::default()), per_call_cost }
    }

    pub async fn record_cache_hit(&self) {
        let mut c = self.counters.write().await;
        c.cache_hits += 1;
        c.total_requests += 1;
    }

    pub async fn record_dedup_hit(&self) {
        let mut c = self.counters.write().await;
        c.dedup_hits += 1;
        c.total_requests += 1;
    }

    pub async fn record_api_call(&self, latency_ms: f64) {
        let mut c = self.counters.write().await;
        c.total_api_calls += 1;
        c.total_requests += 1;
        c.cumulative_latency_ms += latency_ms;
    }

    pub async fn snapshot(&self, token_savings: u64, parallel_gain: f64) -> DerivedMetrics {
        let c = *self.counters.read().await;
        let cache_hit_rate = if c.cache_hits + c.total_api_calls > 0 {
            c.cache_hits as f64 / (c.cache_hits + c.total_api_calls) as f64
        } else {
            0.0
        };
        let deduplication_rate = if c.total_requests > 0 { c.dedup_hits as f64 / c.total_requests as f64 } else { 0.0 };
        let cost_savings = (c.cache_hits + c.dedup_hits) as f64 * self.per_call_cost;
        let average_latency_ms = if c.total_api_calls > 0 { c.cumulative_latency_ms / c.total_api_calls as f64 } else { 0.0 };
        let performance_gain = 0.8 * cache_hit_rate + 0.6 * deduplication_rate + 0.4 * parallel_gain;

        DerivedMetrics { cache_hit_rate, deduplication_rate, cost_savings, token_savings, performance_gain, average_latency_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn derived_rates_match_the_documented_formulas() {
        let metrics = OptimizerMetrics::new(0.002);
        metrics.record_cache_hit().await;
        metrics.record_cache_hit().await;
        metrics.record_api_call(100.0).await;
        metrics.record_dedup_hit().await;

        let snapshot = metrics.snapshot(500, 0.5).await;
        assert!((snapshot.cache_hit_rate - (2.0 / 3.0)).abs() < 1e-9);
        assert!((snapshot.deduplication_rate - 0.25).abs() < 1e-9);
        assert!((snapshot.cost_savings - 3.0 * 0.002).abs() < 1e-9);
    }
}
