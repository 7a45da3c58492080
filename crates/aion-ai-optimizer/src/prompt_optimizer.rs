use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CompressionRule {
    pub pattern: String,
    pub replacement: String,
    pub priority: i32,
    pub enabled: bool,
    pub expected_token_savings: u32,
}

#[derive(Debug, Clone)]
struct MemoisedRewrite {
    optimized: String,
    token_reduction: u32,
    usage_count: u64,
    last_used: DateTime<Utc>,
}

/// Applies an ordered set of literal pattern/replacement rules to prompts
/// and memoises the rewrite so repeated calls with the same input don't
/// redo the substitution pass.
pub struct PromptOptimizer {
    rules: Vec<CompressionRule>,
    memo: RwLock<HashMap<String, MemoisedRewrite>>,
}

impl PromptOptimizer {
    pub fn new(mut rules: Vec<CompressionRule>) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Self { rules, memo: RwLock::new(HashMap::new()) }
    }

    /// Returns `(optimized_prompt, token_reduction)`. The first call for a
    /// given `prompt` does the substitution work; subsequent calls reuse it
    /// and bump usage counters.
    pub async fn compress(&self, prompt: &str) -> (String, u32) {
        if let Some(cached) = self.memo.write().await.get_mut(prompt) {
            cached.usage_count += 1;
            cached.last_used = Utc::now();
            return (cached.optimized.clone(), cached.token_reduction);
        }

        let mut optimized = prompt.to_string();
        let mut token_reduction = 0u32;
        for rule in self.rules.iter().filter(|r| r.enabled) {
            if optimized.contains(&rule.pattern) {
                optimized = optimized.replace(&rule.pattern, &rule.replacement);
                token_reduction += rule.expected_token_savings;
            }
        }

        self.memo.write().await.insert(
            prompt.to_string(),
            MemoisedRewrite { optimized: optimized.clone(), token_reduction, usage_count: 1, last_used: Utc::now() },
        );
        (optimized, token_reduction)
    }

    pub async fn total_token_savings(&self) -> u64 {
        self.memo.read().await.values().map(|m| m.token_reduction as u64 * m.usage_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<CompressionRule> {
        vec![
            CompressionRule {
                pattern: "please could you".to_string(),
                replacement: "".to_string(),
                priority: 10,
                enabled: true,
                expected_token_savings: 3,
            },
            CompressionRule {
                pattern: "in order to".to_string(),
                replacement: "to".to_string(),
                priority: 5,
                enabled: true,
                expected_token_savings: 2,
            },
        ]
    }

    #[tokio::test]
    async fn applies_enabled_rules_in_priority_order() {
        let optimizer = PromptOptimizer::new(rules());
        let (optimized, reduction) = optimizer.compress("please could you summarize this in order to save time").await;
        assert_eq!(optimized, " summarize this to save time");
        assert_eq!(reduction, 5);
    }

    #[tokio::test]
    async fn second_call_reuses_memoised_rewrite() {
        let optimizer = PromptOptimizer::new(rules());
        let first = optimizer.compress("in order to proceed").await;
        let second = optimizer.compress("in order to proceed").await;
        assert_eq!(first, second);
        assert_eq!(optimizer.total_token_savings().await, 4);
    }
}
