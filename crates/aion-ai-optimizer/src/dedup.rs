use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, RwLock};

pub type ProviderOutcome = Result<String, String>;

struct PendingRequest {
    content: String,
    request_type: String,
    #[allow(dead_code)]
    start_time: DateTime<Utc>,
    waiters: Vec<oneshot::Sender<ProviderOutcome>>,
}

pub enum Role {
    /// Caller is first in and must do the real work, then call
    /// `complete_request` with the outcome.
    Leader(String),
    /// An equivalent request is already in flight; await the outcome.
    Follower(oneshot::Receiver<ProviderOutcome>),
}

/// Positional character-match ratio over the shorter string. Equal strings
/// always yield 1.0 regardless of length comparison cost.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (a_bytes, b_bytes) = (a.as_bytes(), b.as_bytes());
    let min_len = a_bytes.len().min(b_bytes.len());
    if min_len == 0 {
        return 0.0;
    }
    let common = a_bytes.iter().zip(b_bytes.iter()).filter(|(x, y)| x == y).count();
    common as f64 / min_len as f64
}

pub struct Deduplicator {
    pending: RwLock<HashMap<String, PendingRequest>>,
    similarity_threshold: f64,
    grace_period: Duration,
}

impl Deduplicator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { pending: RwLock::new(HashMap::new()), similarity_threshold, grace_period: Duration::from_secs(60) }
    }

    /// Exact key match takes priority; otherwise scans in-flight requests of
    /// the same type for one similar enough to coalesce onto.
    pub async fn register_or_join(&self, key: &str, request_type: &str, content: &str) -> Role {
        let mut pending = self.pending.write().await;

        if let Some(existing) = pending.get_mut(key) {
            let (tx, rx) = oneshot::channel();
            existing.waiters.push(tx);
            return Role::Follower(rx);
        }

        for existing in pending.values_mut() {
            if existing.request_type == request_type && similarity(&existing.content, content) >= self.similarity_threshold {
                let (tx, rx) = oneshot::channel();
                existing.waiters.push(tx);
                return Role::Follower(rx);
            }
        }

        pending.insert(
            key.to_string(),
            PendingRequest { content: content.to_string(), request_type: request_type.to_string(), start_time: Utc::now(), waiters: Vec::new() },
        );
        Role::Leader(key.to_string())
    }

    /// Notifies every coalesced waiter, then schedules the pending record
    /// for deletion after the grace period so very-late joiners still see
    /// it briefly.
    pub async fn complete_request(self: &Arc<Self>, key: String, outcome: ProviderOutcome) {
        let waiters = {
            let mut pending = self.pending.write().await;
            pending.get_mut(&key).map(|p| std::mem::take(&mut p.waiters)).unwrap_or_default()
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        let this = self.clone();
        let grace_period = self.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            this.pending.write().await.remove(&key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_eq!(similarity("abc", "abc"), 1.0);
    }

    #[test]
    fn similarity_is_positional_not_set_based() {
        assert_eq!(similarity("abcd", "abXY"), 0.5);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_coalesce_onto_one_leader() {
        let dedup = Arc::new(Deduplicator::new(0.9));
        let mut followers = Vec::new();
        let leader_role = dedup.register_or_join("k1", "classify", "abc").await;
        assert!(matches!(leader_role, Role::Leader(_)));

        for _ in 0..5 {
            let role = dedup.register_or_join("k1", "classify", "abc").await;
            match role {
                Role::Follower(rx) => followers.push(rx),
                Role::Leader(_) => panic!("expected a follower once a leader is registered"),
            }
        }

        dedup.complete_request("k1".to_string(), Ok("X".to_string())).await;
        for rx in followers {
            assert_eq!(rx.await.unwrap(), Ok("X".to_string()));
        }
    }
}
