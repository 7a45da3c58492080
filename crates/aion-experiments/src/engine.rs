use std::collections::HashMap;
use std::sync::Arc;

use aion_core::{Event, EventSink};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::assignment::select_variant;
use crate::errors::{ExperimentError, ExperimentResult};
use crate::model::{Experiment, ExperimentStatus, UserAssignment};
use crate::statistics::StatisticsEngine;

pub struct ExperimentEngine {
    experiments: Arc<RwLock<HashMap<String, Experiment>>>,
    assignments: Arc<RwLock<HashMap<(String, String), UserAssignment>>>,
    event_sink: Arc<dyn EventSink>,
    statistics: Arc<dyn StatisticsEngine>,
    confidence_level: f64,
}

impl ExperimentEngine {
    pub fn new(event_sink: Arc<dyn EventSink>, statistics: Arc<dyn StatisticsEngine>) -> Self {
        Self {
            experiments: Arc::new(RwLock::new(HashMap::new())),
            assignments: Arc::new(RwLock::new(HashMap::new())),
            event_sink,
            statistics,
            confidence_level: 0.95,
        }
    }

    pub async fn create_experiment(&self, experiment: Experiment) -> ExperimentResult<()> {
        experiment.validate().map_err(ExperimentError::ValidationFailed)?;
        let mut experiments = self.experiments.write().await;
        if experiments.contains_key(&experiment.id) {
            return Err(ExperimentError::ValidationFailed(format!("experiment already exists: {}", experiment.id)));
        }
        experiments.insert(experiment.id.clone(), experiment);
        Ok(())
    }

    pub async fn start_experiment(&self, id: &str) -> ExperimentResult<()> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments.get_mut(id).ok_or_else(|| ExperimentError::NotFound(id.to_string()))?;
        if experiment.status != ExperimentStatus::Draft {
            return Err(ExperimentError::InvalidState(format!("experiment {id} is not in draft")));
        }
        experiment.status = ExperimentStatus::Running;
        experiment.start_date = Some(Utc::now());
        self.event_sink.emit(Event::ExperimentStart { experiment_id: id.to_string(), timestamp: Utc::now() });
        Ok(())
    }

    pub async fn pause_experiment(&self, id: &str) -> ExperimentResult<()> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments.get_mut(id).ok_or_else(|| ExperimentError::NotFound(id.to_string()))?;
        if experiment.status != ExperimentStatus::Running {
            return Err(ExperimentError::InvalidState(format!("experiment {id} is not running")));
        }
        experiment.status = ExperimentStatus::Paused;
        Ok(())
    }

    pub async fn resume_experiment(&self, id: &str) -> ExperimentResult<()> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments.get_mut(id).ok_or_else(|| ExperimentError::NotFound(id.to_string()))?;
        if experiment.status != ExperimentStatus::Paused {
            return Err(ExperimentError::InvalidState(format!("experiment {id} is not paused")));
        }
        experiment.status = ExperimentStatus::Running;
        Ok(())
    }

    pub async fn assign_user_to_variant(&self, user_id: &str, experiment_id: &str) -> ExperimentResult<String> {
        let key = (user_id.to_string(), experiment_id.to_string());
        if let Some(existing) = self.assignments.read().await.get(&key) {
            debug!(experiment_id, user_id, variant_id = %existing.variant_id, "returning sticky assignment");
            return Ok(existing.variant_id.clone());
        }

        let mut experiments = self.experiments.write().await;
        let experiment = experiments
            .get_mut(experiment_id)
            .ok_or_else(|| ExperimentError::NotFound(experiment_id.to_string()))?;
        if experiment.status != ExperimentStatus::Running {
            return Err(ExperimentError::InvalidState(format!("experiment {experiment_id} is not running")));
        }

        // Re-check after acquiring the write lock: a concurrent caller may
        // have raced us between the read-lock probe above and here.
        let mut assignments = self.assignments.write().await;
        if let Some(existing) = assignments.get(&key) {
            return Ok(existing.variant_id.clone());
        }

        let variant = select_variant(user_id, experiment_id, &experiment.variants)
            .ok_or_else(|| ExperimentError::ValidationFailed("experiment has no variants".to_string()))?;
        let variant_id = variant.id.clone();

        if let Some(metrics) = experiment.metrics.get_mut(&variant_id) {
            metrics.user_count += 1;
            metrics.sample_size += 1;
        }

        let assignment = UserAssignment {
            user_id: user_id.to_string(),
            experiment_id: experiment_id.to_string(),
            variant_id: variant_id.clone(),
            assigned_at: Utc::now(),
        };
        assignments.insert(key, assignment);
        debug!(experiment_id, user_id, variant_id = %variant_id, "assigned new user to variant");

        self.event_sink.emit(Event::UserAssignment {
            experiment_id: experiment_id.to_string(),
            user_id: user_id.to_string(),
            variant_id: variant_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(variant_id)
    }

    pub async fn track_conversion(&self, user_id: &str, experiment_id: &str, value: f64) -> ExperimentResult<()> {
        let key = (user_id.to_string(), experiment_id.to_string());
        let variant_id = self
            .assignments
            .read()
            .await
            .get(&key)
            .map(|a| a.variant_id.clone())
            .ok_or_else(|| ExperimentError::UserNotAssigned(user_id.to_string()))?;

        let mut experiments = self.experiments.write().await;
        let experiment = experiments
            .get_mut(experiment_id)
            .ok_or_else(|| ExperimentError::NotFound(experiment_id.to_string()))?;
        if let Some(metrics) = experiment.metrics.get_mut(&variant_id) {
            metrics.conversions += 1;
            metrics.conversion_rate = if metrics.user_count > 0 {
                metrics.conversions as f64 / metrics.user_count as f64
            } else {
                0.0
            };
        }

        self.event_sink.emit(Event::Conversion {
            experiment_id: experiment_id.to_string(),
            user_id: user_id.to_string(),
            value,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn stop_experiment(&self, id: &str) -> ExperimentResult<Experiment> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments.get_mut(id).ok_or_else(|| ExperimentError::NotFound(id.to_string()))?;
        if matches!(experiment.status, ExperimentStatus::Completed | ExperimentStatus::Cancelled) {
            return Err(ExperimentError::InvalidState(format!("experiment {id} is already terminal")));
        }
        experiment.status = ExperimentStatus::Completed;
        experiment.end_date = Some(Utc::now());
        let results = self.statistics.analyse(&experiment.metrics, self.confidence_level);
        experiment.results = Some(results.clone());
        info!(
            experiment_id = id,
            winning_variant = ?results.winning_variant,
            is_significant = results.is_significant,
            "experiment stopped"
        );

        self.event_sink.emit(Event::ExperimentEnd {
            experiment_id: id.to_string(),
            winning_variant: results.winning_variant.clone(),
            timestamp: Utc::now(),
        });

        Ok(experiment.clone())
    }

    pub async fn cancel_experiment(&self, id: &str) -> ExperimentResult<()> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments.get_mut(id).ok_or_else(|| ExperimentError::NotFound(id.to_string()))?;
        if matches!(experiment.status, ExperimentStatus::Completed | ExperimentStatus::Cancelled) {
            return Err(ExperimentError::InvalidState(format!("experiment {id} is already terminal")));
        }
        experiment.status = ExperimentStatus::Cancelled;
        experiment.end_date = Some(Utc::now());
        Ok(())
    }

    pub async fn get_experiment(&self, id: &str) -> ExperimentResult<Experiment> {
        self.experiments.read().await.get(id).cloned().ok_or_else(|| ExperimentError::NotFound(id.to_string()))
    }

    pub async fn list_experiments(&self) -> Vec<Experiment> {
        self.experiments.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Experiment, ExperimentKind, Variant};
    use crate::statistics::ThresholdStub;
    use aion_core::InMemoryEventSink;
    use serde_json::json;

    fn two_arm_experiment(id: &str) -> Experiment {
        Experiment::new(
            id,
            ExperimentKind::Ab,
            vec![
                Variant { id: "a".into(), weight: 50.0, enabled: true, is_control: true, configuration: json!({}) },
                Variant { id: "b".into(), weight: 50.0, enabled: true, is_control: false, configuration: json!({}) },
            ],
            vec!["conversion".into()],
        )
    }

    fn engine() -> ExperimentEngine {
        ExperimentEngine::new(Arc::new(InMemoryEventSink::new()), Arc::new(ThresholdStub))
    }

    #[tokio::test]
    async fn create_experiment_rejects_bad_weights() {
        let engine = engine();
        let mut bad = two_arm_experiment("e1");
        bad.variants[0].weight = 60.0;
        let err = engine.create_experiment(bad).await.unwrap_err();
        assert!(matches!(err, ExperimentError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn assignment_is_sticky_and_distribution_is_balanced() {
        let engine = engine();
        engine.create_experiment(two_arm_experiment("e1")).await.unwrap();
        engine.start_experiment("e1").await.unwrap();

        let mut a_count = 0;
        for i in 0..1000 {
            let user_id = format!("user-{i}");
            let first = engine.assign_user_to_variant(&user_id, "e1").await.unwrap();
            let second = engine.assign_user_to_variant(&user_id, "e1").await.unwrap();
            assert_eq!(first, second);
            if first == "a" {
                a_count += 1;
            }
        }
        let share = a_count as f64 / 1000.0;
        assert!((0.47..=0.53).contains(&share), "share was {share}");
    }

    #[tokio::test]
    async fn track_conversion_requires_prior_assignment() {
        let engine = engine();
        engine.create_experiment(two_arm_experiment("e1")).await.unwrap();
        engine.start_experiment("e1").await.unwrap();
        let err = engine.track_conversion("ghost", "e1", 1.0).await.unwrap_err();
        assert!(matches!(err, ExperimentError::UserNotAssigned(_)));
    }
}
